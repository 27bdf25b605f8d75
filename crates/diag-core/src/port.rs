//! Puertos consumidos por el core. El core depende de estas interfaces pero
//! no las implementa; el transporte concreto (HTTP, base de datos) vive en
//! otro crate (ver `diag-adapters`).
use async_trait::async_trait;

use crate::errors::StoreError;
use crate::model::{ArtifactPayload, ArtifactRef, ArtifactRequirementSet, JobId, JobRecord, SubjectId};

/// Persistencia y ejecución de jobs. Única fuente de verdad del estado.
///
/// Contrato de errores: `fetch_status` devuelve `StoreError::NotFound` cuando
/// el backend todavía no tiene el registro (transitorio); cualquier otra
/// variante se considera un fallo de infraestructura.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persiste un job nuevo con el snapshot de requisitos. Asigna el `id`.
    async fn create(&self, subject_id: &SubjectId, requirement_set: &ArtifactRequirementSet) -> Result<JobRecord, StoreError>;

    /// Sube un artifact y lo enlaza al `kind` (reemplazando el previo).
    async fn attach_artifact(&self, job_id: JobId, kind: &str, payload: &ArtifactPayload) -> Result<ArtifactRef, StoreError>;

    /// Pide al backend iniciar la ejecución. Falla si el backend la rechaza.
    async fn start_execution(&self, job_id: JobId) -> Result<(), StoreError>;

    /// Lee el estado persistido actual.
    async fn fetch_status(&self, job_id: JobId) -> Result<JobRecord, StoreError>;

    /// Historial de jobs de un sujeto (sólo lectura, sin polling).
    async fn list_by_subject(&self, subject_id: &SubjectId) -> Result<Vec<JobRecord>, StoreError>;
}

/// Transforma un job terminado con éxito en estructuras para mostrar
/// (gráficos, tablas). Colaborador externo: el core sólo le entrega el
/// registro.
pub trait ResultProjector {
    type Output;

    fn project(&self, record: &JobRecord) -> Self::Output;
}
