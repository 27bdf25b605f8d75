//! `JobRecord`: modelo de datos de un job de análisis.
//!
//! Invariantes que protege esta estructura:
//! - `id`, `subject_id` y `requirement_set` son inmutables tras la creación.
//! - `attached_artifacts` tiene a lo sumo un artifact por `kind`.
//! - `status` avanza de forma monótona (ver `JobStatus::can_advance_to`).
//! - `result_ref` sólo existe en `Succeeded`, `error_detail` sólo en `Failed`.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ArtifactRef, ArtifactRequirementSet, JobId, JobStatus, SubjectId};
use crate::errors::LifecycleError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub subject_id: SubjectId,
    pub requirement_set: ArtifactRequirementSet,
    pub attached_artifacts: BTreeMap<String, ArtifactRef>,
    pub status: JobStatus,
    pub result_ref: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}

impl JobRecord {
    /// Registro inicial en `Created` sin artifacts.
    pub fn new(id: JobId, subject_id: SubjectId, requirement_set: ArtifactRequirementSet) -> Self {
        let now = Utc::now();
        Self { id,
               subject_id,
               requirement_set,
               attached_artifacts: BTreeMap::new(),
               status: JobStatus::Created,
               result_ref: None,
               error_detail: None,
               created_at: now,
               last_transition_at: now }
    }

    /// Avanza el estado respetando la monotonía. Sin cambio real no toca
    /// `last_transition_at`.
    pub fn advance_to(&mut self, next: JobStatus) -> Result<(), LifecycleError> {
        if !self.status.can_advance_to(next) {
            return Err(LifecycleError::IllegalTransition { from: self.status,
                                                           to: next });
        }
        if self.status != next {
            self.status = next;
            self.last_transition_at = Utc::now();
        }
        Ok(())
    }

    /// Cierra el job con éxito. Un job ya cerrado no cambia de resultado.
    pub fn succeed(&mut self, result_ref: impl Into<String>) -> Result<(), LifecycleError> {
        self.close_check(JobStatus::Succeeded)?;
        self.advance_to(JobStatus::Succeeded)?;
        self.result_ref = Some(result_ref.into());
        self.error_detail = None;
        Ok(())
    }

    /// Cierra el job con fallo terminal.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), LifecycleError> {
        self.close_check(JobStatus::Failed)?;
        self.advance_to(JobStatus::Failed)?;
        self.error_detail = Some(detail.into());
        self.result_ref = None;
        Ok(())
    }

    fn close_check(&self, to: JobStatus) -> Result<(), LifecycleError> {
        if self.is_terminal() {
            return Err(LifecycleError::IllegalTransition { from: self.status, to });
        }
        Ok(())
    }

    /// Enlaza (o reemplaza) el artifact de su `kind`. Devuelve el anterior.
    pub fn bind_artifact(&mut self, artifact: ArtifactRef) -> Option<ArtifactRef> {
        self.attached_artifacts.insert(artifact.kind.clone(), artifact)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Comprueba la exclusión mutua resultado/error según estado.
    pub fn outcome_is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Succeeded => self.result_ref.is_some() && self.error_detail.is_none(),
            JobStatus::Failed => self.error_detail.is_some() && self.result_ref.is_none(),
            _ => self.result_ref.is_none() && self.error_detail.is_none(),
        }
    }
}
