//! Tipos de evento del log de auditoría y estructura `JobEvent`.
//!
//! Rol en el flujo:
//! - El controlador agrega un evento por cada comando aceptado y por cada
//!   cambio de estado observado.
//! - El log es append-only; permite reconstruir la historia de un job para
//!   vistas de historial sin depender del estado mutable del controlador.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{JobId, JobStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEventKind {
    /// Primer evento de un `job_id`.
    JobCreated { subject_id: String, requirement_set_id: String },
    /// `replaced` indica que ya existía un artifact para ese kind.
    ArtifactAttached { kind: String, hash: String, replaced: bool },
    ExecutionStarted,
    /// Estado no terminal reportado por el backend (incluye sub-fase).
    StatusObserved { status: JobStatus },
    JobSucceeded { result_ref: String },
    JobFailed { error_detail: String },
    /// El polling se detuvo por un error no clasificado.
    PollingAborted { reason: String },
    /// El llamador canceló la suscripción (navegación fuera de la vista).
    PollingCancelled,
}

impl JobEventKind {
    /// Nombre corto estable, útil para logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            JobEventKind::JobCreated { .. } => "JobCreated",
            JobEventKind::ArtifactAttached { .. } => "ArtifactAttached",
            JobEventKind::ExecutionStarted => "ExecutionStarted",
            JobEventKind::StatusObserved { .. } => "StatusObserved",
            JobEventKind::JobSucceeded { .. } => "JobSucceeded",
            JobEventKind::JobFailed { .. } => "JobFailed",
            JobEventKind::PollingAborted { .. } => "PollingAborted",
            JobEventKind::PollingCancelled => "PollingCancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub seq: u64, // asignado por el EventStore (orden append)
    pub job_id: JobId,
    pub kind: JobEventKind,
    pub ts: DateTime<Utc>,
}
