//! Errores del core de ciclo de vida.
//!
//! - `LifecycleError`: errores síncronos devueltos a quien invoca
//!   (precondiciones) más los errores del puerto envueltos.
//! - `StoreError`: contrato de errores del puerto `JobStore`. La distinción
//!   `NotFound` vs resto es la frontera que usa el polling para decidir si
//!   continúa.
//! - `ModelError`: validación al construir tipos del modelo.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{JobId, JobStatus};

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum StoreError {
    /// El backend todavía no tiene registro del job (transitorio durante polling).
    #[error("record not found")] NotFound,
    #[error("unknown subject: {0}")] UnknownSubject(String),
    /// El backend rechazó la operación (p. ej. start sin artifacts).
    #[error("backend refused: {0}")] Refused(String),
    #[error("transport error: {0}")] Transport(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ModelError {
    #[error("invalid subject id: {0:?}")] InvalidSubject(String),
    #[error("duplicate requirement kind: {0}")] DuplicateRequirementKind(String),
    #[error("invalid start policy: {0}")] InvalidPolicy(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LifecycleError {
    #[error("invalid subject: {0:?}")] InvalidSubject(String),
    #[error("job not found: {0}")] JobNotFound(JobId),
    #[error("unknown requirement kind {kind:?} for job {job_id}")]
    UnknownRequirementKind { job_id: JobId, kind: String },
    #[error("job {job_id} already running or finished ({status})")]
    JobAlreadyRunning { job_id: JobId, status: JobStatus },
    #[error("job {job_id} not startable ({status})")]
    NotStartable { job_id: JobId, status: JobStatus },
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
    #[error("job {job_id} has no successful result ({status})")]
    NotTerminal { job_id: JobId, status: JobStatus },
    #[error("store: {0}")] Store(#[from] StoreError),
    #[error("model: {0}")] Model(ModelError),
}

impl LifecycleError {
    /// Errores de precondición del llamador (4xx). Nunca se reintentan.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, LifecycleError::Store(_) | LifecycleError::IllegalTransition { .. } | LifecycleError::Model(_))
    }
}

impl From<ModelError> for LifecycleError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidSubject(s) => LifecycleError::InvalidSubject(s),
            other => LifecycleError::Model(other),
        }
    }
}
