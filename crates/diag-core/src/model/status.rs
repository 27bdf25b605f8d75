//! Estado de ciclo de vida de un job.
//!
//! Orden (rank): `Created` ≤ `PartiallyEquipped` ≤ `Startable` ≤ `Running` ≤
//! {`Succeeded`, `Failed`}. Las sub-fases de `Running` se pliegan en un único
//! estado lógico para la legalidad de transiciones; se conservan sólo para
//! mostrar.
//!
//! No se permiten reversiones: una vez terminal, el job es inmutable.
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunningPhase {
    Queued,
    Received,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Recién creado, sin artifacts.
    Created,
    /// Algún artifact adjunto pero la política de inicio no se cumple.
    PartiallyEquipped,
    /// La política de inicio se cumple; `start_execution` está permitido.
    Startable,
    /// Ejecución en el backend, con su sub-estado reportado.
    Running(RunningPhase),
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::PartiallyEquipped => 1,
            JobStatus::Startable => 2,
            JobStatus::Running(_) => 3,
            JobStatus::Succeeded | JobStatus::Failed => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running(_))
    }

    /// Se pueden adjuntar artifacts sólo antes de iniciar.
    pub fn accepts_artifacts(&self) -> bool {
        self.rank() < 3
    }

    /// `true` si pasar de `self` a `next` respeta la monotonía. Dentro de
    /// `Running` cualquier cambio de fase es válido (el backend puede
    /// reportar queued después de received).
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::PartiallyEquipped => "partially_equipped",
            JobStatus::Startable => "startable",
            JobStatus::Running(RunningPhase::Queued) => "running:queued",
            JobStatus::Running(RunningPhase::Received) => "running:received",
            JobStatus::Running(RunningPhase::Processing) => "running:processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
