//! Modelo de datos: identificadores, requisitos, artifacts, estados y el
//! `JobRecord`.

pub mod artifact;
pub mod ids;
pub mod job;
pub mod requirement;
mod status;

pub use artifact::{ArtifactPayload, ArtifactRef};
pub use ids::{JobId, SubjectId};
pub use job::JobRecord;
pub use requirement::{ArtifactRequirement, ArtifactRequirementSet};
pub use status::{JobStatus, RunningPhase};
