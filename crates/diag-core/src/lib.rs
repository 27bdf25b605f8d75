//! diag-core: ciclo de vida asíncrono de jobs de análisis.
//!
//! Un job se crea para un sujeto (paciente) con un conjunto de requisitos,
//! recibe artifacts, se inicia en el backend y se consulta por polling hasta
//! un estado terminal. Los flujos de diagnóstico CT y de análisis ómico usan
//! el mismo controlador; sólo cambia el `ArtifactRequirementSet`.
pub mod catalog;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod port;
pub mod validation;

pub use engine::{ControllerConfig, JobLifecycleController, PollHandle, PollOutcome, PollingScheduler, StatusStream};
pub use errors::{LifecycleError, ModelError, StoreError};
pub use event::{EventStore, InMemoryEventStore, JobEvent, JobEventKind};
pub use model::{ArtifactPayload, ArtifactRef, ArtifactRequirement, ArtifactRequirementSet, JobId, JobRecord, JobStatus, RunningPhase,
                SubjectId};
pub use port::{JobStore, ResultProjector};
pub use validation::{is_kind_known, is_startable, StartPolicy};
