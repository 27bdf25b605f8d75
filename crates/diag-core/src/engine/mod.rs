//! Motor de ciclo de vida: controlador, scheduler de polling y stream de
//! observación.

mod controller;
pub mod scheduler;
mod stream;

pub use controller::{ControllerConfig, JobLifecycleController};
pub use scheduler::{classify, PollHandle, PollOutcome, PollSink, PollingScheduler};
pub use stream::StatusStream;
