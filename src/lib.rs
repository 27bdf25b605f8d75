//! diagflow: fachada del ciclo de vida de jobs de análisis diagnóstico.
//!
//! Re-exporta el core (`diag_core`) y los adaptadores (`diag_adapters`) y
//! añade la configuración de la aplicación, sus errores y un runner de
//! demostración sobre el backend en memoria.
pub mod config;
pub mod demo;
pub mod errors;

pub use diag_adapters::{BackendStep, InMemoryJobStore, ResultSummary, SummaryProjector};
pub use diag_core::*;

pub use config::{AppConfig, CONFIG};
pub use demo::{run_demo, DemoReport};
pub use errors::{CoreError, DomainError};
