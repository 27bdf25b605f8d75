//! diag-adapters: colaboradores concretos de los puertos del core.
//!
//! - `InMemoryJobStore`: backend simulado que implementa `JobStore`. La
//!   progresión de cada job tras iniciarse se describe con un guion de
//!   `BackendStep` (respuestas sucesivas de `fetch_status`), lo que permite
//!   reproducir "todavía no existe", sub-fases, fallos terminales y errores
//!   de transporte.
//! - `SummaryProjector`: `ResultProjector` mínimo que resume un job exitoso.

pub mod projector;
pub mod store;

pub use projector::{ResultSummary, SummaryProjector};
pub use store::{BackendStep, InMemoryJobStore};
