//! Errores de la aplicación: `CoreError` (infraestructura, configuración y
//! ciclo de vida) y `DomainError` (entradas inválidas del usuario).

pub mod core_error;
pub mod domain_error;

pub use core_error::CoreError;
pub use domain_error::DomainError;
