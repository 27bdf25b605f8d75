//! Constantes del motor de ciclo de vida.
//!
//! Valores por defecto que la configuración de la aplicación puede
//! sobrescribir (ver `ControllerConfig`).

/// Intervalo de polling por defecto (ms). El backend de análisis tarda
/// minutos; consultar cada 5 s mantiene la carga acotada.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Prefijo del `error_detail` cuando el polling se detiene por un error no
/// clasificado del transporte.
pub const POLLING_ABORTED_PREFIX: &str = "polling aborted";
