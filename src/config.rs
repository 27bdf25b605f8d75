//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable
//! (`CONFIG`) con los parámetros del ciclo de vida de jobs:
//!
//! - `DIAGFLOW_POLL_INTERVAL_MS`: intervalo de polling (default 5000, > 0).
//! - `DIAGFLOW_START_POLICY`: `any` | `all` | `at-least:N` (default `any`).
//! - `DIAGFLOW_AUTO_POLL`: suscribir al polling al iniciar (default `true`).
use std::env;
use std::time::Duration;

use diag_core::constants::DEFAULT_POLL_INTERVAL_MS;
use diag_core::{ControllerConfig, StartPolicy};
use log::warn;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::errors::CoreError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv(); // ignora error si no existe .env
});

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub poll_interval_ms: u64,
    pub start_policy: String,
    pub auto_poll: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
               start_policy: StartPolicy::default().to_string(),
               auto_poll: true }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno (tras cargar `.env`).
    pub fn from_env() -> Result<Self, CoreError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Variante con fuente inyectable (tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
        where F: Fn(&str) -> Option<String>
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup("DIAGFLOW_POLL_INTERVAL_MS") {
            cfg.poll_interval_ms = raw.trim()
                                      .parse::<u64>()
                                      .ok()
                                      .filter(|ms| *ms > 0)
                                      .ok_or_else(|| CoreError::Config(format!("DIAGFLOW_POLL_INTERVAL_MS inválido: {raw}")))?;
        }
        if let Some(raw) = lookup("DIAGFLOW_START_POLICY") {
            let policy: StartPolicy = raw.parse().map_err(|e| CoreError::Config(format!("DIAGFLOW_START_POLICY: {e}")))?;
            cfg.start_policy = policy.to_string();
        }
        if let Some(raw) = lookup("DIAGFLOW_AUTO_POLL") {
            cfg.auto_poll = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(CoreError::Config(format!("DIAGFLOW_AUTO_POLL inválido: {raw}"))),
            };
        }
        Ok(cfg)
    }

    /// Parámetros del controlador derivados de esta configuración.
    pub fn controller_config(&self) -> Result<ControllerConfig, CoreError> {
        let start_policy = self.start_policy
                               .parse::<StartPolicy>()
                               .map_err(|e| CoreError::Config(e.to_string()))?;
        Ok(ControllerConfig { poll_interval: Duration::from_millis(self.poll_interval_ms),
                              start_policy,
                              auto_poll: self.auto_poll })
    }
}

/// Instancia global perezosa. Ante un entorno inválido registra el error y
/// usa los valores por defecto.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    AppConfig::from_env().unwrap_or_else(|e| {
                             warn!("config: {e}; usando valores por defecto");
                             AppConfig::default()
                         })
});
