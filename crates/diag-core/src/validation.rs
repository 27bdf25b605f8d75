//! Predicados de validación compartidos por `attach_artifact` y
//! `start_execution`.
//!
//! Ambas operaciones deben llegar a la misma decisión allow/deny; por eso
//! existe un único sitio que define qué `kind` es conocido y cuándo un job es
//! iniciable. `StartPolicy` hace configurable el umbral mínimo (por defecto
//! basta un artifact cualquiera).
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::model::{ArtifactRef, ArtifactRequirementSet, JobStatus};

/// Política mínima de artifacts para poder iniciar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartPolicy {
    /// Cualquier artifact conocido basta (análisis best-effort del backend).
    #[default]
    AnyArtifact,
    /// Todos los requisitos declarados deben estar cubiertos.
    AllRequirements,
    /// Al menos N kinds distintos adjuntos (N ≥ 1).
    AtLeast(usize),
}

impl FromStr for StartPolicy {
    type Err = ModelError;

    /// Formatos: `any`, `all`, `at-least:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        match raw.as_str() {
            "any" => Ok(StartPolicy::AnyArtifact),
            "all" => Ok(StartPolicy::AllRequirements),
            other => {
                let n = other.strip_prefix("at-least:")
                             .and_then(|n| n.parse::<usize>().ok())
                             .filter(|n| *n >= 1)
                             .ok_or_else(|| ModelError::InvalidPolicy(s.to_string()))?;
                Ok(StartPolicy::AtLeast(n))
            }
        }
    }
}

impl fmt::Display for StartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPolicy::AnyArtifact => f.write_str("any"),
            StartPolicy::AllRequirements => f.write_str("all"),
            StartPolicy::AtLeast(n) => write!(f, "at-least:{n}"),
        }
    }
}

/// `kind` pertenece al conjunto de requisitos capturado por el job.
pub fn is_kind_known(requirement_set: &ArtifactRequirementSet, kind: &str) -> bool {
    requirement_set.contains(kind)
}

/// Predicado único de "iniciable". Nunca es verdadero con cero artifacts.
pub fn is_startable(policy: StartPolicy,
                    requirement_set: &ArtifactRequirementSet,
                    attached: &BTreeMap<String, ArtifactRef>)
                    -> bool {
    let known = attached.keys().filter(|k| is_kind_known(requirement_set, k)).count();
    if known == 0 {
        return false;
    }
    match policy {
        StartPolicy::AnyArtifact => true,
        StartPolicy::AllRequirements => requirement_set.kinds().all(|k| attached.contains_key(k)),
        StartPolicy::AtLeast(n) => known >= n.max(1),
    }
}

/// Estado "equipado" derivado de los artifacts adjuntos. Sólo aplica antes
/// de `Running`.
pub fn derive_equipped_status(policy: StartPolicy,
                              requirement_set: &ArtifactRequirementSet,
                              attached: &BTreeMap<String, ArtifactRef>)
                              -> JobStatus {
    if attached.is_empty() {
        JobStatus::Created
    } else if is_startable(policy, requirement_set, attached) {
        JobStatus::Startable
    } else {
        JobStatus::PartiallyEquipped
    }
}
