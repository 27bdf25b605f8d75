//! `ArtifactRequirementSet`: qué inputs (por tipo semántico) necesita un tipo
//! de job antes de poder ejecutarse.
//!
//! El orden de inserción se conserva para mostrar (IndexMap) pero no tiene
//! peso en la validación: un requisito se satisface por pertenencia del
//! `kind`, no por posición. La unicidad de `kind` es estructural.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Descriptor individual `{ kind, label }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRequirement {
    pub kind: String,
    pub label: String,
}

impl ArtifactRequirement {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self { kind: kind.into(),
               label: label.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRequirementSet {
    /// Identificador del tipo de job (p. ej. `ct-diagnosis`).
    pub id: String,
    requirements: IndexMap<String, String>,
}

impl ArtifactRequirementSet {
    pub fn new(id: impl Into<String>, requirements: impl IntoIterator<Item = ArtifactRequirement>) -> Result<Self, ModelError> {
        let mut map = IndexMap::new();
        for req in requirements {
            if map.contains_key(&req.kind) {
                return Err(ModelError::DuplicateRequirementKind(req.kind));
            }
            map.insert(req.kind, req.label);
        }
        Ok(Self { id: id.into(),
                  requirements: map })
    }

    /// Tabla estática de kinds únicos (catálogo).
    pub(crate) fn from_table(id: &str, table: &[(&str, &str)]) -> Self {
        let requirements = table.iter().map(|(kind, label)| (kind.to_string(), label.to_string())).collect();
        Self { id: id.to_string(),
               requirements }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.requirements.contains_key(kind)
    }

    pub fn label(&self, kind: &str) -> Option<&str> {
        self.requirements.get(kind).map(String::as_str)
    }

    /// Requisitos en orden de declaración.
    pub fn iter(&self) -> impl Iterator<Item = ArtifactRequirement> + '_ {
        self.requirements
            .iter()
            .map(|(kind, label)| ArtifactRequirement::new(kind.clone(), label.clone()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.requirements.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}
