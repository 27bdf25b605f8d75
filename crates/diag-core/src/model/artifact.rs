//! Artifacts adjuntados a un job.
//!
//! - `ArtifactPayload`: lo que sube el llamador (nombre, media type y
//!   contenido JSON neutro; el core no interpreta `content`).
//! - `ArtifactRef`: lo que devuelve el store al persistirlo. `hash` es blake3
//!   del JSON canónico del payload completo.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hashing::hash_value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    pub file_name: String,
    pub media_type: String,
    pub content: Value,
}

impl ArtifactPayload {
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, content: Value) -> Self {
        Self { file_name: file_name.into(),
               media_type: media_type.into(),
               content }
    }

    /// Hash de contenido (identidad del artifact).
    pub fn content_hash(&self) -> String {
        hash_value(&serde_json::json!({
            "file_name": self.file_name,
            "media_type": self.media_type,
            "content": self.content,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub kind: String,
    pub hash: String,
    pub file_name: String,
    pub attached_at: DateTime<Utc>,
}

impl ArtifactRef {
    pub fn for_payload(kind: impl Into<String>, payload: &ArtifactPayload) -> Self {
        Self { kind: kind.into(),
               hash: payload.content_hash(),
               file_name: payload.file_name.clone(),
               attached_at: Utc::now() }
    }
}
