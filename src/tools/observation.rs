//! Structured result of one tool invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success payload or error payload. Serialises to the payload itself, so an
/// error is `{"error": "..."}` and a success is whatever the tool returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observation {
    Error { error: String },
    Success(Value),
}

impl Observation {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Compact JSON text used in the transcript.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Unserialisable observation: {}", e) }).to_string()
        })
    }

    pub fn from_text(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Look up a top-level key of a success payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Success(value) => value.get(key),
            Self::Error { .. } => None,
        }
    }
}
