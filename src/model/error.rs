use serde::Serialize;
use thiserror::Error;

/// Error value used throughout the engine.
///
/// Library code returns these as explicit values up to the caller; only the
/// API layer converts them into HTTP responses, using the optional `status`
/// hint. Truly fatal misconfiguration (a missing encryption key) is the one
/// exception and surfaces through `anyhow` at startup instead.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct EngineError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl EngineError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Schema mismatch on construction or config update.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("invalid_type", message).with_status(400)
    }

    /// UUID lookups that miss, surfaced with 404 semantics at the REST boundary.
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message).with_status(404)
    }

    /// Failures from the remote HTTP call or from upstream API error bodies.
    /// The upstream status code is preserved where available.
    pub fn upstream(message: impl Into<String>, upstream_status: Option<u16>) -> Self {
        Self::new("upstream_error", message).with_status(upstream_status.unwrap_or(502))
    }

    /// Encryption/decryption failures. Callers degrade to treating the stored
    /// value as absent rather than corrupting subsequent reads.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::new("encryption_error", message).with_status(500)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message).with_status(500)
    }
}
