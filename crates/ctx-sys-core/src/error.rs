//! Error taxonomy shared by every layer of ctx-sys.
//!
//! Mirrors the kinds in `SPEC_FULL.md` §7. Every fallible operation in this
//! crate and in `ctx-sys` returns `Result<T>` from this module rather than
//! `anyhow::Result` — callers at the outermost boundary (CLI, MCP) are the
//! only place this gets converted to a transport-specific shape.

use thiserror::Error;

/// Result alias used throughout ctx-sys.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("schema version {found} incompatible, requires {required}")]
    SchemaError { found: i64, required: i64 },

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("provider error ({capability}): {message}")]
    ProviderError {
        capability: &'static str,
        message: String,
    },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Stable short code surfaced to callers, independent of the display message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound { .. } => "not_found",
            Error::SchemaError { .. } => "schema_error",
            Error::StorageError(_) => "storage_error",
            Error::ProviderError { .. } => "provider_error",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::Cancelled => "cancelled",
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn provider(capability: &'static str, message: impl Into<String>) -> Self {
        Error::ProviderError {
            capability,
            message: message.into(),
        }
    }
}
