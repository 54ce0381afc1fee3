//! Error handling for ecorex-store
//!
//! Store-level entry points (configuration) return [`ExError`]; the format
//! and provider trait impls return the core's `ModelError` so the kernel can
//! propagate them unchanged.

use ecorex_core::errors::{ExError, ExErrorKind, ModelError};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a configuration error
pub fn config_error(path: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("config_load")
        .with_message(format!("Invalid configuration {}: {}", path, reason))
}

/// Create a malformed-XML error at an optional 1-based line
pub fn xml_error(reason: impl Into<String>, line: Option<usize>) -> ModelError {
    ModelError::malformed(reason, line)
}

/// Map a filesystem error for `uri`; a missing file is `ResourceNotFound`
pub fn provider_error(uri: &str, err: std::io::Error) -> ModelError {
    match err.kind() {
        std::io::ErrorKind::NotFound => ModelError::ResourceNotFound { uri: uri.to_string() },
        _ => ModelError::Io {
            uri: uri.to_string(),
            message: err.to_string(),
        },
    }
}
