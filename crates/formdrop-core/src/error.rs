//! Error types module
//!
//! `ConfigurationError` is the construction-time failure shared by every crate that
//! validates engine options. Runtime failures (content resolution, upload, removal)
//! live next to the code that produces them but describe themselves through the same
//! `ErrorMetadata` trait, so the request layer that owns HTTP can map any of them to a
//! response without matching on concrete types.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for best-effort failures that do not fail the request
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Describes how an error should be surfaced by the layer that owns the request.
pub trait ErrorMetadata {
    /// Suggested HTTP status code for the request layer
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UPLOAD_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same operation may succeed
    fn is_recoverable(&self) -> bool;

    /// Whether the error must fail the operation that produced it
    fn is_fatal(&self) -> bool {
        true
    }

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Engine configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("a storage client is required")]
    MissingClient,

    #[error("`{0}` is required")]
    MissingField(&'static str),

    #[error("`{field}` must be {expected}, got {found}")]
    InvalidType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("invalid `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unsupported server-side encryption mode `{token}` (allowed: {})", allowed.join(", "))]
    UnsupportedEncryption { token: String, allowed: Vec<String> },

    #[error("`sseKmsKeyId` requires a KMS server-side encryption mode")]
    KmsKeyWithoutKms,

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
}

impl ConfigurationError {
    /// Type mismatch for a field of a dynamic configuration object.
    pub fn invalid_type(
        field: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        ConfigurationError::InvalidType {
            field: field.into(),
            expected,
            found: json_type_name(found),
        }
    }
}

impl ErrorMetadata for ConfigurationError {
    fn http_status_code(&self) -> u16 {
        500
    }

    fn error_code(&self) -> &'static str {
        "CONFIGURATION_ERROR"
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }
}

/// Human-readable JSON type name used in type-mismatch messages.
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
