//! Error types module
//!
//! Core errors plus the `ErrorMetadata` trait every error type in the workspace
//! implements. The retry policy reads `is_recoverable()` to decide whether a failed
//! unit of work is attempted again; logging reads `log_level()`.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like malformed input
    Debug,
    /// Warning level - for per-item failures the run recovers from
    Warn,
    /// Error level - for unexpected or fatal failures
    Error,
}

/// Metadata describing how an error should be classified and reported
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "MALFORMED_KEY")
    fn error_code(&self) -> &'static str;

    /// Whether this error is transient (the same call may succeed if retried)
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Malformed key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn malformed_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorMetadata for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::MalformedKey { .. } => "MALFORMED_KEY",
            CoreError::Config(_) => "CONFIG_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        match self {
            CoreError::MalformedKey { .. } => LogLevel::Warn,
            CoreError::Config(_) => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_key_metadata() {
        let err = CoreError::malformed_key("dropbox/bad", "missing owner segment");
        assert_eq!(err.error_code(), "MALFORMED_KEY");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert_eq!(
            err.to_string(),
            "Malformed key 'dropbox/bad': missing owner segment"
        );
    }

    #[test]
    fn test_config_metadata() {
        let err = CoreError::Config("S3_BUCKET must not be empty".to_string());
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Error);
    }
}
