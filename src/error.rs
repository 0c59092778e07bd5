//! Error handling for the ADC sampling driver
//!
//! This module defines the driver error type and a Result alias for use
//! throughout the crate. Only construction-time and command-level failures
//! are represented here; per-cycle problems (sample timeouts) are logged and
//! recorded in the report instead of being returned.

use thiserror::Error;

/// Main error type for driver operations
#[derive(Error, Debug)]
pub enum AdcError {
    /// The converter could not be initialised for the given base handle
    #[error("ADC init failed for base {base:#x} (code {code})")]
    HalInit { base: u32, code: i32 },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// `start` was issued while an instance is live
    #[error("already running")]
    AlreadyRunning,

    /// The engine was still inside a cycle when `stop` gave up waiting
    #[error("engine did not stop within {0:?}")]
    StopTimeout(std::time::Duration),

    /// A command needing a live instance was issued without one
    #[error("not running")]
    NotRunning,

    /// Token not understood by the command surface
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The self-test could not observe any report
    #[error("Self-test failed: {0}")]
    SelfTest(String),

    /// A serialized report had the wrong length
    #[error("Report decode error: expected {expected} bytes, got {actual}")]
    ReportLength { expected: usize, actual: usize },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AdcError>,
    },
}

impl AdcError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AdcError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Process-style result code for this error, as returned by the command surface
    pub fn exit_code(&self) -> i32 {
        match self {
            AdcError::HalInit { code, .. } if *code < 0 => *code,
            AdcError::WithContext { source, .. } => source.exit_code(),
            _ => 1,
        }
    }
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, AdcError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<AdcError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AdcError::with_context(e.into(), context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AdcError::with_context(e.into(), f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdcError::UnknownCommand("frobnicate".to_string());
        assert_eq!(err.to_string(), "unknown command: frobnicate");
    }

    #[test]
    fn test_error_with_context() {
        let err = AdcError::Config("bad mask".to_string());
        let with_ctx = err.with_context("Failed to load adc.toml");
        assert!(with_ctx.to_string().contains("Failed to load adc.toml"));
        assert!(with_ctx.to_string().contains("bad mask"));
    }

    #[test]
    fn test_hal_init_error() {
        let err = AdcError::HalInit {
            base: 0x4001_2000,
            code: -19,
        };
        assert!(err.to_string().contains("0x40012000"));
        assert_eq!(err.exit_code(), -19);
        assert_eq!(err.with_context("start").exit_code(), -19);
    }

    #[test]
    fn test_io_error_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.context("reading config").unwrap_err();
        assert!(matches!(err, AdcError::WithContext { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
