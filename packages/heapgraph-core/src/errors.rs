//! Error types for heapgraph-core
//!
//! `HeapError` is the fatal tier: the dump cannot be opened, has the wrong
//! format, or the configuration is invalid. Per-record problems never surface
//! here; they become `CorruptData` placeholders on the affected nodes.

use thiserror::Error;

use crate::config::ConfigError;
use crate::features::event_source::SourceError;

/// Main error type for opening a heap dump
#[derive(Debug, Error)]
pub enum HeapError {
    /// The event source could not be opened or read at all
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Companion snapshot could not be decoded
    #[error("Companion snapshot error: {0}")]
    Companion(String),
}

impl HeapError {
    /// Create a companion snapshot error
    pub fn companion(msg: impl Into<String>) -> Self {
        HeapError::Companion(msg.into())
    }
}

impl From<serde_json::Error> for HeapError {
    fn from(err: serde_json::Error) -> Self {
        HeapError::Companion(format!("JSON error: {}", err))
    }
}

/// Result type alias for heap operations
pub type Result<T> = std::result::Result<T, HeapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_format_error_display() {
        let err: HeapError = SourceError::format("unexpected header tag 0x09").into();
        assert!(matches!(err, HeapError::Source(SourceError::Format(_))));
        assert!(err.to_string().contains("unexpected header tag 0x09"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json")
            .err()
            .unwrap();
        let err: HeapError = json_err.into();
        assert!(matches!(err, HeapError::Companion(_)));
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_result_propagation() {
        fn inner() -> Result<()> {
            Err(HeapError::companion("missing loaders"))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert!(err.to_string().contains("missing loaders"));
    }
}
