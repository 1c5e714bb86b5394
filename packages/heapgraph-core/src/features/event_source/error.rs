//! Event source errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying stream could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header or record layout the reader does not understand
    #[error("Unsupported dump format: {0}")]
    Format(String),

    /// The stream ended inside a record; nothing after `index` is readable
    #[error("Stream truncated at record {index}: {reason}")]
    Truncated { index: u64, reason: String },

    /// The reader was closed before the call
    #[error("Reader closed")]
    Closed,
}

impl SourceError {
    pub fn format(msg: impl Into<String>) -> Self {
        SourceError::Format(msg.into())
    }

    pub fn truncated(index: u64, reason: impl Into<String>) -> Self {
        SourceError::Truncated {
            index,
            reason: reason.into(),
        }
    }

    pub fn is_truncation(&self) -> bool {
        matches!(self, SourceError::Truncated { .. })
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
