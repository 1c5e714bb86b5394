//! Accessor outcomes
//!
//! A node can be partly valid, so every accessor that may fail says why:
//! the fact was never recorded, or the record behind it is inconsistent.

use thiserror::Error;

use crate::shared::models::CorruptData;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The dump never recorded this fact; not an error in the dump
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The record exists but is inconsistent or truncated
    #[error("Corrupt data: {0}")]
    Corrupt(#[source] CorruptData),
}

impl NodeError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        NodeError::Unavailable(msg.into())
    }

    pub fn corrupt_at(reason: impl Into<String>, address: u64) -> Self {
        NodeError::Corrupt(CorruptData::at(reason, address))
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, NodeError::Corrupt(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, NodeError::Unavailable(_))
    }

    pub fn corrupt_data(&self) -> Option<&CorruptData> {
        match self {
            NodeError::Corrupt(corrupt) => Some(corrupt),
            NodeError::Unavailable(_) => None,
        }
    }

    /// Wrap as the cause of a new corrupt placeholder
    pub fn context(self, reason: impl Into<String>, address: u64) -> Self {
        let outer = CorruptData::at(reason, address);
        match self {
            NodeError::Corrupt(cause) => NodeError::Corrupt(outer.caused_by(cause)),
            NodeError::Unavailable(msg) => {
                NodeError::Corrupt(outer.caused_by(CorruptData::new(msg)))
            }
        }
    }
}

impl From<CorruptData> for NodeError {
    fn from(corrupt: CorruptData) -> Self {
        NodeError::Corrupt(corrupt)
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
