//! Corrupt-data placeholder
//!
//! Produced wherever a record exists but is inconsistent or truncated. Carries
//! the best-known address and an optional chained cause, exposed through
//! `std::error::Error::source`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptData {
    pub reason: String,
    pub address: Option<u64>,
    pub cause: Option<Box<CorruptData>>,
}

impl CorruptData {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            address: None,
            cause: None,
        }
    }

    pub fn at(reason: impl Into<String>, address: u64) -> Self {
        Self {
            reason: reason.into(),
            address: Some(address),
            cause: None,
        }
    }

    pub fn caused_by(mut self, cause: CorruptData) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Innermost cause of the chain
    pub fn root_cause(&self) -> &CorruptData {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }
}

impl fmt::Display for CorruptData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(address) => write!(f, "{} at {:#x}", self.reason, address),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for CorruptData {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
