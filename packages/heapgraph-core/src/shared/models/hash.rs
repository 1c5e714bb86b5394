//! Identity hash state recorded for objects and classes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectHash {
    /// No hash was ever requested
    #[default]
    Unhashed,
    /// Hashed in place
    Hashed(i32),
    /// Hashed, then moved by the collector; the code lives in a hash slot
    HashedAndMoved(i32),
}

impl ObjectHash {
    pub fn code(&self) -> Option<i32> {
        match self {
            ObjectHash::Unhashed => None,
            ObjectHash::Hashed(code) | ObjectHash::HashedAndMoved(code) => Some(*code),
        }
    }
}
