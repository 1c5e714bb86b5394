//! Identity types shared by the registries and the graph layer

use serde::{Deserialize, Serialize};

/// Key of a class record
///
/// Real classes (and placeholders for addresses that objects point at but no
/// class record defines) are keyed by address. Classes fabricated by the
/// reconstruction layer get a synthetic id; the two variants never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassKey {
    Address(u64),
    Synthetic(u32),
}

impl ClassKey {
    /// On-heap address of the class, 0 for synthetic classes
    pub fn address(&self) -> u64 {
        match self {
            ClassKey::Address(address) => *address,
            ClassKey::Synthetic(_) => 0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, ClassKey::Synthetic(_))
    }
}

impl std::fmt::Display for ClassKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassKey::Address(address) => write!(f, "{:#x}", address),
            ClassKey::Synthetic(id) => write!(f, "synthetic#{}", id),
        }
    }
}

/// Index of a class-loader namespace within the heap's directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId(pub u32);

impl NamespaceId {
    /// The namespace every class starts in
    pub const DEFAULT: NamespaceId = NamespaceId(0);

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Counter for synthetic class keys
#[derive(Debug, Clone, Default)]
pub struct SyntheticIds {
    next: u32,
}

impl SyntheticIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self) -> ClassKey {
        let key = ClassKey::Synthetic(self.next);
        self.next += 1;
        key
    }

    pub fn issued(&self) -> u32 {
        self.next
    }
}
