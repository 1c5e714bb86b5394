//! Models shared across features

pub mod corrupt;
pub mod hash;
pub mod ids;

pub use corrupt::CorruptData;
pub use hash::ObjectHash;
pub use ids::{ClassKey, NamespaceId, SyntheticIds};
