//! Class-loader resolution
//!
//! Partitions classes across loader namespaces from structural evidence in
//! the dump, optionally enriched by a companion process snapshot.

mod companion;
mod resolver;

pub use companion::{
    CompanionSnapshot, SnapshotClass, SnapshotLoader, SnapshotMonitor, SnapshotThread,
};
pub use resolver::{ClassLoaderResolver, LoaderCensus, ResolveReport};
