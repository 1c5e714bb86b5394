//! Heap statistics

use serde::{Deserialize, Serialize};

use crate::features::object_store::StoreStats;
use crate::shared::models::NamespaceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    pub record_count: u64,
    pub objects: u64,
    pub class_defs: u64,
    pub corrupt_records: u64,
    pub classes: usize,
    pub synthesized_classes: usize,
    pub namespaces: usize,
    pub loaders: usize,
    pub boot_namespace: NamespaceId,
    pub compression_enabled: bool,
    pub truncated: bool,
    pub store: StoreStats,
}

impl HeapStats {
    /// Share of segment requests served from the cache
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.store.cache_hits + self.store.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.store.cache_hits as f64 / total as f64
        }
    }
}
