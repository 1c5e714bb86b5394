//! Heap builders for tests

use heapgraph_core::{HeapConfig, HeapGraph, Preset, RecordedDump};

/// Smallest valid segments and a tiny cache, so tests cross segment
/// boundaries and evict payloads with only a few dozen objects
pub fn small_config() -> HeapConfig {
    HeapConfig::from_preset(Preset::Compact)
        .segment_budget(100)
        .max_cached_segments(2)
        .reader_pool_size(2)
}

pub fn open_heap(dump: RecordedDump) -> HeapGraph {
    HeapGraph::open(dump, HeapConfig::default()).expect("heap should open")
}

pub fn open_small(dump: RecordedDump) -> HeapGraph {
    HeapGraph::open(dump, small_config()).expect("heap should open")
}

/// Route crate logs to the test harness; `RUST_LOG=heapgraph_core=debug` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
