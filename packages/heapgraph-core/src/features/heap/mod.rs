//! Heap graph entry point

mod heap_graph;
mod iter;
mod scan;
mod stats;

pub use heap_graph::{HeapGraph, HeapGraphBuilder};
pub use iter::HeapObjects;
pub use scan::ScanSummary;
pub use stats::HeapStats;
