//! Custom assertions for heap graph tests

use heapgraph_core::{CorruptData, EdgeKind, HeapGraph, ReferenceEdge};

/// Addresses of every iterated object plus the corrupt entries, in order
pub fn iterate(heap: &HeapGraph) -> (Vec<u64>, Vec<CorruptData>) {
    let mut addresses = Vec::new();
    let mut corrupt = Vec::new();
    for entry in heap.objects() {
        match entry {
            Ok(node) => addresses.push(node.address()),
            Err(data) => corrupt.push(data),
        }
    }
    (addresses, corrupt)
}

/// Target addresses of edges of one kind, in edge order
pub fn targets_of(edges: &[ReferenceEdge<'_>], kind: EdgeKind) -> Vec<u64> {
    edges
        .iter()
        .filter(|edge| edge.kind == kind)
        .map(|edge| edge.target_address())
        .collect()
}

pub fn assert_no_corruption(heap: &HeapGraph) {
    let (_, corrupt) = iterate(heap);
    assert!(
        corrupt.is_empty(),
        "Expected clean iteration, got corrupt entries: {:?}",
        corrupt
    );
}
