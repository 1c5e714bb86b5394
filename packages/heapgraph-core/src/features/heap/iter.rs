//! Full heap iteration

use super::heap_graph::HeapGraph;
use crate::features::graph::ObjectNode;
use crate::features::object_store::{SegmentCursor, SegmentEntry};
use crate::shared::models::CorruptData;

/// Objects in dump order. Each call to [`HeapGraph::objects`] starts over;
/// dropping the iterator is enough to stop.
pub struct HeapObjects<'h> {
    heap: &'h HeapGraph,
    cursor: SegmentCursor,
}

impl<'h> HeapObjects<'h> {
    pub(crate) fn new(heap: &'h HeapGraph, cursor: SegmentCursor) -> Self {
        Self { heap, cursor }
    }
}

impl<'h> Iterator for HeapObjects<'h> {
    type Item = Result<ObjectNode<'h>, CorruptData>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.heap.cursor_step(&mut self.cursor)? {
            SegmentEntry::Object(record) => Some(Ok(ObjectNode::filled(self.heap, record))),
            SegmentEntry::Corrupt(corrupt) => Some(Err(corrupt)),
        }
    }
}
