//! Heap object store
//!
//! Random lookup by address and full forward iteration over the heap without
//! holding it in memory. Built on the replayable event source.

mod collector;
pub mod domain;
mod reader_pool;
mod store;

pub use collector::record_cost;
pub use domain::{
    ObjectHint, ObjectKind, ObjectRecord, ObjectShape, SegmentDescriptor, SegmentEntry,
    SegmentPayload,
};
pub use reader_pool::ReaderPool;
pub use store::{
    FetchedSegment, HeapObjectStore, ReplayEnd, SegmentCursor, StoreSettings, StoreStats,
};
