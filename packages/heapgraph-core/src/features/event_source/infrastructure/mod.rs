//! Event source implementations

mod recorded;

pub use recorded::{DumpBuilder, RecordedDump, RecordedItem};
