//! Ports to the external dump tokenizer
//!
//! The tokenizer is a replayable event source: every reader starts at record
//! 0, reports its position, and can be exited mid-stream by the listener and
//! resumed later by calling `parse` again.

use std::ops::ControlFlow;

use super::domain::{DumpHeader, HeapEvent, RecordCorruption};
use super::error::SourceResult;

/// Receives records in stream order
pub trait HeapListener {
    /// Called for every record. `index` is the record's logical position.
    fn on_event(&mut self, index: u64, event: &HeapEvent) -> ControlFlow<()>;

    /// Called for a record the tokenizer could not decode while the stream
    /// stayed aligned. The index is consumed like any other record.
    fn on_corrupt_record(&mut self, _index: u64, _corruption: &RecordCorruption) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// How a call to [`EventReader::parse`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The listener broke out; the reader can resume from `position()`
    Exited,
    /// End of stream reached
    Completed { record_count: u64 },
}

/// One cursor over the record stream
pub trait EventReader {
    /// Index of the next record `parse` will deliver
    fn position(&self) -> u64;

    /// Deliver records from the current position until the listener exits,
    /// the stream ends, or the stream turns out to be truncated
    fn parse(&mut self, listener: &mut dyn HeapListener) -> SourceResult<ParseOutcome>;

    fn close(&mut self);
}

/// Factory for readers over one dump
pub trait EventSource {
    fn header(&self) -> &DumpHeader;

    /// Open a fresh reader positioned at record 0
    fn open(&self) -> SourceResult<Box<dyn EventReader>>;
}
