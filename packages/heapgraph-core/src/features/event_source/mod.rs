//! Event source port
//!
//! The reconstruction layer never reads dump bytes itself. It consumes typed
//! records from an [`EventSource`], replaying the stream as often as the
//! object store and the loader resolver need.

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

pub use domain::{
    ClassDefRecord, DumpHeader, HeapEvent, ObjectArrayEvent, ObjectEvent, PrimitiveArrayEvent,
    RecordCorruption,
};
pub use error::{SourceError, SourceResult};
pub use infrastructure::{DumpBuilder, RecordedDump, RecordedItem};
pub use ports::{EventReader, EventSource, HeapListener, ParseOutcome};
