//! In-memory recorded dump
//!
//! A replayable event source over records that were already decoded. It can
//! simulate a stream cut off inside a record and per-record corruption, and
//! counts how many readers were opened so callers can observe replay cost.

use std::cell::Cell;
use std::ops::ControlFlow;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::features::event_source::domain::{
    ClassDefRecord, DumpHeader, HeapEvent, ObjectArrayEvent, ObjectEvent, PrimitiveArrayEvent,
    RecordCorruption,
};
use crate::features::event_source::error::{SourceError, SourceResult};
use crate::features::event_source::ports::{EventReader, EventSource, HeapListener, ParseOutcome};
use crate::shared::constants::format::{MAX_SUPPORTED_VERSION, MIN_SUPPORTED_VERSION};
use crate::shared::models::ObjectHash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordedItem {
    Event(HeapEvent),
    Corrupt(RecordCorruption),
}

#[derive(Debug, Clone)]
pub struct RecordedDump {
    header: DumpHeader,
    items: Rc<[RecordedItem]>,
    truncated_at: Option<usize>,
    opens: Rc<Cell<usize>>,
    delivered: Rc<Cell<u64>>,
}

impl RecordedDump {
    pub fn new(header: DumpHeader, items: Vec<RecordedItem>) -> Self {
        Self {
            header,
            items: items.into(),
            truncated_at: None,
            opens: Rc::new(Cell::new(0)),
            delivered: Rc::new(Cell::new(0)),
        }
    }

    /// Cut the stream after `intact` records; reading past them fails with
    /// [`SourceError::Truncated`]
    pub fn truncated_after(mut self, intact: usize) -> Self {
        self.truncated_at = Some(intact.min(self.items.len()));
        self
    }

    /// Readers opened so far, across all clones of this dump
    pub fn reader_opens(&self) -> usize {
        self.opens.get()
    }

    /// Records handed to listeners so far, across all readers
    pub fn records_delivered(&self) -> u64 {
        self.delivered.get()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl EventSource for RecordedDump {
    fn header(&self) -> &DumpHeader {
        &self.header
    }

    fn open(&self) -> SourceResult<Box<dyn EventReader>> {
        let version = self.header.version;
        if !(MIN_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&version) {
            return Err(SourceError::format(format!(
                "header version {} outside {}..={}",
                version, MIN_SUPPORTED_VERSION, MAX_SUPPORTED_VERSION
            )));
        }

        self.opens.set(self.opens.get() + 1);
        Ok(Box::new(RecordedReader {
            items: Rc::clone(&self.items),
            truncated_at: self.truncated_at,
            delivered: Rc::clone(&self.delivered),
            position: 0,
            closed: false,
        }))
    }
}

struct RecordedReader {
    items: Rc<[RecordedItem]>,
    truncated_at: Option<usize>,
    delivered: Rc<Cell<u64>>,
    position: usize,
    closed: bool,
}

impl EventReader for RecordedReader {
    fn position(&self) -> u64 {
        self.position as u64
    }

    fn parse(&mut self, listener: &mut dyn HeapListener) -> SourceResult<ParseOutcome> {
        if self.closed {
            return Err(SourceError::Closed);
        }

        while self.position < self.items.len() {
            if self.truncated_at == Some(self.position) {
                return Err(SourceError::truncated(
                    self.position as u64,
                    "stream ended inside a record",
                ));
            }

            let index = self.position as u64;
            self.position += 1;
            self.delivered.set(self.delivered.get() + 1);

            let flow = match &self.items[index as usize] {
                RecordedItem::Event(event) => listener.on_event(index, event),
                RecordedItem::Corrupt(corruption) => listener.on_corrupt_record(index, corruption),
            };
            if let ControlFlow::Break(()) = flow {
                return Ok(ParseOutcome::Exited);
            }
        }

        if self.truncated_at == Some(self.items.len()) {
            return Err(SourceError::truncated(
                self.position as u64,
                "stream ended before the end-of-dump marker",
            ));
        }

        Ok(ParseOutcome::Completed {
            record_count: self.items.len() as u64,
        })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Fluent builder for recorded dumps
#[derive(Debug, Clone, Default)]
pub struct DumpBuilder {
    header: DumpHeader,
    items: Vec<RecordedItem>,
    truncate_after: Option<usize>,
}

impl DumpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: u32) -> Self {
        self.header.version = version;
        self
    }

    pub fn array_class_in_refs(mut self, flag: bool) -> Self {
        self.header.array_class_in_refs = flag;
        self
    }

    pub fn class_def(mut self, record: ClassDefRecord) -> Self {
        self.items.push(RecordedItem::Event(HeapEvent::ClassDef(record)));
        self
    }

    /// Shorthand for a class with a known superclass and no references
    pub fn class(self, address: u64, name: &str, super_address: u64) -> Self {
        self.class_def(ClassDefRecord::new(address, name).with_super(super_address))
    }

    pub fn object(mut self, address: u64, class_address: u64, references: Vec<u64>) -> Self {
        self.items.push(RecordedItem::Event(HeapEvent::Object(ObjectEvent {
            address,
            class_address,
            hash: ObjectHash::Unhashed,
            references,
        })));
        self
    }

    pub fn object_array(
        mut self,
        address: u64,
        element_class_address: u64,
        references: Vec<u64>,
    ) -> Self {
        let element_count = if self.header.array_class_in_refs {
            references.len().saturating_sub(1)
        } else {
            references.len()
        };
        let length = element_count as u32;
        self.items.push(RecordedItem::Event(HeapEvent::ObjectArray(ObjectArrayEvent {
            address,
            element_class_address,
            length,
            hash: ObjectHash::Unhashed,
            references,
        })));
        self
    }

    pub fn primitive_array(mut self, address: u64, type_code: u8, length: u32) -> Self {
        self.items.push(RecordedItem::Event(HeapEvent::PrimitiveArray(
            PrimitiveArrayEvent {
                address,
                type_code,
                length,
                hash: ObjectHash::Unhashed,
            },
        )));
        self
    }

    pub fn event(mut self, event: HeapEvent) -> Self {
        self.items.push(RecordedItem::Event(event));
        self
    }

    pub fn corrupt(mut self, address: Option<u64>, reason: &str) -> Self {
        self.items.push(RecordedItem::Corrupt(RecordCorruption {
            address,
            reason: reason.to_string(),
        }));
        self
    }

    /// Everything added after this call is lost to a truncated stream
    pub fn truncate_here(mut self) -> Self {
        self.truncate_after = Some(self.items.len());
        self
    }

    pub fn build(self) -> RecordedDump {
        let dump = RecordedDump::new(self.header, self.items);
        match self.truncate_after {
            Some(intact) => dump.truncated_after(intact),
            None => dump,
        }
    }
}
