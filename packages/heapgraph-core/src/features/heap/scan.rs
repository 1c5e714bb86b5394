//! Initial scan
//!
//! The first full pass over the dump. It feeds the registry builder, observes
//! every address for the compressor, and remembers the first and last object
//! so the heap extent is known without another replay. A record reusing an
//! address is noted by index so every later replay marks it corrupt.

use std::ops::ControlFlow;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::features::address_compression::AddressCompressor;
use crate::features::class_registry::RegistryBuilder;
use crate::features::event_source::{HeapEvent, HeapListener, RecordCorruption};
use crate::features::object_store::ObjectHint;
use crate::shared::models::CorruptData;

/// What the initial scan saw
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub record_count: u64,
    pub objects: u64,
    pub class_defs: u64,
    pub corrupt_records: u64,
    /// Object records whose address an earlier record already used
    pub duplicate_objects: u64,
    pub first_object: Option<ObjectHint>,
    pub last_object: Option<ObjectHint>,
    pub min_address: Option<u64>,
    pub max_address: Option<u64>,
    /// Set when the stream broke before its end
    pub truncated: Option<CorruptData>,
}

impl ScanSummary {
    pub fn extent(&self) -> Option<(u64, u64)> {
        self.min_address.zip(self.max_address)
    }
}

pub(crate) struct InitialScan {
    pub builder: RegistryBuilder,
    pub compressor: AddressCompressor,
    pub summary: ScanSummary,
    /// Indices of records reusing an earlier address
    pub duplicate_records: FxHashSet<u64>,
    seen: FxHashSet<u64>,
    array_class_in_refs: bool,
}

impl InitialScan {
    pub fn new(array_class_in_refs: bool) -> Self {
        Self {
            builder: RegistryBuilder::new(),
            compressor: AddressCompressor::new(),
            summary: ScanSummary::default(),
            duplicate_records: FxHashSet::default(),
            seen: FxHashSet::default(),
            array_class_in_refs,
        }
    }

    fn observe_object(&mut self, hint: ObjectHint) {
        let summary = &mut self.summary;
        summary.objects += 1;
        summary.min_address = Some(summary.min_address.map_or(hint.address, |m| m.min(hint.address)));
        summary.max_address = Some(summary.max_address.map_or(hint.address, |m| m.max(hint.address)));
        if summary.first_object.is_none() {
            summary.first_object = Some(hint);
        }
        summary.last_object = Some(hint);

        self.compressor.observe_object(hint.address);
        if hint.class_address != 0 {
            self.compressor.observe_class(hint.class_address);
        }
        self.builder.add_object(&hint);
    }
}

impl HeapListener for InitialScan {
    fn on_event(&mut self, index: u64, event: &HeapEvent) -> ControlFlow<()> {
        self.summary.record_count = index + 1;
        match event {
            HeapEvent::ClassDef(def) => {
                self.summary.class_defs += 1;
                self.compressor.observe_class(def.address);
                self.builder.add_class(def);
            }
            other => {
                if let Some(hint) = ObjectHint::from_event(other, self.array_class_in_refs) {
                    if self.seen.insert(hint.address) {
                        self.observe_object(hint);
                    } else {
                        self.summary.duplicate_objects += 1;
                        self.duplicate_records.insert(index);
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn on_corrupt_record(&mut self, index: u64, _corruption: &RecordCorruption) -> ControlFlow<()> {
        self.summary.record_count = index + 1;
        self.summary.corrupt_records += 1;
        ControlFlow::Continue(())
    }
}
