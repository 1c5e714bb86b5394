//! Listener that materializes one segment

use std::ops::ControlFlow;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::domain::{ObjectRecord, SegmentEntry, SegmentPayload};
use crate::features::address_compression::{AddressCompressor, RefList};
use crate::features::event_source::{HeapEvent, HeapListener, RecordCorruption};
use crate::shared::constants::cost::{PRIMITIVE_ARRAY_COST, RECORD_BASE_COST};
use crate::shared::models::CorruptData;

/// Cost of materializing one record
pub fn record_cost(event: &HeapEvent, reference_cost_scale: u64) -> u64 {
    match event {
        HeapEvent::ClassDef(_) => 0,
        HeapEvent::PrimitiveArray(_) => PRIMITIVE_ARRAY_COST,
        other => {
            let references = other.references().len() as u64;
            RECORD_BASE_COST + references / reference_cost_scale.max(1)
        }
    }
}

pub(crate) struct SegmentCollector<'a> {
    start_index: u64,
    budget: u64,
    reference_cost_scale: u64,
    with_references: bool,
    array_class_in_refs: bool,
    compressor: &'a AddressCompressor,
    /// Record indices whose address an earlier record already used
    duplicates: &'a FxHashSet<u64>,
    cost: u64,
    entries: Vec<SegmentEntry>,
    by_address: FxHashMap<u64, usize>,
    object_count: u32,
    min_address: u64,
    max_address: u64,
    last_address: Option<u64>,
    last_index: Option<u64>,
    compressed_lists: u64,
    wide_lists: u64,
}

/// Bounds gathered while collecting
pub(crate) struct CollectedBounds {
    pub object_count: u32,
    pub min_address: u64,
    pub max_address: u64,
    pub last_index: Option<u64>,
    pub compressed_lists: u64,
    pub wide_lists: u64,
}

impl<'a> SegmentCollector<'a> {
    pub fn new(
        start_index: u64,
        budget: u64,
        reference_cost_scale: u64,
        with_references: bool,
        array_class_in_refs: bool,
        compressor: &'a AddressCompressor,
        duplicates: &'a FxHashSet<u64>,
    ) -> Self {
        Self {
            start_index,
            budget,
            reference_cost_scale,
            with_references,
            array_class_in_refs,
            compressor,
            duplicates,
            cost: 0,
            entries: Vec::new(),
            by_address: FxHashMap::default(),
            object_count: 0,
            min_address: u64::MAX,
            max_address: 0,
            last_address: None,
            last_index: None,
            compressed_lists: 0,
            wide_lists: 0,
        }
    }

    fn charge(&mut self, cost: u64) -> ControlFlow<()> {
        self.cost += cost;
        if self.cost >= self.budget {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn push_record(&mut self, record: ObjectRecord) {
        let address = record.address;
        if self.by_address.contains_key(&address) {
            self.entries.push(SegmentEntry::Corrupt(CorruptData::at(
                "duplicate object address",
                address,
            )));
            return;
        }

        match record.references {
            Some(RefList::Compressed(_)) => self.compressed_lists += 1,
            Some(RefList::Wide(_)) => self.wide_lists += 1,
            _ => {}
        }
        self.by_address.insert(address, self.entries.len());
        self.entries.push(SegmentEntry::Object(Rc::new(record)));
        self.object_count += 1;
        self.min_address = self.min_address.min(address);
        self.max_address = self.max_address.max(address);
        self.last_address = Some(address);
    }

    /// Close the segment after the stream broke. Exactly one placeholder is
    /// emitted, at the last address this segment or an earlier one produced.
    pub fn terminate(&mut self, reason: String, preceding_address: Option<u64>) -> CorruptData {
        let corrupt = match self.last_address.or(preceding_address) {
            Some(address) => CorruptData::at(reason, address),
            None => CorruptData::new(reason),
        };
        self.entries.push(SegmentEntry::Corrupt(corrupt.clone()));
        corrupt
    }

    pub fn finish(self) -> (SegmentPayload, CollectedBounds) {
        let bounds = CollectedBounds {
            object_count: self.object_count,
            min_address: if self.object_count == 0 { 0 } else { self.min_address },
            max_address: self.max_address,
            last_index: self.last_index,
            compressed_lists: self.compressed_lists,
            wide_lists: self.wide_lists,
        };
        (
            SegmentPayload::new(self.entries, self.by_address, self.with_references),
            bounds,
        )
    }
}

impl HeapListener for SegmentCollector<'_> {
    fn on_event(&mut self, index: u64, event: &HeapEvent) -> ControlFlow<()> {
        if index < self.start_index {
            return ControlFlow::Continue(());
        }
        self.last_index = Some(index);

        match ObjectRecord::from_event(
            event,
            self.with_references,
            self.array_class_in_refs,
            self.compressor,
        ) {
            Some(record) if self.duplicates.contains(&index) => {
                self.entries.push(SegmentEntry::Corrupt(CorruptData::at(
                    "duplicate object address",
                    record.address,
                )));
                self.charge(record_cost(event, self.reference_cost_scale))
            }
            Some(record) => {
                self.push_record(record);
                self.charge(record_cost(event, self.reference_cost_scale))
            }
            None => ControlFlow::Continue(()),
        }
    }

    fn on_corrupt_record(&mut self, index: u64, corruption: &RecordCorruption) -> ControlFlow<()> {
        if index < self.start_index {
            return ControlFlow::Continue(());
        }
        self.last_index = Some(index);

        let corrupt = match corruption.address.or(self.last_address) {
            Some(address) => CorruptData::at(corruption.reason.clone(), address),
            None => CorruptData::new(corruption.reason.clone()),
        };
        self.entries.push(SegmentEntry::Corrupt(corrupt));
        self.charge(RECORD_BASE_COST)
    }
}
