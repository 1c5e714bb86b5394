//! Object records and segment descriptors

use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::features::address_compression::{AddressCompressor, RefList};
use crate::features::event_source::HeapEvent;
use crate::shared::models::{CorruptData, ObjectHash};

/// Shape of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectShape {
    Array { length: u32 },
    Plain,
    /// Known to be an array, length not recorded
    Unresolved,
    /// Nothing known yet
    Unknown,
}

impl ObjectShape {
    pub fn is_array(&self) -> bool {
        matches!(self, ObjectShape::Array { .. } | ObjectShape::Unresolved)
    }

    pub fn length(&self) -> Option<u32> {
        match self {
            ObjectShape::Array { length } => Some(*length),
            _ => None,
        }
    }
}

/// Which record produced the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Plain,
    ObjectArray { element_class_address: u64 },
    PrimitiveArray { type_code: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub address: u64,
    /// Class field as recorded. For object arrays this is the true array class
    /// when the dump flavor carries it, the element class otherwise.
    pub class_address: u64,
    pub kind: ObjectKind,
    pub shape: ObjectShape,
    pub hash: ObjectHash,
    /// `None` when the segment was materialized without references
    pub references: Option<RefList>,
}

impl ObjectRecord {
    /// Build a record from a stream event; class definitions yield `None`
    pub fn from_event(
        event: &HeapEvent,
        with_references: bool,
        array_class_in_refs: bool,
        compressor: &AddressCompressor,
    ) -> Option<Self> {
        let encode = |refs: &[u64]| with_references.then(|| RefList::encode(refs, compressor));

        match event {
            HeapEvent::ClassDef(_) => None,
            HeapEvent::Object(object) => Some(Self {
                address: object.address,
                class_address: object.class_address,
                kind: ObjectKind::Plain,
                shape: ObjectShape::Plain,
                hash: object.hash,
                references: encode(&object.references),
            }),
            HeapEvent::ObjectArray(array) => {
                let (class_address, elements) =
                    match (array_class_in_refs, array.references.split_first()) {
                        (true, Some((array_class, elements))) => (*array_class, elements),
                        _ => (array.element_class_address, &array.references[..]),
                    };
                Some(Self {
                    address: array.address,
                    class_address,
                    kind: ObjectKind::ObjectArray {
                        element_class_address: array.element_class_address,
                    },
                    shape: ObjectShape::Array {
                        length: array.length,
                    },
                    hash: array.hash,
                    references: encode(elements),
                })
            }
            HeapEvent::PrimitiveArray(array) => Some(Self {
                address: array.address,
                class_address: 0,
                kind: ObjectKind::PrimitiveArray {
                    type_code: array.type_code,
                },
                shape: ObjectShape::Array {
                    length: array.length,
                },
                hash: array.hash,
                references: Some(RefList::Absent),
            }),
        }
    }

    /// Minimal record built from hints, without replaying the stream
    pub fn from_hint(hint: &ObjectHint) -> Self {
        let shape = match (hint.kind, hint.length) {
            (ObjectKind::Plain, _) => ObjectShape::Plain,
            (_, Some(length)) => ObjectShape::Array { length },
            (_, None) => ObjectShape::Unresolved,
        };
        let references = match hint.kind {
            ObjectKind::PrimitiveArray { .. } => Some(RefList::Absent),
            _ => None,
        };
        Self {
            address: hint.address,
            class_address: hint.class_address,
            kind: hint.kind,
            shape,
            hash: hint.hash,
            references,
        }
    }

    pub fn has_references_loaded(&self) -> bool {
        self.references.is_some()
    }

    pub fn reference_addresses(&self, compressor: &AddressCompressor) -> Option<Vec<u64>> {
        self.references
            .as_ref()
            .map(|refs| refs.addresses(compressor))
    }
}

/// Cheap description of an object, enough to rebuild a minimal record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHint {
    pub address: u64,
    pub class_address: u64,
    pub kind: ObjectKind,
    pub length: Option<u32>,
    pub hash: ObjectHash,
}

impl ObjectHint {
    pub fn from_event(event: &HeapEvent, array_class_in_refs: bool) -> Option<Self> {
        match event {
            HeapEvent::ClassDef(_) => None,
            HeapEvent::Object(object) => Some(Self {
                address: object.address,
                class_address: object.class_address,
                kind: ObjectKind::Plain,
                length: None,
                hash: object.hash,
            }),
            HeapEvent::ObjectArray(array) => {
                let class_address = match (array_class_in_refs, array.references.first()) {
                    (true, Some(array_class)) => *array_class,
                    _ => array.element_class_address,
                };
                Some(Self {
                    address: array.address,
                    class_address,
                    kind: ObjectKind::ObjectArray {
                        element_class_address: array.element_class_address,
                    },
                    length: Some(array.length),
                    hash: array.hash,
                })
            }
            HeapEvent::PrimitiveArray(array) => Some(Self {
                address: array.address,
                class_address: 0,
                kind: ObjectKind::PrimitiveArray {
                    type_code: array.type_code,
                },
                length: Some(array.length),
                hash: array.hash,
            }),
        }
    }
}

/// Persistent description of one segment; survives payload eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    pub start_index: u64,
    pub next_index: u64,
    pub object_count: u32,
    pub min_address: u64,
    pub max_address: u64,
    pub budget: u64,
    pub has_references: bool,
    /// Last segment of the heap, either at end of stream or at a truncation
    pub terminal: bool,
}

impl SegmentDescriptor {
    pub fn contains(&self, address: u64) -> bool {
        self.object_count > 0 && self.min_address <= address && address <= self.max_address
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentEntry {
    Object(Rc<ObjectRecord>),
    Corrupt(CorruptData),
}

/// Materialized records of one segment, in stream order
#[derive(Debug, Default)]
pub struct SegmentPayload {
    entries: Vec<SegmentEntry>,
    by_address: FxHashMap<u64, usize>,
    with_references: bool,
}

impl SegmentPayload {
    pub(crate) fn new(
        entries: Vec<SegmentEntry>,
        by_address: FxHashMap<u64, usize>,
        with_references: bool,
    ) -> Self {
        Self {
            entries,
            by_address,
            with_references,
        }
    }

    pub fn get(&self, address: u64) -> Option<&Rc<ObjectRecord>> {
        match self.by_address.get(&address).map(|&i| &self.entries[i]) {
            Some(SegmentEntry::Object(record)) => Some(record),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[SegmentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn with_references(&self) -> bool {
        self.with_references
    }
}
