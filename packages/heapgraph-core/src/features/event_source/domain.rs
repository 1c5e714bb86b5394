//! Typed records produced by the dump tokenizer

use serde::{Deserialize, Serialize};

use crate::shared::models::ObjectHash;

/// Stream header, read once before any record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpHeader {
    /// Format version of the dump
    pub version: u32,

    /// Object-array records carry one extra leading reference naming the true
    /// array class. This is the only decision the header flavor affects.
    pub array_class_in_refs: bool,

    /// Free-form producer identification
    #[serde(default)]
    pub producer: String,
}

impl Default for DumpHeader {
    fn default() -> Self {
        Self {
            version: 6,
            array_class_in_refs: false,
            producer: String::new(),
        }
    }
}

/// Class definition record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefRecord {
    pub address: u64,
    /// `None`: the record does not carry a superclass. `Some(0)`: no superclass.
    pub super_address: Option<u64>,
    pub name: String,
    pub instance_size: Option<u64>,
    #[serde(default)]
    pub hash: ObjectHash,
    /// Outbound references in dump order (statics, constant pool, loader, mirror)
    #[serde(default)]
    pub references: Vec<u64>,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl ClassDefRecord {
    pub fn new(address: u64, name: impl Into<String>) -> Self {
        Self {
            address,
            super_address: None,
            name: name.into(),
            instance_size: None,
            hash: ObjectHash::Unhashed,
            references: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_super(mut self, super_address: u64) -> Self {
        self.super_address = Some(super_address);
        self
    }

    pub fn with_instance_size(mut self, size: u64) -> Self {
        self.instance_size = Some(size);
        self
    }

    pub fn with_references(mut self, references: Vec<u64>) -> Self {
        self.references = references;
        self
    }

    pub fn with_methods(mut self, methods: Vec<String>) -> Self {
        self.methods = methods;
        self
    }
}

/// Plain object record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEvent {
    pub address: u64,
    pub class_address: u64,
    #[serde(default)]
    pub hash: ObjectHash,
    #[serde(default)]
    pub references: Vec<u64>,
}

/// Object-array record
///
/// With `DumpHeader::array_class_in_refs`, `references[0]` is the address of
/// the true array class and the elements follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectArrayEvent {
    pub address: u64,
    pub element_class_address: u64,
    pub length: u32,
    #[serde(default)]
    pub hash: ObjectHash,
    #[serde(default)]
    pub references: Vec<u64>,
}

/// Primitive-array record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveArrayEvent {
    pub address: u64,
    /// Element type token, 0..=7 for the known primitive types
    pub type_code: u8,
    pub length: u32,
    #[serde(default)]
    pub hash: ObjectHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapEvent {
    ClassDef(ClassDefRecord),
    Object(ObjectEvent),
    ObjectArray(ObjectArrayEvent),
    PrimitiveArray(PrimitiveArrayEvent),
}

impl HeapEvent {
    /// Address of the record, whatever its kind
    pub fn address(&self) -> u64 {
        match self {
            HeapEvent::ClassDef(record) => record.address,
            HeapEvent::Object(event) => event.address,
            HeapEvent::ObjectArray(event) => event.address,
            HeapEvent::PrimitiveArray(event) => event.address,
        }
    }

    /// Whether the record describes a heap object rather than a class
    pub fn is_object(&self) -> bool {
        !matches!(self, HeapEvent::ClassDef(_))
    }

    /// Outbound references as they appear in the record
    pub fn references(&self) -> &[u64] {
        match self {
            HeapEvent::ClassDef(record) => &record.references,
            HeapEvent::Object(event) => &event.references,
            HeapEvent::ObjectArray(event) => &event.references,
            HeapEvent::PrimitiveArray(_) => &[],
        }
    }
}

/// Per-record corruption reported by the tokenizer while the stream position
/// is still trustworthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCorruption {
    pub address: Option<u64>,
    pub reason: String,
}
