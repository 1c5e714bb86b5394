//! Dump fixtures
//!
//! Every fixture starts from the same core classes so loader detection and
//! class lookups behave like a real runtime's dump.

use heapgraph_core::features::event_source::ObjectEvent;
use heapgraph_core::{ClassDefRecord, DumpBuilder, HeapEvent, ObjectHash, RecordedDump};

pub const OBJECT: u64 = 0x10;
pub const CLASS: u64 = 0x20;
pub const LOADER: u64 = 0x30;
pub const APP_LOADER: u64 = 0x40;
pub const REFERENCE: u64 = 0x50;
pub const WEAK_REFERENCE: u64 = 0x58;

pub const BYTE_CODE: u8 = 4;

/// Object, Class, ClassLoader and an application loader class
pub fn core_classes() -> DumpBuilder {
    DumpBuilder::new()
        .class_def(ClassDefRecord::new(OBJECT, "java/lang/Object").with_super(0).with_instance_size(16))
        .class(CLASS, "java/lang/Class", OBJECT)
        .class(LOADER, "java/lang/ClassLoader", OBJECT)
        .class(APP_LOADER, "app/AppLoader", LOADER)
}

/// Plain "A", an array holding it twice, and a five byte primitive array
pub fn mixed_objects() -> RecordedDump {
    core_classes()
        .class_def(ClassDefRecord::new(0x100, "A").with_super(OBJECT).with_instance_size(24))
        .object(0x1000, 0x100, vec![])
        .object_array(0x1020, 0x100, vec![0x1000, 0x1000])
        .primitive_array(0x1040, BYTE_CODE, 5)
        .build()
}

/// `count` plain objects of class "A", each pointing at its predecessor
pub fn object_chain(count: u64) -> RecordedDump {
    let mut builder = core_classes()
        .class_def(ClassDefRecord::new(0x100, "A").with_super(OBJECT).with_instance_size(16));
    for i in 0..count {
        let address = 0x10_000 + i * 16;
        let references = if i == 0 { vec![] } else { vec![address - 16] };
        builder = builder.object(address, 0x100, references);
    }
    builder.build()
}

/// Two objects, then a stream cut inside the third record
pub fn truncated_dump() -> RecordedDump {
    core_classes()
        .class(0x100, "A", OBJECT)
        .object(0x1000, 0x100, vec![])
        .object(0x1010, 0x100, vec![0x1000])
        .truncate_here()
        .object(0x1020, 0x100, vec![])
        .build()
}

/// Two "pkg/Foo" classes defined by two different loader objects
pub fn split_namespaces_dump() -> RecordedDump {
    core_classes()
        .class_def(
            ClassDefRecord::new(0x100, "pkg/Foo")
                .with_super(OBJECT)
                .with_references(vec![0x9000]),
        )
        .class_def(
            ClassDefRecord::new(0x200, "pkg/Foo")
                .with_super(OBJECT)
                .with_references(vec![0x9100]),
        )
        .class_def(
            ClassDefRecord::new(0x300, "pkg/Bar")
                .with_super(OBJECT)
                .with_references(vec![0x9000]),
        )
        .object(0x9000, APP_LOADER, vec![])
        .object(0x9100, APP_LOADER, vec![])
        .object(0x9200, 0x100, vec![])
        .object(0x9210, 0x200, vec![0x9200])
        .build()
}

/// A weak reference object pointing at a plain one
pub fn weak_reference_dump() -> RecordedDump {
    core_classes()
        .class(REFERENCE, "java/lang/ref/Reference", OBJECT)
        .class(WEAK_REFERENCE, "java/lang/ref/WeakReference", REFERENCE)
        .class(0x100, "A", OBJECT)
        .object(0x1000, 0x100, vec![])
        .object(0x1010, WEAK_REFERENCE, vec![0x1000])
        .object(0x1020, 0x100, vec![0x1000])
        .build()
}

pub const COMPANION_JSON: &str = r#"{
    "threads": [
        {"id": 1, "name": "main", "state": "RUNNABLE", "object_address": 4096}
    ],
    "monitors": [
        {"object_address": 4112, "owner_thread": 1}
    ]
}"#;

/// A class with declared methods and an on-heap mirror object
pub fn mirrored_class_dump() -> RecordedDump {
    core_classes()
        .class_def(
            ClassDefRecord::new(0x100, "app/Service")
                .with_super(OBJECT)
                .with_methods(vec!["start()V".to_string(), "stop()V".to_string()])
                .with_references(vec![0x9000]),
        )
        .object(0x9000, APP_LOADER, vec![])
        .object(0x9100, CLASS, vec![0x100])
        .object(0x9200, 0x100, vec![0x9100])
        .build()
}

/// `count` objects, each holding its predecessor and a null slot
pub fn chain_with_nulls(count: u64) -> RecordedDump {
    let mut builder = core_classes()
        .class_def(ClassDefRecord::new(0x100, "A").with_super(OBJECT).with_instance_size(16));
    for i in 0..count {
        let address = 0x10_000 + i * 16;
        let previous = if i == 0 { 0 } else { address - 16 };
        builder = builder.object(address, 0x100, vec![previous, 0, OBJECT]);
    }
    builder.build()
}

/// 0x1000, fourteen more objects, then 0x1000 again with a reference
pub fn reused_address_dump() -> RecordedDump {
    let mut builder = core_classes().class(0x100, "A", OBJECT).object(0x1000, 0x100, vec![]);
    for i in 1..15 {
        builder = builder.object(0x1000 + i * 16, 0x100, vec![]);
    }
    builder.object(0x1000, 0x100, vec![0x1010]).build()
}

/// One plain object whose identity hash was taken
pub fn hashed_object_dump() -> RecordedDump {
    core_classes()
        .class(0x100, "A", OBJECT)
        .event(HeapEvent::Object(ObjectEvent {
            address: 0x1000,
            class_address: 0x100,
            hash: ObjectHash::Hashed(42),
            references: vec![],
        }))
        .build()
}
