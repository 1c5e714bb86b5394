//! End-to-end tests over recorded dumps
//!
//! Each test opens a `HeapGraph` the way a caller would and checks what the
//! object graph reports: iteration, edges, truncation, and class lookups.

mod common;

use common::*;
use heapgraph_core::{
    ClassName, CompanionSnapshot, EdgeKind, HeapConfig, HeapGraph, InstanceSize, NodeError,
    ObjectShape, Preset, PrimitiveType, Reachability, RootKind,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Iteration and edges
// ============================================================================

#[test]
fn test_mixed_objects_iterate_in_dump_order() {
    let heap = open_heap(mixed_objects());

    let (addresses, corrupt) = iterate(&heap);
    assert_eq!(addresses, vec![0x1000, 0x1020, 0x1040]);
    assert!(corrupt.is_empty());
    assert_eq!(heap.stats().objects, 3);
    assert_no_corruption(&heap);
}

#[test]
fn test_object_array_edges_resolve_in_order() {
    let heap = open_heap(mixed_objects());
    let array = heap.object_at(0x1020).expect("array present");

    assert_eq!(array.array_length().unwrap(), 2);
    assert_eq!(array.class_name().unwrap(), ClassName::named("[LA;"));
    assert!(array.class().unwrap().is_synthesized());

    let edges = array.edges().unwrap();
    assert_eq!(edges[0].kind, EdgeKind::Class);
    assert_eq!(targets_of(&edges, EdgeKind::ArrayElement), vec![0x1000, 0x1000]);
    let descriptions: Vec<&str> = edges
        .iter()
        .filter(|edge| edge.kind == EdgeKind::ArrayElement)
        .map(|edge| edge.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["[0]", "[1]"]);
    assert_eq!(array.size().unwrap(), 16);
}

#[test]
fn test_primitive_array_reports_length_and_type() {
    let heap = open_heap(mixed_objects());
    let bytes = heap.object_at(0x1040).expect("byte array present");

    assert_eq!(bytes.array_length().unwrap(), 5);
    assert_eq!(bytes.primitive_type().unwrap(), Some(PrimitiveType::Byte));
    assert_eq!(bytes.class_name().unwrap(), ClassName::named("[B"));
    assert_eq!(bytes.size().unwrap(), 5);
    assert_eq!(targets_of(&bytes.edges().unwrap(), EdgeKind::ArrayElement), Vec::<u64>::new());
}

#[test]
fn test_plain_object_facts() {
    let heap = open_heap(mixed_objects());
    let object = heap.object_at(0x1000).unwrap();

    assert_eq!(object.shape().unwrap(), ObjectShape::Plain);
    assert_eq!(object.size().unwrap(), 24);
    assert!(matches!(object.hash_code(), Err(NodeError::Unavailable(_))));
    assert!(matches!(object.array_length(), Err(NodeError::Unavailable(_))));

    let class = object.class().unwrap();
    assert_eq!(class.name().unwrap(), "A");
    assert_eq!(class.instance_size().unwrap(), InstanceSize::Known(24));
    let superclass = class.superclass().unwrap().expect("A extends Object");
    assert_eq!(superclass.name().unwrap(), "java/lang/Object");
    assert_eq!(superclass.superclass().unwrap(), None);
}

#[test]
fn test_missing_address_is_corrupt_on_access() {
    let heap = open_heap(mixed_objects());

    assert!(heap.object_at(0x5555).is_none());
    let node = heap.node_at(0x5555);
    assert!(node.shape().unwrap_err().is_corrupt());
}

#[test]
fn test_nodes_compare_by_address() {
    let heap = open_heap(mixed_objects());
    let filled = heap.object_at(0x1000).unwrap();
    let shallow = heap.node_at(0x1000);
    assert_eq!(filled, shallow);
    assert_ne!(filled, heap.node_at(0x1020));
}

#[test]
fn test_reference_subclass_edges_are_not_strong() {
    let heap = open_heap(weak_reference_dump());

    let weak = heap.object_at(0x1010).unwrap();
    let field = weak
        .edges()
        .unwrap()
        .into_iter()
        .find(|edge| edge.kind == EdgeKind::Field)
        .expect("referent edge");
    assert_eq!(field.reachability, Reachability::Unknown);

    let strong = heap.object_at(0x1020).unwrap();
    let field = strong
        .edges()
        .unwrap()
        .into_iter()
        .find(|edge| edge.kind == EdgeKind::Field)
        .expect("field edge");
    assert_eq!(field.reachability, Reachability::Strong);
}

#[test]
fn test_companion_roots_mark_edges() {
    let snapshot = CompanionSnapshot::from_json(COMPANION_JSON).unwrap();
    let heap = HeapGraph::builder(weak_reference_dump())
        .config(small_config())
        .companion(snapshot)
        .open()
        .unwrap();

    let holder = heap.object_at(0x1020).unwrap();
    let edge = holder
        .edges()
        .unwrap()
        .into_iter()
        .find(|edge| edge.kind == EdgeKind::Field)
        .unwrap();
    assert_eq!(edge.root_kind, Some(RootKind::Thread));

    let weak = heap.object_at(0x1010).unwrap();
    let class_edge = &weak.edges().unwrap()[0];
    assert_eq!(class_edge.root_kind, None);
    assert_eq!(heap.companion().unwrap().threads.len(), 1);
}

// ============================================================================
// Truncation
// ============================================================================

#[test]
fn test_truncated_dump_ends_with_one_placeholder() {
    init_tracing();
    let heap = open_heap(truncated_dump());

    let entries: Vec<_> = heap.objects().collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].as_ref().unwrap().address(), 0x1000);
    assert_eq!(entries[1].as_ref().unwrap().address(), 0x1010);
    let placeholder = entries[2].as_ref().unwrap_err();
    assert_eq!(placeholder.address, Some(0x1010));

    let truncation = heap.truncation().expect("truncation recorded");
    assert_eq!(truncation.address, Some(0x1010));
    assert!(heap.stats().truncated);
    assert!(heap.stats().store.truncated);
}

#[test]
fn test_truncated_iteration_terminates() {
    let heap = open_heap(truncated_dump());

    let mut objects = heap.objects();
    let consumed = objects.by_ref().count();
    assert_eq!(consumed, 3);
    assert!(objects.next().is_none());
    assert!(objects.next().is_none());

    // A second pass sees the same placeholder, not a new one
    let (addresses, corrupt) = iterate(&heap);
    assert_eq!(addresses, vec![0x1000, 0x1010]);
    assert_eq!(corrupt.len(), 1);
}

#[test]
fn test_object_past_truncation_is_missing() {
    let heap = open_heap(truncated_dump());
    assert!(heap.object_at(0x1020).is_none());
    assert!(heap.object_at(0x1010).is_some());
}

// ============================================================================
// Class lookups across namespaces
// ============================================================================

#[test]
fn test_duplicate_names_resolve_by_address() {
    let heap = open_heap(split_namespaces_dump());

    let first = heap.class_at(0x100).expect("first pkg/Foo");
    let second = heap.class_at(0x200).expect("second pkg/Foo");
    assert_eq!(first.name().unwrap(), "pkg/Foo");
    assert_eq!(second.name().unwrap(), "pkg/Foo");
    assert_ne!(first.namespace().unwrap(), second.namespace().unwrap());
}

#[test]
fn test_duplicate_names_are_ambiguous_by_unique_name() {
    let heap = open_heap(split_namespaces_dump());

    assert!(heap.find_unique_class("pkg/Foo").is_ambiguous());
    let bar = heap.find_unique_class("pkg/Bar").unique().expect("pkg/Bar is unique");
    assert_eq!(bar.address(), 0x300);
    assert!(heap.find_unique_class("java/lang/Object").unique().is_some());
    assert!(heap.find_unique_class("pkg/Missing").unique().is_none());
    assert_eq!(heap.find_classes("pkg/Foo").len(), 2);
}

#[test]
fn test_loader_edges_link_both_ways() {
    let heap = open_heap(split_namespaces_dump());

    let foo = heap.class_at(0x100).unwrap();
    let loader = foo.loader().unwrap().expect("pkg/Foo has a loader");
    assert_eq!(loader.address(), 0x9000);
    assert!(loader.is_class_loader());

    let loaded: Vec<u64> = loader.loaded_classes().iter().map(|c| c.address()).collect();
    assert_eq!(loaded, vec![0x100, 0x300]);

    let class_edges = foo.edges().unwrap();
    assert_eq!(class_edges[0].kind, EdgeKind::ClassLoader);
    assert_eq!(class_edges[0].target_address(), 0x9000);
    assert_eq!(class_edges[1].kind, EdgeKind::Superclass);
}

#[test]
fn test_instances_follow_their_own_namespace() {
    let heap = open_heap(split_namespaces_dump());

    let a = heap.object_at(0x9200).unwrap().class().unwrap();
    let b = heap.object_at(0x9210).unwrap().class().unwrap();
    assert_eq!(a.address(), 0x100);
    assert_eq!(b.address(), 0x200);
    assert_eq!(heap.resolve_report().loaders, 2);
    assert_eq!(heap.stats().namespaces, 3);
}

#[test]
fn test_class_mirror_and_methods() {
    let heap = open_heap(mirrored_class_dump());

    let service = heap.find_class("app/Service").expect("class defined");
    assert_eq!(service.address(), 0x100);
    assert_eq!(service.methods().unwrap(), &["start()V".to_string(), "stop()V".to_string()]);
    assert_eq!(service.mirror_object().unwrap().address(), 0x9100);
    assert!(service.loader().unwrap().is_some());
    assert!(heap.resolve_report().loader_reference_last);

    // The instance's field points at the mirror, an object rather than a class
    let instance = heap.object_at(0x9200).unwrap();
    let edges = instance.edges().unwrap();
    assert!(edges[0].target.is_class());
    let field = edges.iter().find(|edge| edge.kind == EdgeKind::Field).unwrap();
    assert!(!field.target.is_class());
    assert_eq!(field.target_address(), 0x9100);
}

#[test]
fn test_scan_summary_counts_records() {
    let heap = open_heap(mirrored_class_dump());
    let summary = heap.scan_summary();
    assert_eq!(summary.class_defs, 5);
    assert_eq!(summary.objects, 3);
    assert_eq!(summary.record_count, 8);
    assert!(summary.truncated.is_none());
}

// ============================================================================
// Segments and eviction
// ============================================================================

#[test]
fn test_eviction_does_not_change_answers() {
    init_tracing();
    let heap = open_small(object_chain(40));

    let before: Vec<Vec<u64>> = (0..40)
        .map(|i| heap.object_at(0x10_000 + i * 16).unwrap().references().unwrap())
        .collect();
    heap.evict_cached_segments();
    let after: Vec<Vec<u64>> = (0..40)
        .map(|i| heap.object_at(0x10_000 + i * 16).unwrap().references().unwrap())
        .collect();

    assert_eq!(before, after);
    assert_eq!(after[0], Vec::<u64>::new());
    assert_eq!(after[39], vec![0x10_000 + 38 * 16]);
    assert!(heap.stats().store.rematerializations > 0);
}

#[test]
fn test_small_segments_iterate_everything() {
    let heap = open_small(object_chain(40));

    let (addresses, corrupt) = iterate(&heap);
    let expected: Vec<u64> = (0..40).map(|i| 0x10_000 + i * 16).collect();
    assert_eq!(addresses, expected);
    assert!(corrupt.is_empty());

    let stats = heap.stats();
    assert!(stats.store.segments > 1);
    assert!(stats.store.cached_segments <= 2);
    assert!(stats.store.end_confirmed);
    assert!((0.0..=1.0).contains(&stats.cache_hit_rate()));
}

#[test]
fn test_first_and_last_object_without_replay() {
    let dump = object_chain(10);
    let heap = open_heap(dump.clone());
    let opens = dump.reader_opens();
    let delivered = dump.records_delivered();

    assert_eq!(heap.first_object().unwrap().address(), 0x10_000);
    assert_eq!(heap.last_object().unwrap().address(), 0x10_000 + 9 * 16);
    assert_eq!(heap.extent(), Some((0x10_000, 0x10_000 + 9 * 16)));
    assert_eq!(dump.reader_opens(), opens);
    assert_eq!(dump.records_delivered(), delivered);
}

#[test]
fn test_first_object_keeps_recorded_hash() {
    let heap = open_heap(hashed_object_dump());
    let first = heap.first_object().unwrap();
    assert_eq!(first.hash_code().unwrap(), 42);
    assert_eq!(heap.last_object().unwrap().hash_code().unwrap(), 42);
    assert_eq!(heap.object_at(0x1000).unwrap().hash_code().unwrap(), 42);

    let unhashed = open_heap(object_chain(2));
    assert!(matches!(
        unhashed.first_object().unwrap().hash_code(),
        Err(NodeError::Unavailable(_))
    ));
}

#[test]
fn test_reused_address_is_corrupt_at_any_segment_size() {
    init_tracing();
    for config in [HeapConfig::default(), small_config()] {
        let heap = HeapGraph::open(reused_address_dump(), config).unwrap();

        let (addresses, corrupt) = iterate(&heap);
        assert_eq!((addresses.len(), corrupt.len()), (15, 1));
        assert_eq!(corrupt[0].address, Some(0x1000));
        assert_eq!(heap.object_at(0x1000).unwrap().references().unwrap(), Vec::<u64>::new());
        assert_eq!(heap.scan_summary().duplicate_objects, 1);
        assert_eq!(heap.stats().objects, 15);
    }

    // Small segments put the reuse in a later segment than the original
    let heap = open_small(reused_address_dump());
    let _ = iterate(&heap);
    assert!(heap.stats().store.segments > 1);
}

#[test]
fn test_reference_lists_with_nulls_stay_compressed() {
    let heap = HeapGraph::open(chain_with_nulls(30), HeapConfig::from_preset(Preset::Thorough))
        .unwrap();
    assert_no_corruption(&heap);

    let stats = heap.stats();
    assert!(stats.compression_enabled);
    assert_eq!(stats.store.compressed_lists, 30);
    assert_eq!(stats.store.wide_lists, 0);
    assert_eq!(
        heap.object_at(0x10_000 + 16).unwrap().references().unwrap(),
        vec![0x10_000, 0, OBJECT]
    );
    assert_eq!(heap.object_at(0x10_000).unwrap().references().unwrap(), vec![0, 0, OBJECT]);
}

#[test]
fn test_compression_off_stores_wide_lists() {
    let config = HeapConfig::from_preset(Preset::Thorough).compress_references(false);
    let heap = HeapGraph::open(chain_with_nulls(4), config).unwrap();
    assert_no_corruption(&heap);

    let stats = heap.stats();
    assert!(!stats.compression_enabled);
    assert_eq!(stats.store.compressed_lists, 0);
    assert_eq!(stats.store.wide_lists, 4);
}

#[test]
fn test_open_rejects_invalid_config() {
    let result = HeapGraph::open(mixed_objects(), small_config().segment_budget(1));
    assert!(result.is_err());
}

#[test]
fn test_open_rejects_unsupported_version() {
    let dump = heapgraph_core::DumpBuilder::new().version(99).build();
    assert!(HeapGraph::open(dump, small_config()).is_err());
}
