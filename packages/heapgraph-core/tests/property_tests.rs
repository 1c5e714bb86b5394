//! Property-based tests for the object graph
//!
//! Invariants that should hold for any dump shape:
//! - Iteration: every object exactly once, in dump order
//! - References: what a node reports is what the dump recorded, compressed or not,
//!   and lists stay compressed whenever compression is on
//! - Eviction: dropping cached segments never changes an answer

mod common;

use common::*;
use heapgraph_core::{ClassDefRecord, DumpBuilder, HeapGraph, RecordedDump};
use proptest::prelude::*;

const CLASS_A: u64 = 0x100;

/// Objects at increasing addresses with references into the same set
fn arb_dump() -> impl Strategy<Value = (Vec<u64>, Vec<Vec<u64>>)> {
    (1usize..60, prop::bool::ANY).prop_flat_map(|(count, sparse)| {
        let stride = if sparse { 0x1_0000_0000u64 } else { 16 };
        let addresses: Vec<u64> = (0..count as u64).map(|i| 0x10_000 + i * stride).collect();
        let refs = prop::collection::vec(
            prop::collection::vec(prop::option::of(0..count), 0..6),
            count,
        );
        (Just(addresses), refs).prop_map(|(addresses, refs)| {
            let references = refs
                .into_iter()
                .map(|slots| {
                    slots
                        .into_iter()
                        .map(|slot| slot.map_or(0, |i| addresses[i]))
                        .collect()
                })
                .collect();
            (addresses, references)
        })
    })
}

fn build(addresses: &[u64], references: &[Vec<u64>]) -> RecordedDump {
    let mut builder = core_classes()
        .class_def(ClassDefRecord::new(CLASS_A, "A").with_super(OBJECT).with_instance_size(16));
    for (address, refs) in addresses.iter().zip(references) {
        builder = builder.object(*address, CLASS_A, refs.clone());
    }
    builder.build()
}

/// Whether the object addresses span more indices than compression allows
fn sparse_overflow(addresses: &[u64]) -> bool {
    let span = addresses[addresses.len() - 1] - addresses[0];
    (span >> 4) >= u64::from(u32::MAX) - 64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_iteration_yields_every_object_once((addresses, references) in arb_dump()) {
        let heap = open_small(build(&addresses, &references));
        let (seen, corrupt) = iterate(&heap);
        prop_assert!(corrupt.is_empty());
        prop_assert_eq!(seen, addresses);
    }

    #[test]
    fn prop_references_survive_compression((addresses, references) in arb_dump(), compress in prop::bool::ANY) {
        let config = small_config().compress_references(compress);
        let heap = HeapGraph::open(build(&addresses, &references), config).unwrap();
        for (address, expected) in addresses.iter().zip(&references) {
            let node = heap.object_at(*address).unwrap();
            prop_assert_eq!(&node.references().unwrap(), expected);
        }
        let stats = heap.stats();
        prop_assert_eq!(stats.compression_enabled, compress && !sparse_overflow(&addresses));
        if stats.compression_enabled {
            // Null slots included, every list compresses
            prop_assert_eq!(stats.store.wide_lists, 0);
        }
    }

    #[test]
    fn prop_eviction_is_invisible((addresses, references) in arb_dump(), evict_every in 1usize..8) {
        let heap = open_small(build(&addresses, &references));
        for (i, (address, expected)) in addresses.iter().zip(&references).enumerate() {
            if i % evict_every == 0 {
                heap.evict_cached_segments();
            }
            let node = heap.object_at(*address).unwrap();
            prop_assert_eq!(&node.references().unwrap(), expected);
        }
    }

    #[test]
    fn prop_absent_addresses_are_never_found(
        (addresses, references) in arb_dump(),
        missing in 1u64..0x10_000,
    ) {
        let heap = open_small(build(&addresses, &references));
        prop_assert!(heap.object_at(missing).is_none());
        prop_assert!(heap.object_at(addresses[addresses.len() - 1] + 8).is_none());
    }
}

#[test]
fn test_empty_dump_iterates_nothing() {
    let heap = open_small(DumpBuilder::new().build());
    assert_eq!(heap.objects().count(), 0);
    assert!(heap.first_object().is_none());
    assert!(heap.extent().is_none());
}
