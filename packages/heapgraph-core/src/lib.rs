/*
 * Heapgraph Core - Heap Dump Object Graph
 *
 * Feature-First Architecture:
 * - shared/   : Common models (ClassKey, CorruptData, ObjectHash)
 * - config/   : Presets and HeapConfig
 * - features/ : Vertical slices (event_source → object_store → class_registry
 *               → loader_resolver → graph → heap)
 *
 * Memory:
 * - Objects live in evictable segments rebuilt by replaying the dump
 * - References stored as u32 indices when the address space allows
 */

#![allow(clippy::type_complexity)] // Listener and cache signatures
#![allow(clippy::new_without_default)] // Builders carry required state

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

pub use config::{ConfigError, HeapConfig, Preset};
pub use errors::{HeapError, Result};
pub use features::class_registry::{
    ArrayConvention, ClassName, ClassRecord, InstanceSize, NameLookup, PrimitiveType,
};
pub use features::event_source::{
    ClassDefRecord, DumpBuilder, DumpHeader, EventSource, HeapEvent, HeapListener,
    RecordedDump, SourceError,
};
pub use features::graph::{
    ClassNode, ComponentType, EdgeKind, GraphNode, NodeError, NodeResult, ObjectNode,
    Reachability, ReferenceEdge, RootKind,
};
pub use features::heap::{HeapGraph, HeapGraphBuilder, HeapObjects, HeapStats, ScanSummary};
pub use features::loader_resolver::{CompanionSnapshot, ResolveReport};
pub use features::object_store::{ObjectShape, StoreStats};
pub use shared::models::{ClassKey, CorruptData, NamespaceId, ObjectHash};
