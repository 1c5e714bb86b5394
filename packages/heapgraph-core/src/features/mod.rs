//! Feature modules, bottom-up:
//!
//! - event_source       - record stream port and the in-memory recorded dump
//! - address_compression - 64-bit addresses to dense indices
//! - object_store       - segmented, evictable object cache over the stream
//! - class_registry     - classes, names, and loader namespaces
//! - loader_resolver    - attributes classes to their loaders
//! - graph              - object and class nodes with typed edges
//! - heap               - the `HeapGraph` facade tying it together

pub mod address_compression;
pub mod class_registry;
pub mod event_source;
pub mod graph;
pub mod heap;
pub mod loader_resolver;
pub mod object_store;
