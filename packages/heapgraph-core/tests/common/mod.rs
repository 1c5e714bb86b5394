//! Common test utilities for heapgraph-core
//!
//! Shared dump fixtures, heap builders and assertions for integration tests.

#![allow(dead_code)]

mod assertions;
mod builders;
mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
