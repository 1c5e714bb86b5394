//! Navigable graph nodes
//!
//! Nodes hold a heap reference and an address or class key, never pointers to
//! other nodes. Every edge is resolved by asking the heap again, which keeps
//! cyclic object, class and loader graphs navigable without ownership cycles.

mod class_node;
mod edge;
mod error;
mod object_node;

pub use class_node::{ClassNode, ComponentType};
pub use edge::{EdgeKind, GraphNode, Reachability, ReferenceEdge, RootKind};
pub use error::{NodeError, NodeResult};
pub use object_node::ObjectNode;
