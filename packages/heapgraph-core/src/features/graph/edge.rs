//! Reference edges

use serde::{Deserialize, Serialize};

use super::class_node::ClassNode;
use super::object_node::ObjectNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Class,
    Field,
    ArrayElement,
    Superclass,
    ClassLoader,
    LoadedClass,
    ClassReference,
    ComponentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reachability {
    Strong,
    /// Held by a reference object; the collector may treat it as weak
    Unknown,
}

/// Why the edge's target is a root, as told by the companion snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RootKind {
    Thread,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphNode<'h> {
    Object(ObjectNode<'h>),
    Class(ClassNode<'h>),
}

impl GraphNode<'_> {
    pub fn address(&self) -> u64 {
        match self {
            GraphNode::Object(node) => node.address(),
            GraphNode::Class(node) => node.address(),
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self, GraphNode::Class(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge<'h> {
    pub source: GraphNode<'h>,
    pub target: GraphNode<'h>,
    pub kind: EdgeKind,
    pub reachability: Reachability,
    pub root_kind: Option<RootKind>,
    pub description: String,
}

impl<'h> ReferenceEdge<'h> {
    pub fn new(
        source: GraphNode<'h>,
        target: GraphNode<'h>,
        kind: EdgeKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            kind,
            reachability: Reachability::Strong,
            root_kind: None,
            description: description.into(),
        }
    }

    pub fn with_reachability(mut self, reachability: Reachability) -> Self {
        self.reachability = reachability;
        self
    }

    pub fn with_root_kind(mut self, root_kind: Option<RootKind>) -> Self {
        self.root_kind = root_kind;
        self
    }

    pub fn target_address(&self) -> u64 {
        self.target.address()
    }
}
