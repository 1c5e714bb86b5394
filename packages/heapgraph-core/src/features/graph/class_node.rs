//! Class nodes

use std::fmt;
use std::hash::{Hash, Hasher};

use super::edge::{EdgeKind, GraphNode, ReferenceEdge};
use super::error::{NodeError, NodeResult};
use super::object_node::ObjectNode;
use crate::features::class_registry::{
    ClassName, ClassRecord, Component, InstanceSize, PrimitiveType, SuperRef,
};
use crate::features::heap::HeapGraph;
use crate::shared::constants::MAX_HIERARCHY_DEPTH;
use crate::shared::models::{ClassKey, NamespaceId};

/// Element type of an array class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentType<'h> {
    Class(ClassNode<'h>),
    Primitive(PrimitiveType),
}

#[derive(Clone, Copy)]
pub struct ClassNode<'h> {
    heap: &'h HeapGraph,
    key: ClassKey,
}

impl<'h> ClassNode<'h> {
    pub(crate) fn new(heap: &'h HeapGraph, key: ClassKey) -> Self {
        Self { heap, key }
    }

    pub fn key(&self) -> ClassKey {
        self.key
    }

    /// On-heap address, 0 for synthesized classes
    pub fn address(&self) -> u64 {
        self.key.address()
    }

    pub fn record(&self) -> NodeResult<&'h ClassRecord> {
        self.heap
            .directory()
            .get(&self.key)
            .ok_or_else(|| NodeError::corrupt_at("class is not registered", self.address()))
    }

    pub fn namespace(&self) -> NodeResult<NamespaceId> {
        self.heap
            .directory()
            .namespace_of(&self.key)
            .ok_or_else(|| NodeError::corrupt_at("class has no namespace", self.address()))
    }

    /// Name or sentinel, never fails
    pub fn class_name(&self) -> ClassName {
        self.record()
            .map(|record| record.name.clone())
            .unwrap_or(ClassName::UnknownNonArray)
    }

    /// Real name; sentinels are corrupt
    pub fn name(&self) -> NodeResult<&'h str> {
        let record = self.record()?;
        record.name.real().ok_or_else(|| {
            NodeError::corrupt_at(
                format!("class name unknown ({})", record.name),
                self.address(),
            )
        })
    }

    pub fn is_array(&self) -> bool {
        self.record().is_ok_and(|record| record.is_array())
    }

    pub fn is_synthesized(&self) -> bool {
        self.record().is_ok_and(|record| record.synthesized)
    }

    pub fn superclass(&self) -> NodeResult<Option<ClassNode<'h>>> {
        match self.record()?.super_ref {
            SuperRef::None => Ok(None),
            SuperRef::Known(address) => {
                let key = ClassKey::Address(address);
                if self.heap.directory().get(&key).is_some() {
                    Ok(Some(ClassNode::new(self.heap, key)))
                } else {
                    Err(NodeError::corrupt_at("superclass is not defined", address))
                }
            }
            SuperRef::Unknown => Err(NodeError::unavailable("superclass not recorded")),
        }
    }

    /// Whether the class is, or inherits from, the class called `name`
    pub fn derives_from(&self, name: &str) -> bool {
        let mut current = *self;
        for _ in 0..MAX_HIERARCHY_DEPTH {
            if current.name().is_ok_and(|n| n == name) {
                return true;
            }
            match current.superclass() {
                Ok(Some(parent)) => current = parent,
                _ => return false,
            }
        }
        false
    }

    /// Loader object, `None` for classes of the default or boot namespace
    pub fn loader(&self) -> NodeResult<Option<ObjectNode<'h>>> {
        let directory = self.heap.directory();
        let namespace = self.namespace()?;
        Ok(directory
            .namespace(namespace)
            .and_then(|ns| ns.loader)
            .map(|address| ObjectNode::shallow(self.heap, address)))
    }

    pub fn component_type(&self) -> NodeResult<Option<ComponentType<'h>>> {
        match self.record()?.component {
            Component::None => Ok(None),
            Component::Class(key) => Ok(Some(ComponentType::Class(ClassNode::new(self.heap, key)))),
            Component::Primitive(primitive) => Ok(Some(ComponentType::Primitive(primitive))),
            Component::Unknown => Err(NodeError::corrupt_at(
                "array element type unknown",
                self.address(),
            )),
        }
    }

    pub fn instance_size(&self) -> NodeResult<InstanceSize> {
        match self.record()?.instance_size {
            InstanceSize::Unknown => Err(NodeError::unavailable("instance size not recorded")),
            size => Ok(size),
        }
    }

    pub fn methods(&self) -> NodeResult<&'h [String]> {
        Ok(&self.record()?.methods)
    }

    pub fn references(&self) -> NodeResult<&'h [u64]> {
        Ok(&self.record()?.references)
    }

    /// On-heap class object standing for this class
    pub fn mirror_object(&self) -> NodeResult<ObjectNode<'h>> {
        if self.key.is_synthetic() {
            return Err(NodeError::unavailable("synthesized class has no mirror"));
        }
        self.heap
            .mirror_of(self.address())
            .map(|address| ObjectNode::shallow(self.heap, address))
            .ok_or_else(|| NodeError::unavailable("no mirror object in dump"))
    }

    /// Outbound edges: loader, then superclass, then declared references
    pub fn edges(&self) -> NodeResult<Vec<ReferenceEdge<'h>>> {
        let source = GraphNode::Class(*self);
        let mut edges = Vec::new();

        if let Some(loader) = self.loader()? {
            edges.push(ReferenceEdge::new(
                source.clone(),
                GraphNode::Object(loader),
                EdgeKind::ClassLoader,
                "class loader",
            ));
        }

        if let Ok(Some(superclass)) = self.superclass() {
            edges.push(ReferenceEdge::new(
                source.clone(),
                GraphNode::Class(superclass),
                EdgeKind::Superclass,
                "superclass",
            ));
        }

        for (position, target) in self.references()?.iter().enumerate() {
            if *target == 0 {
                continue;
            }
            edges.push(
                ReferenceEdge::new(
                    source.clone(),
                    self.heap.node_for(*target),
                    EdgeKind::ClassReference,
                    format!("reference #{}", position),
                )
                .with_root_kind(self.heap.root_kind_of(*target)),
            );
        }

        if let Ok(Some(ComponentType::Class(component))) = self.component_type() {
            edges.push(ReferenceEdge::new(
                source,
                GraphNode::Class(component),
                EdgeKind::ComponentType,
                "component type",
            ));
        }
        Ok(edges)
    }
}

impl PartialEq for ClassNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.heap, other.heap) && self.key == other.key
    }
}

impl Eq for ClassNode<'_> {}

impl Hash for ClassNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for ClassNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassNode")
            .field("key", &self.key)
            .field("name", &self.class_name().as_str())
            .finish()
    }
}
