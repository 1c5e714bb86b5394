//! Object nodes
//!
//! An `ObjectNode` is a heap address plus a lazily filled record. Two nodes
//! are equal when they come from the same heap and name the same address,
//! whether or not either has been filled.

use std::cell::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::class_node::ClassNode;
use super::edge::{EdgeKind, GraphNode, Reachability, ReferenceEdge};
use super::error::{NodeError, NodeResult};
use crate::features::class_registry::{ClassName, InstanceSize, PrimitiveType};
use crate::features::heap::HeapGraph;
use crate::features::object_store::{ObjectKind, ObjectRecord, ObjectShape};
use crate::shared::constants::REFERENCE_WIDTH;
use crate::shared::models::ObjectHash;

/// Class whose instances may hold their referent weakly
const REFERENCE_CLASS: &str = "java/lang/ref/Reference";

#[derive(Clone)]
pub struct ObjectNode<'h> {
    heap: &'h HeapGraph,
    address: u64,
    record: OnceCell<Rc<ObjectRecord>>,
    full: OnceCell<Rc<ObjectRecord>>,
}

impl<'h> ObjectNode<'h> {
    /// Identity only; filled on first access
    pub(crate) fn shallow(heap: &'h HeapGraph, address: u64) -> Self {
        Self {
            heap,
            address,
            record: OnceCell::new(),
            full: OnceCell::new(),
        }
    }

    pub(crate) fn filled(heap: &'h HeapGraph, record: Rc<ObjectRecord>) -> Self {
        let node = Self::shallow(heap, record.address);
        if record.has_references_loaded() {
            let _ = node.full.set(Rc::clone(&record));
        }
        let _ = node.record.set(record);
        node
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn heap(&self) -> &'h HeapGraph {
        self.heap
    }

    fn record(&self) -> NodeResult<&Rc<ObjectRecord>> {
        if let Some(record) = self.record.get() {
            return Ok(record);
        }
        let record = self
            .heap
            .lookup_record(self.address, false)
            .ok_or_else(|| NodeError::corrupt_at("no object at address", self.address))?;
        Ok(self.record.get_or_init(|| record))
    }

    fn full_record(&self) -> NodeResult<&Rc<ObjectRecord>> {
        if let Some(record) = self.full.get() {
            return Ok(record);
        }
        let record = self
            .heap
            .lookup_record(self.address, true)
            .ok_or_else(|| NodeError::corrupt_at("no object at address", self.address))?;
        Ok(self.full.get_or_init(|| record))
    }

    pub fn class(&self) -> NodeResult<ClassNode<'h>> {
        let record = self.record()?;
        self.heap
            .directory()
            .class_for_record(record)
            .map(|key| ClassNode::new(self.heap, key))
            .ok_or_else(|| NodeError::corrupt_at("object class is not registered", self.address))
    }

    /// Display name of the class; sentinels show as their placeholder names
    pub fn class_name(&self) -> NodeResult<ClassName> {
        Ok(self.class()?.class_name())
    }

    pub fn shape(&self) -> NodeResult<ObjectShape> {
        Ok(self.record()?.shape)
    }

    pub fn is_array(&self) -> NodeResult<bool> {
        Ok(self.record()?.shape.is_array())
    }

    pub fn array_length(&self) -> NodeResult<u32> {
        match self.record()?.shape {
            ObjectShape::Array { length } => Ok(length),
            ObjectShape::Plain => Err(NodeError::unavailable("not an array")),
            ObjectShape::Unresolved | ObjectShape::Unknown => {
                Err(NodeError::unavailable("array length not recorded"))
            }
        }
    }

    pub fn hash_code(&self) -> NodeResult<i32> {
        match self.record()?.hash {
            ObjectHash::Hashed(code) | ObjectHash::HashedAndMoved(code) => Ok(code),
            ObjectHash::Unhashed => Err(NodeError::unavailable("object was never hashed")),
        }
    }

    pub fn primitive_type(&self) -> NodeResult<Option<PrimitiveType>> {
        match self.record()?.kind {
            ObjectKind::PrimitiveArray { type_code } => PrimitiveType::from_code(type_code)
                .map(Some)
                .ok_or_else(|| NodeError::corrupt_at("unknown primitive type code", self.address)),
            _ => Ok(None),
        }
    }

    /// Size in bytes: instance size for plain objects, element width times
    /// length for arrays
    pub fn size(&self) -> NodeResult<u64> {
        let record = self.record()?;
        match (record.kind, record.shape) {
            (ObjectKind::PrimitiveArray { .. }, ObjectShape::Array { length }) => {
                let width = self
                    .primitive_type()?
                    .map_or(1, |primitive| primitive.width());
                Ok(u64::from(length) * width)
            }
            (ObjectKind::ObjectArray { .. }, ObjectShape::Array { length }) => {
                Ok(u64::from(length) * REFERENCE_WIDTH)
            }
            (ObjectKind::Plain, _) => match self.class()?.instance_size()? {
                InstanceSize::Known(size) | InstanceSize::Estimated(size) => Ok(size),
                InstanceSize::Unknown => Err(NodeError::unavailable("instance size not recorded")),
            },
            _ => Err(NodeError::unavailable("array length not recorded")),
        }
    }

    /// Outbound references in record order, nulls included
    pub fn references(&self) -> NodeResult<Vec<u64>> {
        let record = self.full_record()?;
        self.heap
            .reference_addresses(record)
            .ok_or_else(|| NodeError::corrupt_at("references not materialized", self.address))
    }

    pub fn is_class_loader(&self) -> bool {
        self.heap
            .directory()
            .namespace_for_loader(self.address)
            .is_some()
    }

    /// Classes this object loaded, if it is a class loader
    pub fn loaded_classes(&self) -> Vec<ClassNode<'h>> {
        let directory = self.heap.directory();
        directory
            .namespace_for_loader(self.address)
            .and_then(|id| directory.namespace(id))
            .map(|ns| {
                ns.registry
                    .keys()
                    .map(|key| ClassNode::new(self.heap, *key))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Outbound edges: class, then loaded classes, then fields or elements
    pub fn edges(&self) -> NodeResult<Vec<ReferenceEdge<'h>>> {
        let source = GraphNode::Object(self.clone());
        let mut edges = Vec::new();

        if let Ok(class) = self.class() {
            edges.push(ReferenceEdge::new(
                source.clone(),
                GraphNode::Class(class),
                EdgeKind::Class,
                "class",
            ));
        }

        for class in self.loaded_classes() {
            edges.push(ReferenceEdge::new(
                source.clone(),
                GraphNode::Class(class),
                EdgeKind::LoadedClass,
                "loaded class",
            ));
        }

        let is_array = self.record()?.shape.is_array();
        let reachability = match self.class() {
            Ok(class) if !is_array && class.derives_from(REFERENCE_CLASS) => Reachability::Unknown,
            _ => Reachability::Strong,
        };
        for (position, target) in self.references()?.into_iter().enumerate() {
            if target == 0 {
                continue;
            }
            let (kind, description) = if is_array {
                (EdgeKind::ArrayElement, format!("[{}]", position))
            } else {
                (EdgeKind::Field, format!("field #{}", position))
            };
            edges.push(
                ReferenceEdge::new(source.clone(), self.heap.node_for(target), kind, description)
                    .with_reachability(reachability)
                    .with_root_kind(self.heap.root_kind_of(target)),
            );
        }
        Ok(edges)
    }
}

impl PartialEq for ObjectNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.heap, other.heap) && self.address == other.address
    }
}

impl Eq for ObjectNode<'_> {}

impl Hash for ObjectNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Debug for ObjectNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectNode")
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}
