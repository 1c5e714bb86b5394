//! Classes across class-loader namespaces
//!
//! Every class lives in exactly one namespace. Namespace 0 is the default
//! bucket the initial scan fills; the loader resolver carves other namespaces
//! out of it. Moves are done under `&mut self`, so no reader ever sees a class
//! in two namespaces, and a class always travels with its synthesized array
//! counterpart.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::builder::{ArrayConvention, ScanClasses};
use super::domain::{ClassRecord, PrimitiveType};
use super::registry::{ClassRegistry, NameLookup};
use crate::features::object_store::{ObjectKind, ObjectRecord};
use crate::shared::models::{ClassKey, NamespaceId};

#[derive(Debug, Clone)]
pub struct ClassLoaderNamespace {
    pub id: NamespaceId,
    /// Address of the on-heap loader object; `None` for the default bucket
    pub loader: Option<u64>,
    /// Class of the loader object
    pub loader_type: Option<ClassKey>,
    pub registry: ClassRegistry,
    /// Emptied by boot promotion and no longer listed
    pub retired: bool,
}

/// Serializable summary of a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub id: NamespaceId,
    pub loader: Option<u64>,
    pub loader_type: Option<ClassKey>,
    pub classes: usize,
    pub boot: bool,
}

#[derive(Debug, Clone)]
pub struct ClassDirectory {
    namespaces: Vec<ClassLoaderNamespace>,
    owner: FxHashMap<ClassKey, NamespaceId>,
    by_loader: FxHashMap<u64, NamespaceId>,
    array_of: FxHashMap<ClassKey, ClassKey>,
    convention: ArrayConvention,
    root_class: ClassKey,
    class_class: ClassKey,
    unknown_array_type: Option<ClassKey>,
    boot: NamespaceId,
}

impl ClassDirectory {
    pub fn new(scan: ScanClasses) -> Self {
        let owner = scan
            .registry
            .keys()
            .map(|key| (*key, NamespaceId::DEFAULT))
            .collect();
        Self {
            namespaces: vec![ClassLoaderNamespace {
                id: NamespaceId::DEFAULT,
                loader: None,
                loader_type: scan.default_loader_type,
                registry: scan.registry,
                retired: false,
            }],
            owner,
            by_loader: FxHashMap::default(),
            array_of: scan.array_of,
            convention: scan.convention,
            root_class: scan.root_class,
            class_class: scan.class_class,
            unknown_array_type: scan.unknown_array_type,
            boot: NamespaceId::DEFAULT,
        }
    }

    pub fn get(&self, key: &ClassKey) -> Option<&ClassRecord> {
        let id = self.owner.get(key)?;
        self.namespaces[id.index()].registry.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &ClassKey) -> Option<&mut ClassRecord> {
        let id = *self.owner.get(key)?;
        self.namespaces[id.index()].registry.get_mut(key)
    }

    pub fn namespace_of(&self, key: &ClassKey) -> Option<NamespaceId> {
        self.owner.get(key).copied()
    }

    pub fn namespace(&self, id: NamespaceId) -> Option<&ClassLoaderNamespace> {
        self.namespaces.get(id.index())
    }

    /// Live namespaces in creation order
    pub fn namespaces(&self) -> impl Iterator<Item = &ClassLoaderNamespace> {
        self.namespaces.iter().filter(|ns| !ns.retired)
    }

    pub fn summaries(&self) -> Vec<NamespaceSummary> {
        self.namespaces()
            .map(|ns| NamespaceSummary {
                id: ns.id,
                loader: ns.loader,
                loader_type: ns.loader_type,
                classes: ns.registry.len(),
                boot: ns.id == self.boot,
            })
            .collect()
    }

    pub fn namespace_for_loader(&self, loader: u64) -> Option<NamespaceId> {
        self.by_loader.get(&loader).copied()
    }

    /// Namespace keyed by a loader object, created on first use
    pub fn ensure_namespace(&mut self, loader: u64, loader_type: Option<ClassKey>) -> NamespaceId {
        if let Some(id) = self.by_loader.get(&loader) {
            return *id;
        }
        let id = NamespaceId(self.namespaces.len() as u32);
        self.namespaces.push(ClassLoaderNamespace {
            id,
            loader: Some(loader),
            loader_type,
            registry: ClassRegistry::new(),
            retired: false,
        });
        self.by_loader.insert(loader, id);
        id
    }

    pub fn boot(&self) -> NamespaceId {
        self.boot
    }

    pub(crate) fn set_boot(&mut self, id: NamespaceId) {
        self.boot = id;
    }

    pub(crate) fn retire(&mut self, id: NamespaceId) {
        if let Some(ns) = self.namespaces.get_mut(id.index()) {
            ns.retired = true;
        }
    }

    /// Move one class, with its synthesized array class, into `to`.
    /// Returns whether anything moved; repeating a move is a no-op.
    pub fn move_class(&mut self, key: ClassKey, to: NamespaceId) -> bool {
        self.move_classes(&[key], to) > 0
    }

    /// Move a batch of classes into `to`, rebuilding each touched registry's
    /// indexes once. Returns the number of records moved.
    pub fn move_classes(&mut self, keys: &[ClassKey], to: NamespaceId) -> usize {
        if to.index() >= self.namespaces.len() {
            return 0;
        }

        let mut touched = vec![to];
        let mut moved = 0;
        for key in keys {
            let Some(from) = self.namespace_of(key) else {
                continue;
            };
            if from == to {
                continue;
            }

            let mut travelling = vec![*key];
            if let Some(array) = self.array_of.get(key) {
                let synthesized = self.get(array).is_some_and(|record| record.synthesized);
                if synthesized && self.namespace_of(array) == Some(from) {
                    travelling.push(*array);
                }
            }

            for class in travelling {
                if let Some(record) = self.namespaces[from.index()].registry.remove(&class) {
                    self.namespaces[to.index()].registry.insert(record);
                    self.owner.insert(class, to);
                    moved += 1;
                }
            }
            if !touched.contains(&from) {
                touched.push(from);
            }
        }

        if moved > 0 {
            for id in touched {
                self.namespaces[id.index()].registry.init_cache();
            }
            debug!(moved, to = to.0, "moved classes between namespaces");
        }
        moved
    }

    /// First class with this name, boot namespace first
    pub fn find_by_name(&self, name: &str) -> Option<&ClassRecord> {
        self.search_order()
            .find_map(|ns| ns.registry.find_by_name(name))
    }

    /// Live namespaces, boot first, each once
    pub(crate) fn search_order(&self) -> impl Iterator<Item = &ClassLoaderNamespace> + '_ {
        let boot = self.namespaces.get(self.boot.index());
        boot.into_iter()
            .chain(self.namespaces().filter(move |ns| ns.id != self.boot))
    }

    /// Class with this name anywhere in the heap, if exactly one exists
    pub fn find_unique(&self, name: &str) -> NameLookup<&ClassRecord> {
        let mut found = None;
        for ns in self.namespaces() {
            match ns.registry.find_unique(name) {
                NameLookup::Ambiguous => return NameLookup::Ambiguous,
                NameLookup::Unique(record) => {
                    if found.replace(record).is_some() {
                        return NameLookup::Ambiguous;
                    }
                }
                NameLookup::Missing => {}
            }
        }
        match found {
            Some(record) => NameLookup::Unique(record),
            None => NameLookup::Missing,
        }
    }

    /// Every class with this name, across namespaces
    pub fn find_all(&self, name: &str) -> Vec<&ClassRecord> {
        self.classes()
            .filter(|record| record.name.real() == Some(name))
            .collect()
    }

    /// Class an object resolves to
    pub fn class_for_record(&self, record: &ObjectRecord) -> Option<ClassKey> {
        let key = match record.kind {
            ObjectKind::Plain => ClassKey::Address(record.class_address),
            ObjectKind::ObjectArray { .. } => {
                let recorded = ClassKey::Address(record.class_address);
                match self.convention {
                    ArrayConvention::ArrayClass => recorded,
                    ArrayConvention::ElementType => {
                        self.array_of.get(&recorded).copied().unwrap_or(recorded)
                    }
                }
            }
            ObjectKind::PrimitiveArray { type_code } => {
                return match PrimitiveType::from_code(type_code) {
                    Some(primitive) => self.primitive_array_class(primitive),
                    None => self.unknown_array_type,
                };
            }
        };
        self.owner.contains_key(&key).then_some(key)
    }

    pub fn primitive_array_class(&self, primitive: PrimitiveType) -> Option<ClassKey> {
        self.namespaces()
            .find_map(|ns| ns.registry.primitive_array(primitive))
    }

    pub fn array_class_of(&self, element: &ClassKey) -> Option<ClassKey> {
        self.array_of.get(element).copied()
    }

    pub fn convention(&self) -> ArrayConvention {
        self.convention
    }

    pub fn root_class(&self) -> ClassKey {
        self.root_class
    }

    pub fn class_class(&self) -> ClassKey {
        self.class_class
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassRecord> {
        self.namespaces().flat_map(|ns| ns.registry.iter())
    }

    pub fn class_count(&self) -> usize {
        self.owner.len()
    }
}
