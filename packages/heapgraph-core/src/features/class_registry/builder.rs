//! One-pass registry construction
//!
//! Fed by the initial scan with every class definition and a hint for every
//! object. [`RegistryBuilder::finish`] then fabricates whatever the dump left
//! out: placeholders for class addresses nothing defines, whole-array classes
//! when the dump stores element types in the class field, the primitive array
//! classes, and the root and class-of-classes classes.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{array_name_for, ClassName, ClassRecord, Component, PrimitiveType, SuperRef};
use super::registry::ClassRegistry;
use crate::config::HeapConfig;
use crate::features::event_source::ClassDefRecord;
use crate::features::object_store::{ObjectHint, ObjectKind};
use crate::shared::models::{ClassKey, SyntheticIds};

/// What the class field of an object-array record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayConvention {
    /// The array class itself
    ArrayClass,
    /// The element class; whole-array classes are synthesized
    ElementType,
}

/// Classes produced by the initial scan, all in one registry
#[derive(Debug, Clone)]
pub struct ScanClasses {
    pub registry: ClassRegistry,
    pub convention: ArrayConvention,
    /// Element class to its array class
    pub array_of: FxHashMap<ClassKey, ClassKey>,
    pub root_class: ClassKey,
    pub class_class: ClassKey,
    pub unknown_array_type: Option<ClassKey>,
    /// Type of the default namespace: the configured loader class, if defined
    pub default_loader_type: Option<ClassKey>,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    classes: BTreeMap<ClassKey, ClassRecord>,
    duplicate_defs: usize,
    plain_classes: BTreeSet<u64>,
    /// Class field of each object-array record to its element class
    array_classes: BTreeMap<u64, u64>,
    primitive_codes: [bool; 8],
    bad_primitive_codes: usize,
    /// Smallest gap seen after an instance of each class
    spacing: FxHashMap<u64, u64>,
    previous_plain: Option<(u64, u64)>,
}

fn unique_by_name(classes: &BTreeMap<ClassKey, ClassRecord>, name: &str) -> Option<ClassKey> {
    let mut matches = classes
        .values()
        .filter(|record| record.name.real() == Some(name));
    match (matches.next(), matches.next()) {
        (Some(record), None) => Some(record.key),
        _ => None,
    }
}

fn first_by_name(classes: &BTreeMap<ClassKey, ClassRecord>, name: &str) -> Option<ClassKey> {
    classes
        .values()
        .find(|record| record.name.real() == Some(name))
        .map(|record| record.key)
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, def: &ClassDefRecord) {
        let key = ClassKey::Address(def.address);
        if self.classes.contains_key(&key) {
            self.duplicate_defs += 1;
            return;
        }
        self.classes.insert(key, ClassRecord::from_def(def));
    }

    pub fn add_object(&mut self, hint: &ObjectHint) {
        if let Some((previous, class_address)) = self.previous_plain.take() {
            if hint.address > previous {
                let gap = hint.address - previous;
                let entry = self.spacing.entry(class_address).or_insert(gap);
                *entry = (*entry).min(gap);
            }
        }

        match hint.kind {
            ObjectKind::Plain => {
                self.plain_classes.insert(hint.class_address);
                self.previous_plain = Some((hint.address, hint.class_address));
            }
            ObjectKind::ObjectArray {
                element_class_address,
            } => {
                self.array_classes
                    .entry(hint.class_address)
                    .or_insert(element_class_address);
            }
            ObjectKind::PrimitiveArray { type_code } => {
                match PrimitiveType::from_code(type_code) {
                    Some(primitive) => self.primitive_codes[primitive.code() as usize] = true,
                    None => self.bad_primitive_codes += 1,
                }
            }
        }
    }

    fn ensure_placeholder(&mut self, address: u64, name: ClassName, component: Component) {
        self.classes
            .entry(ClassKey::Address(address))
            .or_insert_with(|| ClassRecord::placeholder(ClassKey::Address(address), name, component));
    }

    fn detect_convention(&self) -> ArrayConvention {
        if self.array_classes.is_empty() {
            return ArrayConvention::ArrayClass;
        }
        let any_array_typed = self.array_classes.keys().any(|address| {
            self.classes
                .get(&ClassKey::Address(*address))
                .is_some_and(|record| record.name.is_array())
        });
        if any_array_typed {
            ArrayConvention::ArrayClass
        } else {
            ArrayConvention::ElementType
        }
    }

    pub fn finish(mut self, config: &HeapConfig) -> ScanClasses {
        let mut synthetic = SyntheticIds::new();
        let mut array_of = FxHashMap::default();

        let plain: Vec<u64> = self.plain_classes.iter().copied().collect();
        for address in plain {
            self.ensure_placeholder(address, ClassName::UnknownNonArray, Component::None);
        }

        let convention = self.detect_convention();
        let arrays: Vec<(u64, u64)> = self.array_classes.iter().map(|(c, e)| (*c, *e)).collect();
        match convention {
            ArrayConvention::ArrayClass => {
                for (array_address, element_address) in arrays {
                    let element = ClassKey::Address(element_address);
                    self.ensure_placeholder(element_address, ClassName::UnknownNonArray, Component::None);
                    self.ensure_placeholder(
                        array_address,
                        ClassName::UnknownArray,
                        Component::Class(element),
                    );
                    if let Some(record) = self.classes.get_mut(&ClassKey::Address(array_address)) {
                        if matches!(record.component, Component::None | Component::Unknown) {
                            record.component = Component::Class(element);
                        }
                    }
                    array_of.insert(element, ClassKey::Address(array_address));
                }
            }
            ArrayConvention::ElementType => {
                for (element_address, _) in arrays {
                    let element = ClassKey::Address(element_address);
                    self.ensure_placeholder(element_address, ClassName::UnknownNonArray, Component::None);
                    let element_name = self.classes.get(&element).and_then(|r| r.name.real().map(str::to_string));

                    let array = match element_name {
                        Some(name) => {
                            let array_name = array_name_for(&name);
                            match unique_by_name(&self.classes, &array_name) {
                                Some(existing) => existing,
                                None => {
                                    let key = synthetic.next_key();
                                    self.classes.insert(
                                        key,
                                        ClassRecord::placeholder(
                                            key,
                                            ClassName::Named(array_name),
                                            Component::Class(element),
                                        ),
                                    );
                                    key
                                }
                            }
                        }
                        None => {
                            let key = synthetic.next_key();
                            self.classes.insert(
                                key,
                                ClassRecord::placeholder(key, ClassName::UnknownArray, Component::Class(element)),
                            );
                            key
                        }
                    };
                    if let Some(record) = self.classes.get_mut(&array) {
                        if matches!(record.component, Component::None | Component::Unknown) {
                            record.component = Component::Class(element);
                        }
                    }
                    array_of.insert(element, array);
                }
            }
        }

        for primitive in PrimitiveType::ALL {
            if !self.primitive_codes[primitive.code() as usize] {
                continue;
            }
            if unique_by_name(&self.classes, primitive.array_name()).is_none() {
                let key = synthetic.next_key();
                self.classes.insert(
                    key,
                    ClassRecord::placeholder(
                        key,
                        ClassName::named(primitive.array_name()),
                        Component::Primitive(primitive),
                    ),
                );
            }
        }

        let unknown_array_type = (self.bad_primitive_codes > 0).then(|| {
            let key = synthetic.next_key();
            self.classes.insert(
                key,
                ClassRecord::placeholder(key, ClassName::UnknownArrayType, Component::Unknown),
            );
            key
        });

        let root_class = match first_by_name(&self.classes, &config.root_class_name) {
            Some(key) => key,
            None => {
                debug!(name = %config.root_class_name, "fabricating root class");
                let key = synthetic.next_key();
                let mut record =
                    ClassRecord::placeholder(key, ClassName::named(config.root_class_name.as_str()), Component::None);
                record.super_ref = SuperRef::None;
                self.classes.insert(key, record);
                key
            }
        };

        let class_class = match first_by_name(&self.classes, &config.class_class_name) {
            Some(key) => key,
            None => {
                debug!(name = %config.class_class_name, "fabricating class-of-classes");
                let key = synthetic.next_key();
                let mut record =
                    ClassRecord::placeholder(key, ClassName::named(config.class_class_name.as_str()), Component::None);
                if let ClassKey::Address(root_address) = root_class {
                    record.super_ref = SuperRef::Known(root_address);
                }
                self.classes.insert(key, record);
                key
            }
        };

        let default_loader_type = first_by_name(&self.classes, &config.class_loader_class);

        for (class_address, gap) in &self.spacing {
            if let Some(record) = self.classes.get_mut(&ClassKey::Address(*class_address)) {
                record.refine_size(*gap);
            }
        }

        let mut registry = ClassRegistry::new();
        for record in self.classes.into_values() {
            registry.insert(record);
        }

        debug!(
            classes = registry.len(),
            synthesized = synthetic.issued(),
            duplicates = self.duplicate_defs,
            ?convention,
            "class registry built"
        );

        ScanClasses {
            registry,
            convention,
            array_of,
            root_class,
            class_class,
            unknown_array_type,
            default_loader_type,
        }
    }
}
