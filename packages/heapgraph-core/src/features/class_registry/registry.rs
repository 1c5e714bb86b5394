//! Class table of one namespace

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use super::domain::{ClassRecord, Component, PrimitiveType};
use crate::shared::models::ClassKey;

/// Outcome of a lookup that must be unambiguous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameLookup<T> {
    Unique(T),
    Ambiguous,
    Missing,
}

impl<T> NameLookup<T> {
    pub fn unique(self) -> Option<T> {
        match self {
            NameLookup::Unique(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, NameLookup::Ambiguous)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NameLookup<U> {
        match self {
            NameLookup::Unique(value) => NameLookup::Unique(f(value)),
            NameLookup::Ambiguous => NameLookup::Ambiguous,
            NameLookup::Missing => NameLookup::Missing,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<ClassKey, ClassRecord>,
    first_by_name: FxHashMap<String, ClassKey>,
    duplicate_names: FxHashSet<String>,
    primitive_arrays: [Option<ClassKey>; 8],
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record; name indexes are updated in place
    pub fn insert(&mut self, record: ClassRecord) -> Option<ClassRecord> {
        let key = record.key;
        self.index_name(&record);
        self.index_primitive(&record);
        let replaced = self.classes.insert(key, record);
        if replaced.is_some() {
            self.init_cache();
        }
        replaced
    }

    /// Remove a record. Name indexes go stale until [`Self::init_cache`].
    pub fn remove(&mut self, key: &ClassKey) -> Option<ClassRecord> {
        let removed = self.classes.remove(key)?;
        for slot in self.primitive_arrays.iter_mut() {
            if *slot == Some(*key) {
                *slot = None;
            }
        }
        Some(removed)
    }

    fn index_name(&mut self, record: &ClassRecord) {
        let Some(name) = record.name.real() else {
            return;
        };
        match self.first_by_name.get(name) {
            Some(existing) if *existing != record.key => {
                self.duplicate_names.insert(name.to_string());
                if record.key < *existing {
                    self.first_by_name.insert(name.to_string(), record.key);
                }
            }
            Some(_) => {}
            None => {
                self.first_by_name.insert(name.to_string(), record.key);
            }
        }
    }

    fn index_primitive(&mut self, record: &ClassRecord) {
        if let Component::Primitive(primitive) = record.component {
            let slot = &mut self.primitive_arrays[primitive.code() as usize];
            if slot.is_none() {
                *slot = Some(record.key);
            }
        }
    }

    /// Rebuild name and primitive indexes from the records
    pub fn init_cache(&mut self) {
        self.first_by_name.clear();
        self.duplicate_names.clear();
        self.primitive_arrays = [None; 8];
        let records: Vec<ClassRecord> = self.classes.values().cloned().collect();
        for record in &records {
            self.index_name(record);
            self.index_primitive(record);
        }
    }

    pub fn get(&self, key: &ClassKey) -> Option<&ClassRecord> {
        self.classes.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &ClassKey) -> Option<&mut ClassRecord> {
        self.classes.get_mut(key)
    }

    pub fn contains(&self, key: &ClassKey) -> bool {
        self.classes.contains_key(key)
    }

    /// First record with this name, by key order
    pub fn find_by_name(&self, name: &str) -> Option<&ClassRecord> {
        self.first_by_name
            .get(name)
            .and_then(|key| self.classes.get(key))
    }

    pub fn find_unique(&self, name: &str) -> NameLookup<&ClassRecord> {
        if self.duplicate_names.contains(name) {
            return NameLookup::Ambiguous;
        }
        match self.find_by_name(name) {
            Some(record) => NameLookup::Unique(record),
            None => NameLookup::Missing,
        }
    }

    pub fn primitive_array(&self, primitive: PrimitiveType) -> Option<ClassKey> {
        self.primitive_arrays[primitive.code() as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassRecord> {
        self.classes.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ClassKey> {
        self.classes.keys()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes whose name starts with `prefix`
    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.classes
            .values()
            .filter(|record| {
                record
                    .name
                    .real()
                    .is_some_and(|name| name.starts_with(prefix))
            })
            .count()
    }
}
