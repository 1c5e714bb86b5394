//! Class-loader attribution
//!
//! Runs once after the initial scan, in four steps:
//!
//! 1. Decide which classes are loader classes: those deriving from the
//!    configured loader class, or, where inheritance data is missing, those
//!    with a loader-like name suffix.
//! 2. Replay the dump to find loader objects (instances of loader classes)
//!    and count class mirrors.
//! 3. Give every loader object a namespace and move each class to the
//!    namespace of the first loader its references point at. Dumps that carry
//!    class mirrors put the loader reference last, so the last match is used
//!    there. This is a heuristic and stays one.
//! 4. Merge the companion snapshot, then promote a namespace to boot when it
//!    is typed as the class-of-classes and owns enough core classes.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::companion::CompanionSnapshot;
use crate::config::HeapConfig;
use crate::features::class_registry::{ClassDirectory, ClassRecord, SuperRef};
use crate::features::event_source::{HeapEvent, HeapListener, SourceResult};
use crate::features::object_store::{HeapObjectStore, ReplayEnd};
use crate::shared::constants::MAX_HIERARCHY_DEPTH;
use crate::shared::models::{ClassKey, NamespaceId};

/// What attribution did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReport {
    pub loader_classes: usize,
    pub loaders: usize,
    pub mirrors: u64,
    pub loader_reference_last: bool,
    pub attributed: usize,
    pub companion_matched: usize,
    pub companion_unmatched: usize,
    pub companion_refused: usize,
    pub promoted: Option<NamespaceId>,
    /// False when the census replay hit a broken stream
    pub census_complete: bool,
}

/// Loader objects and mirror count found by the census replay
#[derive(Debug, Clone, Default)]
pub struct LoaderCensus {
    /// Loader object address to the address of its class
    pub loaders: BTreeMap<u64, u64>,
    pub mirrors: u64,
    pub complete: bool,
}

struct CensusListener<'a> {
    loader_classes: &'a FxHashSet<u64>,
    class_class: Option<u64>,
    census: LoaderCensus,
}

impl HeapListener for CensusListener<'_> {
    fn on_event(&mut self, _index: u64, event: &HeapEvent) -> ControlFlow<()> {
        if let HeapEvent::Object(object) = event {
            if self.loader_classes.contains(&object.class_address) {
                self.census
                    .loaders
                    .insert(object.address, object.class_address);
            }
            if self.class_class == Some(object.class_address) {
                self.census.mirrors += 1;
            }
        }
        ControlFlow::Continue(())
    }
}

pub struct ClassLoaderResolver<'a> {
    config: &'a HeapConfig,
}

impl<'a> ClassLoaderResolver<'a> {
    pub fn new(config: &'a HeapConfig) -> Self {
        Self { config }
    }

    fn has_loader_suffix(&self, record: &ClassRecord) -> bool {
        record.name.real().is_some_and(|name| {
            self.config
                .loader_name_suffixes
                .iter()
                .any(|suffix| name.ends_with(suffix.as_str()))
        })
    }

    fn is_loader_class(&self, directory: &ClassDirectory, record: &ClassRecord) -> bool {
        let mut current = record;
        for _ in 0..MAX_HIERARCHY_DEPTH {
            if current.name.real() == Some(self.config.class_loader_class.as_str()) {
                return true;
            }
            match current.super_ref {
                SuperRef::None => return false,
                SuperRef::Known(address) => match directory.get(&ClassKey::Address(address)) {
                    Some(parent) => current = parent,
                    None => {
                        return self.has_loader_suffix(record) || self.has_loader_suffix(current)
                    }
                },
                SuperRef::Unknown => {
                    return self.has_loader_suffix(record) || self.has_loader_suffix(current)
                }
            }
        }
        debug!(class = %record.key, "superclass chain too deep");
        false
    }

    /// Addresses of every loader class
    pub fn loader_classes(&self, directory: &ClassDirectory) -> FxHashSet<u64> {
        directory
            .classes()
            .filter(|record| !record.key.is_synthetic() && !record.name.is_sentinel())
            .filter(|record| self.is_loader_class(directory, record))
            .map(|record| record.address())
            .collect()
    }

    /// Replay the dump collecting loader objects and class mirrors
    pub fn census(
        &self,
        store: &mut HeapObjectStore,
        loader_classes: &FxHashSet<u64>,
        class_class: ClassKey,
    ) -> SourceResult<LoaderCensus> {
        let mut listener = CensusListener {
            loader_classes,
            class_class: match class_class {
                ClassKey::Address(address) => Some(address),
                ClassKey::Synthetic(_) => None,
            },
            census: LoaderCensus::default(),
        };
        let end = store.replay(&mut listener)?;
        let mut census = listener.census;
        census.complete = match end {
            ReplayEnd::Broken(err) => {
                warn!(error = %err, "loader census stopped at a broken stream");
                false
            }
            ReplayEnd::Exited { .. } | ReplayEnd::Completed { .. } => true,
        };
        Ok(census)
    }

    /// Create loader namespaces and move classes out of the default bucket.
    /// Returns the number of classes moved.
    pub fn attribute(&self, directory: &mut ClassDirectory, census: &LoaderCensus) -> usize {
        for (&loader, &class_address) in &census.loaders {
            directory.ensure_namespace(loader, Some(ClassKey::Address(class_address)));
        }

        let reference_last = census.mirrors > 0;
        let mut moves: BTreeMap<NamespaceId, Vec<ClassKey>> = BTreeMap::new();
        if let Some(default) = directory.namespace(NamespaceId::DEFAULT) {
            for record in default.registry.iter() {
                let is_loader = |address: &&u64| census.loaders.contains_key(*address);
                let hit = if reference_last {
                    record.references.iter().rev().find(is_loader)
                } else {
                    record.references.iter().find(is_loader)
                };
                if let Some(namespace) = hit.and_then(|loader| directory.namespace_for_loader(*loader))
                {
                    moves.entry(namespace).or_default().push(record.key);
                }
            }
        }

        moves
            .into_iter()
            .map(|(namespace, keys)| directory.move_classes(&keys, namespace))
            .sum()
    }

    /// Fold the companion snapshot's loader view into the directory.
    /// Returns (matched, unmatched, refused loaders).
    pub fn merge_companion(
        &self,
        directory: &mut ClassDirectory,
        snapshot: &CompanionSnapshot,
    ) -> (usize, usize, usize) {
        let (mut matched, mut unmatched, mut refused) = (0, 0, 0);

        for loader in &snapshot.loaders {
            let target = match loader.object_address {
                Some(address) => match directory.namespace_for_loader(address) {
                    Some(namespace) => namespace,
                    None => {
                        debug!(loader = address, "companion loader has no heap namespace");
                        unmatched += loader.classes.len();
                        continue;
                    }
                },
                None => directory.boot(),
            };

            let heap_type = directory.namespace(target).and_then(|ns| ns.loader_type);
            if let (Some(snapshot_type), Some(ClassKey::Address(heap_type))) =
                (loader.type_address, heap_type)
            {
                if snapshot_type != heap_type {
                    warn!(
                        snapshot_type,
                        heap_type, "companion loader type disagrees with heap, skipping"
                    );
                    refused += 1;
                    continue;
                }
            }

            let mut keys = Vec::new();
            for class in &loader.classes {
                let by_address = class
                    .address
                    .map(ClassKey::Address)
                    .filter(|key| directory.get(key).is_some());
                let key = by_address
                    .or_else(|| directory.find_unique(&class.name).unique().map(|r| r.key));

                match key {
                    Some(key) => {
                        if let Some(record) = directory.get_mut(&key) {
                            if record.methods.is_empty() && !class.methods.is_empty() {
                                record.methods = class.methods.clone();
                            }
                        }
                        keys.push(key);
                        matched += 1;
                    }
                    None => unmatched += 1,
                }
            }
            directory.move_classes(&keys, target);
        }

        debug!(matched, unmatched, refused, "companion snapshot merged");
        (matched, unmatched, refused)
    }

    /// Promote a loader namespace to boot when it is typed as the
    /// class-of-classes (or as the default bucket's own type) and owns enough
    /// core-package classes. The default bucket is folded into it.
    pub fn promote_boot(&self, directory: &mut ClassDirectory) -> Option<NamespaceId> {
        let class_class = directory.class_class();
        let default_type = directory
            .namespace(NamespaceId::DEFAULT)
            .and_then(|ns| ns.loader_type);
        let prefix = self.config.core_package_prefix.as_str();

        let (candidate, core_classes) = directory
            .namespaces()
            .filter(|ns| ns.id != NamespaceId::DEFAULT)
            .filter(|ns| {
                ns.loader_type == Some(class_class)
                    || (default_type.is_some() && ns.loader_type == default_type)
            })
            .map(|ns| (ns.id, ns.registry.count_with_prefix(prefix)))
            .filter(|(_, count)| *count >= self.config.boot_promotion_threshold)
            .max_by_key(|(id, count)| (*count, std::cmp::Reverse(*id)))?;

        let keys: Vec<ClassKey> = directory
            .namespace(NamespaceId::DEFAULT)
            .map(|ns| ns.registry.keys().copied().collect())
            .unwrap_or_default();
        directory.move_classes(&keys, candidate);
        directory.set_boot(candidate);
        directory.retire(NamespaceId::DEFAULT);
        info!(namespace = candidate.0, core_classes, "promoted namespace to boot");
        Some(candidate)
    }

    /// Run every step
    pub fn resolve(
        &self,
        store: &mut HeapObjectStore,
        directory: &mut ClassDirectory,
        companion: Option<&CompanionSnapshot>,
    ) -> SourceResult<ResolveReport> {
        let loader_classes = self.loader_classes(directory);
        let census = self.census(store, &loader_classes, directory.class_class())?;

        let mut report = ResolveReport {
            loader_classes: loader_classes.len(),
            loaders: census.loaders.len(),
            mirrors: census.mirrors,
            loader_reference_last: census.mirrors > 0,
            census_complete: census.complete,
            ..ResolveReport::default()
        };
        report.attributed = self.attribute(directory, &census);

        if let Some(snapshot) = companion.filter(|_| self.config.companion_merge) {
            let (matched, unmatched, refused) = self.merge_companion(directory, snapshot);
            report.companion_matched = matched;
            report.companion_unmatched = unmatched;
            report.companion_refused = refused;
        }

        report.promoted = self.promote_boot(directory);
        info!(
            loaders = report.loaders,
            attributed = report.attributed,
            namespaces = directory.namespaces().count(),
            "class loaders resolved"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::class_registry::RegistryBuilder;
    use crate::features::event_source::{ClassDefRecord, DumpBuilder, EventSource, RecordedDump};
    use crate::features::object_store::{ObjectHint, StoreSettings};

    const OBJECT: u64 = 0x10;
    const CLASS: u64 = 0x20;
    const LOADER: u64 = 0x30;
    const APP_LOADER: u64 = 0x40;

    fn base() -> DumpBuilder {
        DumpBuilder::new()
            .class(OBJECT, "java/lang/Object", 0)
            .class(CLASS, "java/lang/Class", OBJECT)
            .class(LOADER, "java/lang/ClassLoader", OBJECT)
            .class(APP_LOADER, "app/AppLoader", LOADER)
    }

    fn open(dump: RecordedDump, config: &HeapConfig) -> (HeapObjectStore, ClassDirectory) {
        let header = dump.header().clone();
        let mut builder = RegistryBuilder::new();
        let mut reader = dump.open().unwrap();
        struct Feed<'b>(&'b mut RegistryBuilder, bool);
        impl HeapListener for Feed<'_> {
            fn on_event(&mut self, _index: u64, event: &HeapEvent) -> ControlFlow<()> {
                match event {
                    HeapEvent::ClassDef(def) => self.0.add_class(def),
                    other => {
                        if let Some(hint) = ObjectHint::from_event(other, self.1) {
                            self.0.add_object(&hint);
                        }
                    }
                }
                ControlFlow::Continue(())
            }
        }
        reader
            .parse(&mut Feed(&mut builder, header.array_class_in_refs))
            .unwrap();
        let directory = ClassDirectory::new(builder.finish(config));
        let store = HeapObjectStore::new(Box::new(dump), StoreSettings::from(config));
        (store, directory)
    }

    #[test]
    fn test_loader_classes_by_inheritance_and_suffix() {
        let config = HeapConfig::default();
        let dump = base()
            .class_def(ClassDefRecord::new(0x50, "other/WeirdLoader"))
            .class_def(ClassDefRecord::new(0x60, "other/NotOne"))
            .class(0x70, "other/PlainLoader", OBJECT)
            .build();
        let (_, directory) = open(dump, &config);

        let loaders = ClassLoaderResolver::new(&config).loader_classes(&directory);
        assert!(loaders.contains(&LOADER));
        assert!(loaders.contains(&APP_LOADER));
        // No recorded superclass, loader-like suffix
        assert!(loaders.contains(&0x50));
        assert!(!loaders.contains(&0x60));
        // Full chain to the root without the loader class
        assert!(!loaders.contains(&0x70));
    }

    #[test]
    fn test_first_matching_reference_wins_without_mirrors() {
        let config = HeapConfig::default();
        let dump = base()
            .class_def(
                ClassDefRecord::new(0x100, "app/Foo")
                    .with_super(OBJECT)
                    .with_references(vec![0x9000, 0x9100]),
            )
            .object(0x9000, APP_LOADER, vec![])
            .object(0x9100, APP_LOADER, vec![])
            .build();
        let (mut store, mut directory) = open(dump, &config);

        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        assert_eq!(report.loaders, 2);
        assert!(!report.loader_reference_last);
        let ns = directory.namespace_for_loader(0x9000).unwrap();
        assert_eq!(directory.namespace_of(&ClassKey::Address(0x100)), Some(ns));
    }

    #[test]
    fn test_last_matching_reference_with_mirrors() {
        let config = HeapConfig::default();
        let dump = base()
            .class_def(
                ClassDefRecord::new(0x100, "app/Foo")
                    .with_super(OBJECT)
                    .with_references(vec![0x9000, 0x9100]),
            )
            .object(0x9000, APP_LOADER, vec![])
            .object(0x9100, APP_LOADER, vec![])
            .object(0x9200, CLASS, vec![0x100])
            .build();
        let (mut store, mut directory) = open(dump, &config);

        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        assert_eq!(report.mirrors, 1);
        let ns = directory.namespace_for_loader(0x9100).unwrap();
        assert_eq!(directory.namespace_of(&ClassKey::Address(0x100)), Some(ns));
    }

    #[test]
    fn test_unresolved_classes_stay_default() {
        let config = HeapConfig::default();
        let dump = base()
            .class_def(ClassDefRecord::new(0x100, "app/Foo").with_references(vec![0x1234]))
            .build();
        let (mut store, mut directory) = open(dump, &config);
        ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        assert_eq!(
            directory.namespace_of(&ClassKey::Address(0x100)),
            Some(NamespaceId::DEFAULT)
        );
    }

    #[test]
    fn test_companion_matches_by_address_then_name() {
        let config = HeapConfig::default();
        let dump = base()
            .class(0x100, "app/Foo", OBJECT)
            .class(0x200, "app/Bar", OBJECT)
            .object(0x9000, APP_LOADER, vec![])
            .build();
        let (mut store, mut directory) = open(dump, &config);
        let snapshot = CompanionSnapshot::from_json(
            r#"{"loaders": [{"object_address": 36864, "type_address": 64, "classes": [
                {"address": 256, "name": "ignored"},
                {"name": "app/Bar", "methods": ["run()V"]},
                {"name": "app/Missing"}
            ]}]}"#,
        )
        .unwrap();

        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, Some(&snapshot))
            .unwrap();
        assert_eq!(report.companion_matched, 2);
        assert_eq!(report.companion_unmatched, 1);
        let ns = directory.namespace_for_loader(0x9000).unwrap();
        assert_eq!(directory.namespace_of(&ClassKey::Address(0x100)), Some(ns));
        assert_eq!(directory.namespace_of(&ClassKey::Address(0x200)), Some(ns));
        assert_eq!(
            directory.get(&ClassKey::Address(0x200)).unwrap().methods,
            vec!["run()V".to_string()]
        );
    }

    #[test]
    fn test_companion_type_disagreement_refused() {
        let config = HeapConfig::default();
        let dump = base()
            .class(0x100, "app/Foo", OBJECT)
            .object(0x9000, APP_LOADER, vec![])
            .build();
        let (mut store, mut directory) = open(dump, &config);
        let snapshot = CompanionSnapshot::from_json(
            r#"{"loaders": [{"object_address": 36864, "type_address": 4095,
                "classes": [{"address": 256, "name": "app/Foo"}]}]}"#,
        )
        .unwrap();

        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, Some(&snapshot))
            .unwrap();
        assert_eq!(report.companion_refused, 1);
        assert_eq!(
            directory.namespace_of(&ClassKey::Address(0x100)),
            Some(NamespaceId::DEFAULT)
        );
    }

    fn boot_dump(core_classes: u64) -> RecordedDump {
        boot_dump_typed(core_classes, 0x80)
    }

    /// One loader object of class `loader_type` owning `core_classes` core classes
    fn boot_dump_typed(core_classes: u64, loader_type: u64) -> RecordedDump {
        let mut builder = base().class(0x80, "java/lang/BootLoader", LOADER);
        for i in 0..core_classes {
            builder = builder.class_def(
                ClassDefRecord::new(0x1000 + i * 0x10, format!("java/lang/Core{}", i))
                    .with_super(OBJECT)
                    .with_references(vec![0x9000]),
            );
        }
        builder
            .class(0x500, "app/Foo", OBJECT)
            .object(0x9000, loader_type, vec![])
            .build()
    }

    #[test]
    fn test_boot_requires_class_typed_loader() {
        let config = HeapConfig::default();
        let (mut store, mut directory) = open(boot_dump(6), &config);
        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        // Loader typed as BootLoader, not as the class-of-classes
        assert_eq!(report.promoted, None);
        assert_eq!(directory.boot(), NamespaceId::DEFAULT);
    }

    #[test]
    fn test_boot_promotion_threshold() {
        let config = HeapConfig::default().class_class_name("java/lang/BootLoader");
        let (mut store, mut directory) = open(boot_dump(6), &config);
        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        let boot = report.promoted.unwrap();
        assert_eq!(directory.boot(), boot);
        assert_eq!(directory.namespace_of(&ClassKey::Address(0x500)), Some(boot));
        assert!(directory.namespaces().all(|ns| ns.id != NamespaceId::DEFAULT));

        let (mut store, mut directory) = open(boot_dump(4), &config);
        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        assert_eq!(report.promoted, None);
    }

    #[test]
    fn test_default_namespace_typed_as_loader_class() {
        let config = HeapConfig::default();
        let (_, directory) = open(boot_dump(0), &config);
        let default = directory.namespace(NamespaceId::DEFAULT).unwrap();
        assert_eq!(default.loader_type, Some(ClassKey::Address(LOADER)));

        let config = HeapConfig::default().class_loader_class("other/Missing");
        let (_, directory) = open(boot_dump(0), &config);
        let default = directory.namespace(NamespaceId::DEFAULT).unwrap();
        assert_eq!(default.loader_type, None);
    }

    #[test]
    fn test_boot_promotion_by_default_namespace_type() {
        let config = HeapConfig::default();
        let (mut store, mut directory) = open(boot_dump_typed(5, LOADER), &config);
        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        let boot = report.promoted.unwrap();
        assert_eq!(directory.boot(), boot);
        assert_eq!(directory.namespace_for_loader(0x9000), Some(boot));
        assert_eq!(directory.namespace_of(&ClassKey::Address(0x500)), Some(boot));

        let (mut store, mut directory) = open(boot_dump_typed(4, LOADER), &config);
        let report = ClassLoaderResolver::new(&config)
            .resolve(&mut store, &mut directory, None)
            .unwrap();
        assert_eq!(report.promoted, None);
        assert_eq!(directory.boot(), NamespaceId::DEFAULT);
    }
}
