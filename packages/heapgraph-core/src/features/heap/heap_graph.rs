//! Heap graph
//!
//! Entry point of the crate. Opening a heap runs the initial scan, fixes the
//! address compressor, builds the class registry and resolves class loaders.
//! After that the heap is read-only apart from the segment cache, which sits
//! behind a `RefCell` because lookups fill it.
//!
//! # Example
//! ```
//! use heapgraph_core::{DumpBuilder, HeapConfig, HeapGraph};
//!
//! let dump = DumpBuilder::new()
//!     .class(0x100, "java/lang/Object", 0)
//!     .object(0x1000, 0x100, vec![])
//!     .build();
//! let heap = HeapGraph::open(dump, HeapConfig::default()).unwrap();
//! assert_eq!(heap.objects().count(), 1);
//! ```

use std::cell::{OnceCell, RefCell};
use std::ops::ControlFlow;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use super::iter::HeapObjects;
use super::scan::{InitialScan, ScanSummary};
use super::stats::HeapStats;
use crate::config::HeapConfig;
use crate::errors::Result;
use crate::features::class_registry::{ClassDirectory, NameLookup, NamespaceSummary};
use crate::features::event_source::{
    DumpHeader, EventSource, HeapEvent, HeapListener, SourceError,
};
use crate::features::graph::{ClassNode, GraphNode, ObjectNode, RootKind};
use crate::features::loader_resolver::{ClassLoaderResolver, CompanionSnapshot, ResolveReport};
use crate::features::object_store::{
    HeapObjectStore, ObjectRecord, ReplayEnd, SegmentCursor, SegmentEntry, StoreSettings,
};
use crate::shared::models::{ClassKey, CorruptData, NamespaceId};

/// Builder for [`HeapGraph`]
pub struct HeapGraphBuilder {
    source: Box<dyn EventSource>,
    config: HeapConfig,
    companion: Option<CompanionSnapshot>,
}

impl HeapGraphBuilder {
    pub fn config(mut self, config: HeapConfig) -> Self {
        self.config = config;
        self
    }

    pub fn companion(mut self, snapshot: CompanionSnapshot) -> Self {
        self.companion = Some(snapshot);
        self
    }

    pub fn open(self) -> Result<HeapGraph> {
        HeapGraph::open_with(self.source, self.config, self.companion)
    }
}

pub struct HeapGraph {
    config: HeapConfig,
    header: DumpHeader,
    store: RefCell<HeapObjectStore>,
    directory: ClassDirectory,
    scan: ScanSummary,
    report: ResolveReport,
    companion: Option<CompanionSnapshot>,
    root_objects: FxHashMap<u64, RootKind>,
    mirrors: OnceCell<FxHashMap<u64, u64>>,
}

impl HeapGraph {
    pub fn builder(source: impl EventSource + 'static) -> HeapGraphBuilder {
        HeapGraphBuilder {
            source: Box::new(source),
            config: HeapConfig::default(),
            companion: None,
        }
    }

    /// Open a heap without a companion snapshot
    pub fn open(source: impl EventSource + 'static, config: HeapConfig) -> Result<Self> {
        Self::open_with(Box::new(source), config, None)
    }

    fn open_with(
        source: Box<dyn EventSource>,
        config: HeapConfig,
        companion: Option<CompanionSnapshot>,
    ) -> Result<Self> {
        config.validate()?;
        let header = source.header().clone();
        let mut store = HeapObjectStore::new(source, StoreSettings::from(&config));

        let mut scan = InitialScan::new(header.array_class_in_refs);
        match store.replay(&mut scan)? {
            ReplayEnd::Completed { .. } | ReplayEnd::Exited { .. } => {}
            ReplayEnd::Broken(SourceError::Truncated { index, reason }) => {
                warn!(index, %reason, "dump truncated, heap ends early");
                let cause = CorruptData::new(format!("stream truncated at record {}: {}", index, reason));
                scan.summary.truncated = Some(match scan.summary.last_object {
                    Some(hint) => CorruptData::at("heap ends early", hint.address).caused_by(cause),
                    None => cause,
                });
            }
            ReplayEnd::Broken(err) => {
                warn!(error = %err, records = scan.summary.record_count, "dump unreadable past this record");
                scan.summary.truncated = Some(CorruptData::new(err.to_string()));
            }
        }
        let InitialScan {
            builder,
            mut compressor,
            summary,
            duplicate_records,
            ..
        } = scan;
        if !duplicate_records.is_empty() {
            warn!(duplicates = duplicate_records.len(), "dump reuses object addresses");
        }
        store.set_duplicate_records(duplicate_records);

        if config.compress_references && compressor.freeze() {
            store.install_compressor(compressor);
        } else {
            debug!("reference lists stored uncompressed");
        }
        store.set_object_extent(summary.extent());

        let mut directory = ClassDirectory::new(builder.finish(&config));
        let report = ClassLoaderResolver::new(&config).resolve(
            &mut store,
            &mut directory,
            companion.as_ref(),
        )?;

        let root_objects = companion
            .as_ref()
            .map(|snapshot| {
                let threads = snapshot
                    .threads
                    .iter()
                    .filter_map(|t| t.object_address)
                    .map(|address| (address, RootKind::Thread));
                let monitors = snapshot
                    .monitors
                    .iter()
                    .map(|m| (m.object_address, RootKind::Monitor));
                monitors.chain(threads).collect()
            })
            .unwrap_or_default();

        info!(
            records = summary.record_count,
            objects = summary.objects,
            classes = directory.class_count(),
            namespaces = directory.namespaces().count(),
            truncated = summary.truncated.is_some(),
            "heap opened"
        );

        Ok(Self {
            config,
            header,
            store: RefCell::new(store),
            directory,
            scan: summary,
            report,
            companion,
            root_objects,
            mirrors: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn header(&self) -> &DumpHeader {
        &self.header
    }

    pub fn directory(&self) -> &ClassDirectory {
        &self.directory
    }

    pub fn scan_summary(&self) -> &ScanSummary {
        &self.scan
    }

    pub fn resolve_report(&self) -> &ResolveReport {
        &self.report
    }

    pub fn companion(&self) -> Option<&CompanionSnapshot> {
        self.companion.as_ref()
    }

    /// Placeholder for where the stream broke, if it did
    pub fn truncation(&self) -> Option<&CorruptData> {
        self.scan.truncated.as_ref()
    }

    pub(crate) fn lookup_record(
        &self,
        address: u64,
        with_references: bool,
    ) -> Option<Rc<ObjectRecord>> {
        self.store.borrow_mut().lookup(address, with_references)
    }

    pub(crate) fn reference_addresses(&self, record: &ObjectRecord) -> Option<Vec<u64>> {
        record.reference_addresses(self.store.borrow().compressor())
    }

    /// Node for a reference target: a class if the address names one
    pub(crate) fn node_for(&self, address: u64) -> GraphNode<'_> {
        let key = ClassKey::Address(address);
        if self.directory.get(&key).is_some() {
            GraphNode::Class(ClassNode::new(self, key))
        } else {
            GraphNode::Object(ObjectNode::shallow(self, address))
        }
    }

    pub(crate) fn root_kind_of(&self, address: u64) -> Option<RootKind> {
        self.root_objects.get(&address).copied()
    }

    pub(crate) fn cursor_step(&self, cursor: &mut SegmentCursor) -> Option<SegmentEntry> {
        let mut store = self.store.borrow_mut();
        cursor.advance(&mut store)
    }

    /// Mirror object of a class, found by one replay on first use
    pub(crate) fn mirror_of(&self, class_address: u64) -> Option<u64> {
        self.mirrors
            .get_or_init(|| self.collect_mirrors())
            .get(&class_address)
            .copied()
    }

    fn collect_mirrors(&self) -> FxHashMap<u64, u64> {
        struct MirrorScan<'a> {
            class_class: u64,
            classes: &'a FxHashSet<u64>,
            mirrors: FxHashMap<u64, u64>,
        }

        impl HeapListener for MirrorScan<'_> {
            fn on_event(&mut self, _index: u64, event: &HeapEvent) -> ControlFlow<()> {
                if let HeapEvent::Object(object) = event {
                    if object.class_address == self.class_class {
                        if let Some(class) = object.references.iter().find(|r| self.classes.contains(*r)) {
                            self.mirrors.entry(*class).or_insert(object.address);
                        }
                    }
                }
                ControlFlow::Continue(())
            }
        }

        let ClassKey::Address(class_class) = self.directory.class_class() else {
            return FxHashMap::default();
        };
        let classes: FxHashSet<u64> = self
            .directory
            .classes()
            .filter(|record| !record.key.is_synthetic())
            .map(|record| record.address())
            .collect();
        let mut scan = MirrorScan {
            class_class,
            classes: &classes,
            mirrors: FxHashMap::default(),
        };

        match self.store.borrow_mut().replay(&mut scan) {
            Ok(_) => {}
            Err(err) => warn!(error = %err, "mirror scan could not open the dump"),
        }
        debug!(mirrors = scan.mirrors.len(), "class mirrors collected");
        scan.mirrors
    }

    /// Object at `address`, filled from the store
    pub fn object_at(&self, address: u64) -> Option<ObjectNode<'_>> {
        self.lookup_record(address, false)
            .map(|record| ObjectNode::filled(self, record))
    }

    /// Identity-only node; accessors fill it or report why they cannot
    pub fn node_at(&self, address: u64) -> ObjectNode<'_> {
        ObjectNode::shallow(self, address)
    }

    pub fn class(&self, key: ClassKey) -> Option<ClassNode<'_>> {
        self.directory
            .get(&key)
            .map(|_| ClassNode::new(self, key))
    }

    pub fn class_at(&self, address: u64) -> Option<ClassNode<'_>> {
        self.class(ClassKey::Address(address))
    }

    /// First class with this name, boot namespace first
    pub fn find_class(&self, name: &str) -> Option<ClassNode<'_>> {
        self.directory
            .find_by_name(name)
            .map(|record| ClassNode::new(self, record.key))
    }

    pub fn find_unique_class(&self, name: &str) -> NameLookup<ClassNode<'_>> {
        self.directory
            .find_unique(name)
            .map(|record| ClassNode::new(self, record.key))
    }

    pub fn find_classes(&self, name: &str) -> Vec<ClassNode<'_>> {
        self.directory
            .find_all(name)
            .into_iter()
            .map(|record| ClassNode::new(self, record.key))
            .collect()
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassNode<'_>> + '_ {
        self.directory
            .classes()
            .map(move |record| ClassNode::new(self, record.key))
    }

    pub fn namespaces(&self) -> Vec<NamespaceSummary> {
        self.directory.summaries()
    }

    pub fn boot_namespace(&self) -> NamespaceId {
        self.directory.boot()
    }

    /// Every object in dump order; corrupt records come back as `Err`
    pub fn objects(&self) -> HeapObjects<'_> {
        HeapObjects::new(self, self.store.borrow().iterate_all())
    }

    /// First object of the dump, built from scan hints
    pub fn first_object(&self) -> Option<ObjectNode<'_>> {
        let hint = self.scan.first_object?;
        Some(ObjectNode::filled(self, Rc::new(ObjectRecord::from_hint(&hint))))
    }

    /// Last object of the dump, built from scan hints without a replay
    pub fn last_object(&self) -> Option<ObjectNode<'_>> {
        let hint = self.scan.last_object?;
        let record = self.store.borrow().last_object(&hint);
        Some(ObjectNode::filled(self, Rc::new(record)))
    }

    /// Lowest and highest object address
    pub fn extent(&self) -> Option<(u64, u64)> {
        self.scan.extent()
    }

    /// Drop every cached segment payload; results stay the same
    pub fn evict_cached_segments(&self) {
        self.store.borrow_mut().evict_all();
    }

    pub fn stats(&self) -> HeapStats {
        let store = self.store.borrow();
        HeapStats {
            record_count: self.scan.record_count,
            objects: self.scan.objects,
            class_defs: self.scan.class_defs,
            corrupt_records: self.scan.corrupt_records,
            classes: self.directory.class_count(),
            synthesized_classes: self
                .directory
                .classes()
                .filter(|record| record.synthesized)
                .count(),
            namespaces: self.directory.namespaces().count(),
            loaders: self.report.loaders,
            boot_namespace: self.directory.boot(),
            compression_enabled: store.compressor().is_enabled(),
            truncated: self.scan.truncated.is_some(),
            store: store.stats(),
        }
    }
}
