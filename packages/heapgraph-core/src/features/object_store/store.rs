//! Segmented object store
//!
//! The heap is cut into segments of bounded cost in stream order. A segment's
//! descriptor (start record, bounds, object count) is kept forever; its
//! payload lives in an LRU cache and is rebuilt from the descriptor by
//! replaying the stream when it has been evicted. Rebuilding replays the same
//! records under the same budget, so a payload always comes back identical.
//!
//! Segments are discovered lazily: lookups and iteration extend the known
//! prefix one segment at a time until the stream ends.

use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::collector::SegmentCollector;
use super::domain::{ObjectHint, ObjectRecord, SegmentDescriptor, SegmentEntry, SegmentPayload};
use super::reader_pool::ReaderPool;
use crate::config::HeapConfig;
use crate::features::address_compression::AddressCompressor;
use crate::features::event_source::{
    DumpHeader, EventSource, HeapListener, ParseOutcome, SourceError, SourceResult,
};
use crate::shared::models::CorruptData;

/// Store knobs taken from [`HeapConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub segment_budget: u64,
    pub reference_cost_scale: u64,
    pub max_cached_segments: usize,
    pub reader_pool_size: usize,
    pub lazy_references: bool,
}

impl From<&HeapConfig> for StoreSettings {
    fn from(config: &HeapConfig) -> Self {
        Self {
            segment_budget: config.segment_budget,
            reference_cost_scale: config.reference_cost_scale,
            max_cached_segments: config.max_cached_segments,
            reader_pool_size: config.reader_pool_size,
            lazy_references: config.lazy_references,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&HeapConfig::default())
    }
}

/// Counters describing store activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub segments: usize,
    pub cached_segments: usize,
    pub end_confirmed: bool,
    pub fetches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rematerializations: u64,
    pub reference_upgrades: u64,
    pub readers_opened: u64,
    /// Reference lists materialized as compressed indices
    pub compressed_lists: u64,
    /// Reference lists materialized as full addresses
    pub wide_lists: u64,
    /// A segment ended on a broken stream
    pub truncated: bool,
}

/// One materialized segment, not yet registered
#[derive(Debug)]
pub struct FetchedSegment {
    pub descriptor: SegmentDescriptor,
    pub payload: SegmentPayload,
    /// Placeholder for where the stream broke, if it did
    pub broken: Option<CorruptData>,
}

/// How a full replay ended
#[derive(Debug)]
pub enum ReplayEnd {
    /// The listener exited early
    Exited { position: u64 },
    Completed { record_count: u64 },
    /// The stream broke after it was opened
    Broken(SourceError),
}

pub struct HeapObjectStore {
    source: Box<dyn EventSource>,
    settings: StoreSettings,
    compressor: AddressCompressor,
    descriptors: Vec<SegmentDescriptor>,
    cache: LruCache<usize, Rc<SegmentPayload>>,
    readers: ReaderPool,
    end_confirmed: bool,
    object_extent: Option<(u64, u64)>,
    duplicate_records: FxHashSet<u64>,
    truncated: bool,
    stats: StoreStats,
}

impl HeapObjectStore {
    pub fn new(source: Box<dyn EventSource>, settings: StoreSettings) -> Self {
        let capacity = NonZeroUsize::new(settings.max_cached_segments).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            readers: ReaderPool::new(settings.reader_pool_size),
            settings,
            compressor: AddressCompressor::new(),
            descriptors: Vec::new(),
            cache: LruCache::new(capacity),
            end_confirmed: false,
            object_extent: None,
            duplicate_records: FxHashSet::default(),
            truncated: false,
            stats: StoreStats::default(),
        }
    }

    pub fn header(&self) -> &DumpHeader {
        self.source.header()
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Install the compressor fixed after the first pass. Payloads built
    /// before this point are dropped so every cached list uses one encoding.
    pub fn install_compressor(&mut self, compressor: AddressCompressor) {
        self.compressor = compressor;
        self.cache.clear();
    }

    pub fn compressor(&self) -> &AddressCompressor {
        &self.compressor
    }

    /// Lowest and highest object address, known from the first pass
    pub fn set_object_extent(&mut self, extent: Option<(u64, u64)>) {
        self.object_extent = extent;
    }

    pub fn object_extent(&self) -> Option<(u64, u64)> {
        self.object_extent
    }

    /// Record indices that reuse an address taken by an earlier record. They
    /// materialize as placeholders in whichever segment holds them.
    pub fn set_duplicate_records(&mut self, records: FxHashSet<u64>) {
        self.duplicate_records = records;
    }

    /// Replay the whole stream from record 0 into `listener`.
    ///
    /// Failing to open the stream is an error; a stream that breaks later is
    /// reported as [`ReplayEnd::Broken`] after the listener saw every intact
    /// record.
    pub fn replay(&mut self, listener: &mut dyn HeapListener) -> SourceResult<ReplayEnd> {
        let mut reader = self.readers.checkout(self.source.as_ref(), 0)?;
        match reader.parse(listener) {
            Ok(ParseOutcome::Exited) => {
                let position = reader.position();
                self.readers.checkin(reader);
                Ok(ReplayEnd::Exited { position })
            }
            Ok(ParseOutcome::Completed { record_count }) => {
                reader.close();
                Ok(ReplayEnd::Completed { record_count })
            }
            Err(err) => {
                reader.close();
                Ok(ReplayEnd::Broken(err))
            }
        }
    }

    /// Materialize records from `start_index` until their cost reaches
    /// `budget` or the stream ends.
    pub fn fetch_segment(
        &mut self,
        start_index: u64,
        budget: u64,
        with_references: bool,
    ) -> FetchedSegment {
        self.stats.fetches += 1;
        let preceding_address = self
            .descriptors
            .iter()
            .rev()
            .filter(|d| d.next_index <= start_index && d.object_count > 0)
            .map(|d| d.max_address)
            .next();
        let array_class_in_refs = self.source.header().array_class_in_refs;

        let mut collector = SegmentCollector::new(
            start_index,
            budget,
            self.settings.reference_cost_scale,
            with_references,
            array_class_in_refs,
            &self.compressor,
            &self.duplicate_records,
        );

        let (next_index, terminal, broken) =
            match self.readers.checkout(self.source.as_ref(), start_index) {
                Err(err) => {
                    warn!(start_index, error = %err, "could not reopen dump for segment");
                    let corrupt = collector
                        .terminate(format!("could not reopen dump: {}", err), preceding_address);
                    (start_index, true, Some(corrupt))
                }
                Ok(mut reader) => match reader.parse(&mut collector) {
                    Ok(ParseOutcome::Exited) => {
                        let next = reader.position();
                        self.readers.checkin(reader);
                        (next, false, None)
                    }
                    Ok(ParseOutcome::Completed { record_count }) => {
                        reader.close();
                        (record_count, true, None)
                    }
                    Err(err) => {
                        reader.close();
                        debug!(start_index, error = %err, "segment ended on a broken stream");
                        let corrupt = collector.terminate(err.to_string(), preceding_address);
                        let next = match &err {
                            SourceError::Truncated { index, .. } => *index,
                            _ => start_index,
                        };
                        (next, true, Some(corrupt))
                    }
                },
            };

        let (payload, bounds) = collector.finish();
        self.stats.compressed_lists += bounds.compressed_lists;
        self.stats.wide_lists += bounds.wide_lists;
        let descriptor = SegmentDescriptor {
            start_index,
            next_index: next_index.max(bounds.last_index.map_or(start_index, |i| i + 1)),
            object_count: bounds.object_count,
            min_address: bounds.min_address,
            max_address: bounds.max_address,
            budget,
            has_references: with_references,
            terminal,
        };
        debug!(
            start_index,
            next_index = descriptor.next_index,
            objects = descriptor.object_count,
            with_references,
            "fetched segment"
        );
        FetchedSegment {
            descriptor,
            payload,
            broken,
        }
    }

    /// Fetch the segment after the last known one. Returns its id, or `None`
    /// once the end of the heap is confirmed.
    fn extend(&mut self) -> Option<usize> {
        if self.end_confirmed {
            return None;
        }

        let start = self.descriptors.last().map_or(0, |d| d.next_index);
        let with_references = !self.settings.lazy_references;
        let FetchedSegment {
            descriptor,
            payload,
            broken,
        } = self.fetch_segment(start, self.settings.segment_budget, with_references);

        if descriptor.terminal {
            self.end_confirmed = true;
            self.truncated |= broken.is_some();
            debug!(segments = self.descriptors.len(), "end of heap confirmed");
        }
        if payload.is_empty() {
            return None;
        }

        let id = self.descriptors.len();
        self.descriptors.push(descriptor);
        self.cache.put(id, Rc::new(payload));
        Some(id)
    }

    /// Payload of a known segment, rebuilt if it was evicted or lacks the
    /// references the caller needs
    fn payload(&mut self, id: usize, need_references: bool) -> Rc<SegmentPayload> {
        let descriptor = self.descriptors[id];
        let upgrade = match self.cache.get(&id) {
            Some(payload) if !need_references || payload.with_references() => {
                self.stats.cache_hits += 1;
                return Rc::clone(payload);
            }
            Some(_) => true,
            None => false,
        };

        let with_references =
            need_references || descriptor.has_references || !self.settings.lazy_references;
        if upgrade {
            self.stats.reference_upgrades += 1;
        } else {
            self.stats.cache_misses += 1;
            self.stats.rematerializations += 1;
        }

        let fetched = self.fetch_segment(descriptor.start_index, descriptor.budget, with_references);
        if fetched.descriptor.object_count != descriptor.object_count {
            warn!(
                segment = id,
                expected = descriptor.object_count,
                found = fetched.descriptor.object_count,
                "segment changed on rematerialization"
            );
        }
        if with_references {
            self.descriptors[id].has_references = true;
        }

        let payload = Rc::new(fetched.payload);
        self.cache.put(id, Rc::clone(&payload));
        payload
    }

    /// Segment `id`, discovering segments up to it if needed
    pub fn segment(&mut self, id: usize, need_references: bool) -> Option<Rc<SegmentPayload>> {
        while id >= self.descriptors.len() {
            self.extend()?;
        }
        Some(self.payload(id, need_references))
    }

    /// Record at `address`, or `None` if no object lives there
    pub fn lookup(&mut self, address: u64, with_references: bool) -> Option<Rc<ObjectRecord>> {
        if let Some((low, high)) = self.object_extent {
            if address < low || address > high {
                return None;
            }
        }

        let candidates: Vec<usize> = self
            .descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.contains(address))
            .map(|(id, _)| id)
            .collect();
        for id in candidates {
            if let Some(record) = self.payload(id, with_references).get(address) {
                return Some(Rc::clone(record));
            }
        }

        while let Some(id) = self.extend() {
            if self.descriptors[id].contains(address) {
                if let Some(record) = self.payload(id, with_references).get(address) {
                    return Some(Rc::clone(record));
                }
            }
        }
        None
    }

    /// Minimal record from hints, without touching the stream
    pub fn last_object(&self, hint: &ObjectHint) -> ObjectRecord {
        ObjectRecord::from_hint(hint)
    }

    /// Fresh cursor over every entry in stream order
    pub fn iterate_all(&self) -> SegmentCursor {
        SegmentCursor::default()
    }

    /// Drop every cached payload; descriptors stay
    pub fn evict_all(&mut self) {
        debug!(evicted = self.cache.len(), "evicting cached segments");
        self.cache.clear();
    }

    pub fn descriptors(&self) -> &[SegmentDescriptor] {
        &self.descriptors
    }

    pub fn is_end_confirmed(&self) -> bool {
        self.end_confirmed
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            segments: self.descriptors.len(),
            cached_segments: self.cache.len(),
            end_confirmed: self.end_confirmed,
            readers_opened: self.readers.opened(),
            truncated: self.truncated,
            ..self.stats
        }
    }
}

impl Drop for HeapObjectStore {
    fn drop(&mut self) {
        self.readers.close_all();
    }
}

/// Restartable position in the store's iteration order.
///
/// The cursor holds no borrow of the store, so callers can interleave other
/// store calls between steps.
#[derive(Debug, Default, Clone)]
pub struct SegmentCursor {
    segment: usize,
    offset: usize,
    payload: Option<Rc<SegmentPayload>>,
}

impl SegmentCursor {
    pub fn advance(&mut self, store: &mut HeapObjectStore) -> Option<SegmentEntry> {
        loop {
            if self.payload.is_none() {
                self.payload = Some(store.segment(self.segment, false)?);
            }
            if let Some(payload) = &self.payload {
                if let Some(entry) = payload.entries().get(self.offset) {
                    self.offset += 1;
                    return Some(entry.clone());
                }
            }
            self.segment += 1;
            self.offset = 0;
            self.payload = None;
        }
    }
}
