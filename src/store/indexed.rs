//! Indexed document store
//!
//! Reads and writes whole JSON documents through a short freshness cache,
//! keeps lazily built secondary indexes per document and memoizes filtered
//! query results.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::LruTracker;
use crate::config::StoreConfig;
use crate::store::document::{read_document, write_document, DocumentKind, Record};
use crate::store::index::{index_key, DocumentIndex, Filters, ID_FIELD};
use crate::store::query::{QueryCache, QueryKey};
use crate::store::stats::{StoreCounters, StoreStats};

const RECORDS_QUERY: &str = "records";

// == Document Cache ==
#[derive(Debug)]
struct CachedDocument {
    records: Arc<Vec<Record>>,
    loaded_at: Instant,
    generation: u64,
}

/// Parsed documents keyed by kind, bounded by load recency.
///
/// `generations` outlives evicted parses so a document's generation never
/// goes backwards. `write_epochs` counts saves per document; a disk read that
/// overlapped a save must not replace the saved parse.
#[derive(Debug, Default)]
struct DocumentCache {
    entries: HashMap<DocumentKind, CachedDocument>,
    load_order: LruTracker<DocumentKind>,
    generations: HashMap<DocumentKind, u64>,
    write_epochs: HashMap<DocumentKind, u64>,
}

impl DocumentCache {
    fn write_epoch(&self, kind: DocumentKind) -> u64 {
        self.write_epochs.get(&kind).copied().unwrap_or(0)
    }

    fn cached(&self, kind: DocumentKind) -> Option<(Arc<Vec<Record>>, u64)> {
        self.entries
            .get(&kind)
            .map(|cached| (Arc::clone(&cached.records), cached.generation))
    }

    /// Installs records read from disk, unless a save landed after the read
    /// began at `read_epoch`.
    ///
    /// Returns the saved parse in that case, or None if it was already evicted.
    fn install_loaded(
        &mut self,
        kind: DocumentKind,
        records: Vec<Record>,
        read_epoch: u64,
        max_documents: usize,
    ) -> Option<(Arc<Vec<Record>>, u64)> {
        if self.write_epoch(kind) != read_epoch {
            debug!(document = %kind, "discarding read that overlapped a save");
            return self.cached(kind);
        }
        Some(self.store(kind, records, false, max_documents))
    }

    /// Installs the records just written by a save.
    fn install_saved(
        &mut self,
        kind: DocumentKind,
        records: Vec<Record>,
        max_documents: usize,
    ) -> (Arc<Vec<Record>>, u64) {
        *self.write_epochs.entry(kind).or_insert(0) += 1;
        self.store(kind, records, true, max_documents)
    }

    /// Caches freshly loaded records and returns them with their generation.
    ///
    /// The generation advances when `changed` is forced or the content differs
    /// from the cached parse (or there is no cached parse to compare against).
    fn store(
        &mut self,
        kind: DocumentKind,
        records: Vec<Record>,
        force_new_generation: bool,
        max_documents: usize,
    ) -> (Arc<Vec<Record>>, u64) {
        let changed = force_new_generation
            || self
                .entries
                .get(&kind)
                .map_or(true, |cached| *cached.records != records);

        let generation = self.generations.entry(kind).or_insert(0);
        if changed {
            *generation += 1;
        }
        let generation = *generation;

        let records = Arc::new(records);
        self.entries.insert(
            kind,
            CachedDocument {
                records: Arc::clone(&records),
                loaded_at: Instant::now(),
                generation,
            },
        );
        self.load_order.touch(&kind);

        while self.entries.len() > max_documents {
            let Some(oldest) = self.load_order.evict_oldest() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(document = %oldest, "evicted cached document");
        }

        (records, generation)
    }

    fn forget(&mut self, kind: DocumentKind) {
        self.entries.remove(&kind);
        self.load_order.remove(&kind);
    }
}

// == Indexed Store ==
/// JSON-file-backed record store with freshness caching, secondary indexes
/// and query memoization.
///
/// The document cache, the index table and the query cache each have their
/// own lock. Every record handed out is a copy.
#[derive(Debug)]
pub struct IndexedStore {
    config: StoreConfig,
    documents: Mutex<DocumentCache>,
    indexes: Mutex<HashMap<DocumentKind, Arc<DocumentIndex>>>,
    queries: Mutex<QueryCache>,
    counters: StoreCounters,
}

impl IndexedStore {
    pub fn new(config: StoreConfig) -> Self {
        let queries = QueryCache::new(config.query_cache_size);
        Self {
            config,
            documents: Mutex::new(DocumentCache::default()),
            indexes: Mutex::new(HashMap::new()),
            queries: Mutex::new(queries),
            counters: StoreCounters::default(),
        }
    }

    /// Path of the backing file for `kind`.
    pub fn document_path(&self, kind: DocumentKind) -> PathBuf {
        self.config.data_dir.join(kind.file_name())
    }

    // == Loading ==
    /// Returns the document's records and generation, re-reading from disk
    /// when the cached parse is older than the freshness window or `force_fresh`.
    fn load_records(&self, kind: DocumentKind, force_fresh: bool) -> (Arc<Vec<Record>>, u64) {
        let mut read_epoch = {
            let documents = self.documents.lock();
            if !force_fresh {
                if let Some(cached) = documents.entries.get(&kind) {
                    if cached.loaded_at.elapsed() < self.config.freshness {
                        StoreCounters::bump(&self.counters.document_hits);
                        return (Arc::clone(&cached.records), cached.generation);
                    }
                }
            }
            documents.write_epoch(kind)
        };
        StoreCounters::bump(&self.counters.document_misses);

        loop {
            let records = self.read_from_disk(kind);
            let mut documents = self.documents.lock();
            if let Some(loaded) = documents.install_loaded(
                kind,
                records,
                read_epoch,
                self.config.max_cached_documents,
            ) {
                return loaded;
            }
            // The overlapping save's parse is gone; its file is on disk now
            read_epoch = documents.write_epoch(kind);
        }
    }

    /// Reads a document's records, treating missing or malformed files as empty.
    fn read_from_disk(&self, kind: DocumentKind) -> Vec<Record> {
        StoreCounters::bump(&self.counters.disk_loads);
        let path = self.document_path(kind);
        match read_document(&path) {
            Ok(Some(document)) => {
                let records = kind.parse_records(&document);
                debug!(document = %kind, records = records.len(), "loaded document");
                records
            }
            Ok(None) => {
                debug!(document = %kind, path = %path.display(), "document missing, treating as empty");
                Vec::new()
            }
            Err(e) => {
                StoreCounters::bump(&self.counters.load_failures);
                warn!(document = %kind, path = %path.display(), error = %e, "unreadable document, treating as empty");
                Vec::new()
            }
        }
    }

    // == Indexing ==
    /// Returns indexes matching `generation`, building them if stale or absent.
    fn ensure_index(
        &self,
        kind: DocumentKind,
        records: Arc<Vec<Record>>,
        generation: u64,
    ) -> Arc<DocumentIndex> {
        if let Some(index) = self.current_index(kind, generation) {
            return index;
        }

        let index = Arc::new(DocumentIndex::build(records, generation));
        StoreCounters::bump(&self.counters.index_builds);
        debug!(document = %kind, generation, records = index.len(), "built indexes");
        self.indexes.lock().insert(kind, Arc::clone(&index));
        index
    }

    fn current_index(&self, kind: DocumentKind, generation: u64) -> Option<Arc<DocumentIndex>> {
        self.indexes
            .lock()
            .get(&kind)
            .filter(|index| index.generation() == generation)
            .cloned()
    }

    // == Get Records ==
    /// Returns copies of the document's records matching `filters`, in
    /// document order.
    ///
    /// With `use_cache`, results are memoized per document generation and
    /// filter shape.
    pub fn get_records(
        &self,
        kind: DocumentKind,
        filters: Option<&Filters>,
        use_cache: bool,
    ) -> Vec<Record> {
        let (records, generation) = self.load_records(kind, false);
        let key = QueryKey::new(RECORDS_QUERY, kind, generation, filters);

        if use_cache {
            if let Some(hit) = self.queries.lock().get(&key) {
                StoreCounters::bump(&self.counters.query_hits);
                return hit;
            }
            StoreCounters::bump(&self.counters.query_misses);
        }

        let index = self.ensure_index(kind, records, generation);
        let result = match filters {
            Some(filters) if !filters.is_empty() => index.filter(filters),
            _ => index.records().to_vec(),
        };

        if use_cache {
            self.queries.lock().put(key, kind, result.clone());
        }
        result
    }

    // == Get Record By Id ==
    /// Returns a copy of the record whose `id` equals `id`.
    ///
    /// Uses the id index when it is current; otherwise scans the records.
    pub fn get_record_by_id(&self, kind: DocumentKind, id: &Value) -> Option<Record> {
        let (records, generation) = self.load_records(kind, false);

        match self.current_index(kind, generation) {
            Some(index) => {
                StoreCounters::bump(&self.counters.index_hits);
                index.record_by_id(id).cloned()
            }
            None => {
                StoreCounters::bump(&self.counters.index_misses);
                debug!(document = %kind, id = %id, "id index not built, scanning records");
                records
                    .iter()
                    .find(|record| record.get(ID_FIELD) == Some(id))
                    .cloned()
            }
        }
    }

    // == Save Records ==
    /// Replaces the document's records on disk.
    ///
    /// Refreshes the cached parse, clears all indexes and drops memoized
    /// queries for the document. Returns false if the write failed.
    pub fn save_records(&self, kind: DocumentKind, records: Vec<Record>) -> bool {
        let document = kind.to_document(&records);
        let path = self.document_path(kind);
        if let Err(e) = write_document(&path, &document) {
            StoreCounters::bump(&self.counters.write_failures);
            error!(document = %kind, path = %path.display(), error = %e, "failed to write document");
            return false;
        }
        StoreCounters::bump(&self.counters.writes);

        // Cache what a fresh read of the file would produce
        let records = kind.parse_records(&document);
        let (_, generation) =
            self.documents
                .lock()
                .install_saved(kind, records, self.config.max_cached_documents);
        self.indexes.lock().clear();
        let purged = self.queries.lock().purge_document(kind);

        debug!(document = %kind, generation, purged, "saved document");
        true
    }

    // == Update Record ==
    /// Merges `patch` into the record with the given id and writes the
    /// document back. Returns false if no such record exists or the write failed.
    pub fn update_record(&self, kind: DocumentKind, id: &Value, patch: &Record) -> bool {
        let (records, _) = self.load_records(kind, true);
        let mut records = unshare(records);

        let Some(record) = records
            .iter_mut()
            .find(|record| record.get(ID_FIELD) == Some(id))
        else {
            debug!(document = %kind, id = %id, "update target not found");
            return false;
        };
        merge(record, patch);

        self.save_records(kind, records)
    }

    // == Batch Update ==
    /// Applies several patches with one read and one write.
    ///
    /// Returns the number of records updated; 0 if none matched or the write failed.
    pub fn batch_update(&self, kind: DocumentKind, updates: &[(Value, Record)]) -> usize {
        let (records, _) = self.load_records(kind, true);
        let mut records = unshare(records);

        let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if let Some(id) = record.get(ID_FIELD) {
                positions.entry(index_key(id)).or_insert(pos);
            }
        }

        let mut updated = 0;
        for (id, patch) in updates {
            match positions.get(&index_key(id)) {
                Some(pos) => {
                    merge(&mut records[*pos], patch);
                    updated += 1;
                }
                None => debug!(document = %kind, id = %id, "batch update target not found"),
            }
        }

        if updated == 0 || !self.save_records(kind, records) {
            return 0;
        }
        updated
    }

    // == Invalidation ==
    /// Drops cached parses, indexes and memoized queries for one document,
    /// or for all documents when `kind` is None.
    pub fn invalidate(&self, kind: Option<DocumentKind>) {
        let kinds: Vec<DocumentKind> = match kind {
            Some(kind) => vec![kind],
            None => DocumentKind::ALL.to_vec(),
        };

        {
            let mut documents = self.documents.lock();
            for kind in &kinds {
                documents.forget(*kind);
            }
        }
        {
            let mut indexes = self.indexes.lock();
            for kind in &kinds {
                indexes.remove(kind);
            }
        }
        let mut queries = self.queries.lock();
        match kind {
            Some(kind) => {
                queries.purge_document(kind);
            }
            None => queries.clear(),
        }
    }

    // == Stats ==
    /// Returns a snapshot of the store's counters and table sizes.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.counters.snapshot();
        stats.cached_documents = self.documents.lock().entries.len();
        stats.indexed_documents = self.indexes.lock().len();
        stats.cached_queries = self.queries.lock().len();
        stats
    }
}

/// Takes ownership of shared records, cloning only if still shared.
fn unshare(records: Arc<Vec<Record>>) -> Vec<Record> {
    Arc::try_unwrap(records).unwrap_or_else(|shared| shared.as_ref().clone())
}

/// Overwrites `record`'s fields with those in `patch`.
fn merge(record: &mut Record, patch: &Record) {
    for (field, value) in patch {
        record.insert(field.clone(), value.clone());
    }
}
