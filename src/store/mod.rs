//! Store Module
//!
//! Record access over JSON documents on disk, with a freshness-bounded parse
//! cache, secondary indexes and memoized queries.

mod document;
mod index;
mod indexed;
mod query;
mod stats;

pub use document::{read_document, write_document, DocumentKind, Record, STATUS_SECTIONS};
pub use index::{index_key, DocumentIndex, Filters, ID_FIELD, INDEXED_FIELDS};
pub use indexed::IndexedStore;
pub use query::{QueryCache, QueryKey};
pub use stats::StoreStats;
