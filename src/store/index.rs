//! Secondary indexes over a document's records.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::store::document::Record;

/// Unique record identifier field.
pub const ID_FIELD: &str = "id";

/// Non-unique fields with grouping indexes.
pub const INDEXED_FIELDS: [&str; 3] = ["type", "status", "priority"];

/// Field name to expected value; sorted so equal filters hash equally.
pub type Filters = BTreeMap<String, Value>;

/// Canonical index key for a field value.
///
/// Uses the compact JSON form, so `1` and `"1"` stay distinct.
pub fn index_key(value: &Value) -> String {
    value.to_string()
}

// == Document Index ==
/// Indexes for one document, built from one generation of its records.
///
/// Indexes store positions into `records`; position lists are ascending, so
/// results keep document order.
#[derive(Debug)]
pub struct DocumentIndex {
    generation: u64,
    records: Arc<Vec<Record>>,
    by_id: HashMap<String, usize>,
    by_field: HashMap<&'static str, HashMap<String, Vec<usize>>>,
}

impl DocumentIndex {
    /// Builds every index in one pass. The first record wins on duplicate ids.
    pub fn build(records: Arc<Vec<Record>>, generation: u64) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_field: HashMap<&'static str, HashMap<String, Vec<usize>>> = INDEXED_FIELDS
            .iter()
            .map(|field| (*field, HashMap::new()))
            .collect();

        for (pos, record) in records.iter().enumerate() {
            if let Some(id) = record.get(ID_FIELD) {
                by_id.entry(index_key(id)).or_insert(pos);
            }
            for field in INDEXED_FIELDS {
                if let (Some(value), Some(groups)) = (record.get(field), by_field.get_mut(field)) {
                    groups.entry(index_key(value)).or_default().push(pos);
                }
            }
        }

        Self {
            generation,
            records,
            by_id,
            by_field,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record through the unique-id index.
    pub fn record_by_id(&self, id: &Value) -> Option<&Record> {
        self.by_id
            .get(&index_key(id))
            .and_then(|pos| self.records.get(*pos))
    }

    /// Positions of records whose `field` equals `value`.
    ///
    /// Returns None when `field` has no index.
    pub fn positions(&self, field: &str, value: &Value) -> Option<&[usize]> {
        let groups = self.by_field.get(field)?;
        Some(
            groups
                .get(&index_key(value))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        )
    }

    // == Filter ==
    /// Returns copies of the records matching every filter, in document order.
    ///
    /// Indexed fields are resolved first by intersecting position lists; the
    /// remaining predicates are checked by scanning the reduced set.
    pub fn filter(&self, filters: &Filters) -> Vec<Record> {
        let mut candidates: Option<Vec<usize>> = None;
        let mut residual = Vec::new();

        for (field, expected) in filters {
            let Some(positions) = self.positions(field, expected) else {
                residual.push((field, expected));
                continue;
            };
            let narrowed = match candidates {
                None => positions.to_vec(),
                Some(current) => intersect_sorted(&current, positions),
            };
            if narrowed.is_empty() {
                return Vec::new();
            }
            candidates = Some(narrowed);
        }

        let matches = |record: &&Record| {
            residual
                .iter()
                .all(|(field, expected)| record.get(field.as_str()) == Some(*expected))
        };

        match candidates {
            Some(positions) => positions
                .iter()
                .filter_map(|pos| self.records.get(*pos))
                .filter(matches)
                .cloned()
                .collect(),
            None => self.records.iter().filter(matches).cloned().collect(),
        }
    }
}

/// Intersection of two ascending position lists, kept ascending.
fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
