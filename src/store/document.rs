//! Backing documents
//!
//! Each document is a JSON file holding a collection of records plus an
//! `updated_at` timestamp. The task list keeps its records under `tasks`; the
//! status document partitions them into one section per lifecycle state.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CacheError, Result};

/// A single record: a JSON object.
pub type Record = Map<String, Value>;

/// Lifecycle sections of the status document, in read order.
pub const STATUS_SECTIONS: [&str; 4] = ["pending", "in_progress", "completed", "failed"];

/// Status given to records saved into the status document without one.
pub const DEFAULT_STATUS: &str = "pending";

const TASKS_KEY: &str = "tasks";
const UPDATED_AT_KEY: &str = "updated_at";
const STATUS_FIELD: &str = "status";

// == Document Kind ==
/// The fixed set of documents the store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Task list keyed by `id`
    Tasks,
    /// Per-lifecycle-state status document
    Status,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Tasks, DocumentKind::Status];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Tasks => "tasks",
            DocumentKind::Status => "status",
        }
    }

    /// File name under the store's data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentKind::Tasks => "tasks.json",
            DocumentKind::Status => "task_status.json",
        }
    }

    // == Parse ==
    /// Extracts records from a parsed document, in document order.
    ///
    /// Entries that are not JSON objects are skipped. Status records without a
    /// `status` field take the name of the section they were found in.
    pub fn parse_records(&self, document: &Value) -> Vec<Record> {
        match self {
            DocumentKind::Tasks => {
                let list = match document {
                    Value::Array(items) => Some(items),
                    other => other.get(TASKS_KEY).and_then(Value::as_array),
                };
                list.map(|items| objects(items).collect())
                    .unwrap_or_default()
            }
            DocumentKind::Status => {
                let Some(sections) = document.as_object() else {
                    return Vec::new();
                };
                let extra = sections
                    .keys()
                    .map(String::as_str)
                    .filter(|name| *name != UPDATED_AT_KEY && !STATUS_SECTIONS.contains(name));
                let order: Vec<&str> = STATUS_SECTIONS.iter().copied().chain(extra).collect();

                let mut records = Vec::new();
                for section in order {
                    let Some(items) = sections.get(section).and_then(Value::as_array) else {
                        continue;
                    };
                    for mut record in objects(items) {
                        record
                            .entry(STATUS_FIELD)
                            .or_insert_with(|| Value::String(section.to_string()));
                        records.push(record);
                    }
                }
                records
            }
        }
    }

    // == Serialize ==
    /// Builds the full document for `records`, stamped with the current time.
    pub fn to_document(&self, records: &[Record]) -> Value {
        let updated_at = Value::String(chrono::Utc::now().to_rfc3339());
        let mut document = Map::new();

        match self {
            DocumentKind::Tasks => {
                document.insert(
                    TASKS_KEY.to_string(),
                    Value::Array(records.iter().cloned().map(Value::Object).collect()),
                );
            }
            DocumentKind::Status => {
                for section in STATUS_SECTIONS {
                    document.insert(section.to_string(), Value::Array(Vec::new()));
                }
                for record in records {
                    let section = record
                        .get(STATUS_FIELD)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty() && *s != UPDATED_AT_KEY)
                        .unwrap_or(DEFAULT_STATUS);
                    if let Value::Array(items) = document
                        .entry(section.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()))
                    {
                        items.push(Value::Object(record.clone()));
                    }
                }
            }
        }

        document.insert(UPDATED_AT_KEY.to_string(), updated_at);
        Value::Object(document)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tasks" => Ok(DocumentKind::Tasks),
            "status" | "task_status" => Ok(DocumentKind::Status),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown document '{}'",
                other
            ))),
        }
    }
}

fn objects(items: &[Value]) -> impl Iterator<Item = Record> + '_ {
    items.iter().filter_map(|item| item.as_object().cloned())
}

// == File I/O ==
/// Reads and parses a document. A missing file yields `Ok(None)`.
pub fn read_document(path: &Path) -> Result<Option<Value>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes a document atomically through a temp file and rename.
pub fn write_document(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(document)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, data)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
