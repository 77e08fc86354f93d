//! Structural diff between two documents.

use crate::{Document, Record, RecordKey, DEFAULT_ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Summary of the transition from one document to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// Records whose identifier only exists in the newer document.
    pub added: usize,
    /// Records whose identifier only exists in the older document.
    pub removed: usize,
    /// Identifiers present in both whose records differ.
    pub changed: usize,
    /// Per field, the number of changed records in which it differs.
    pub fields: BTreeMap<String, usize>,
}

impl Diff {
    /// Whether the two documents were equivalent.
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.changed == 0
    }
}

/// Computes [`Diff`]s, keying records by a configurable identifier field.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    id_field: String,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ID_FIELD)
    }
}

impl DiffEngine {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Diff `current` against `previous`.
    ///
    /// With no previous document (the oldest snapshot of a listing) the diff
    /// is all zeros. When a document repeats an identifier the last record
    /// carrying it wins the lookup.
    pub fn diff(&self, previous: Option<&Document>, current: &Document) -> Diff {
        let Some(previous) = previous else {
            return Diff::default();
        };

        let prev_by_id = self.index(previous);
        let curr_by_id = self.index(current);

        let added = current
            .records()
            .iter()
            .filter(|r| !prev_by_id.contains_key(&r.key(&self.id_field)))
            .count();
        let removed = previous
            .records()
            .iter()
            .filter(|r| !curr_by_id.contains_key(&r.key(&self.id_field)))
            .count();

        let mut diff = Diff {
            added,
            removed,
            ..Diff::default()
        };

        for (key, curr) in &curr_by_id {
            let Some(prev) = prev_by_id.get(key) else {
                continue;
            };
            if same_map(prev.as_map(), curr.as_map()) {
                continue;
            }

            diff.changed += 1;
            let names: BTreeSet<&String> = curr.field_names().chain(prev.field_names()).collect();
            for name in names {
                if !same_field(curr.get(name), prev.get(name)) {
                    *diff.fields.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }

        diff
    }

    fn index<'a>(&self, document: &'a Document) -> HashMap<RecordKey, &'a Record> {
        document
            .records()
            .iter()
            .map(|r| (r.key(&self.id_field), r))
            .collect()
    }
}

/// Absent and `null` differ; present values compare with [`same_value`].
fn same_field(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_value(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Deep equality where numbers compare by value, so `0` equals `0.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y || x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(x), Value::Object(y)) => same_map(x, y),
        _ => a == b,
    }
}

fn same_map(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| same_value(value, other)))
}
