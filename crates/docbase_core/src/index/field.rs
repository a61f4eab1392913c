//! Single-field index over encoded scalar values.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Encodes a JSON value into its index key form.
///
/// Only scalar values are indexable. Numbers are normalized through
/// `f64` so that `5` and `5.0` share one index entry, matching the
/// engine's coercing equality.
#[must_use]
pub fn encode_index_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("s:{s}")),
        Value::Number(_) => value.as_f64().map(|n| format!("n:{n}")),
        Value::Bool(b) => Some(format!("b:{b}")),
        _ => None,
    }
}

/// An ordered index from encoded field values to document keys.
///
/// One `FieldIndex` covers one field of one (tenant, collection).
#[derive(Debug, Default)]
pub struct FieldIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl FieldIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document key under a field value.
    ///
    /// Non-scalar values are not indexed and are silently skipped.
    pub fn insert(&mut self, value: &Value, doc_key: &str) {
        if let Some(encoded) = encode_index_value(value) {
            self.entries
                .entry(encoded)
                .or_default()
                .insert(doc_key.to_string());
        }
    }

    /// Removes a document key from under a field value.
    pub fn remove(&mut self, value: &Value, doc_key: &str) {
        if let Some(encoded) = encode_index_value(value) {
            if let Some(keys) = self.entries.get_mut(&encoded) {
                keys.remove(doc_key);
                if keys.is_empty() {
                    self.entries.remove(&encoded);
                }
            }
        }
    }

    /// Returns the document keys stored under a field value, in order.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Vec<String> {
        encode_index_value(value)
            .and_then(|encoded| self.entries.get(&encoded))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of distinct indexed values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
