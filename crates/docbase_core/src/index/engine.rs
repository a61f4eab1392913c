//! Index engine: materialization and maintenance of field indexes.

use crate::document::Document;
use crate::index::field::FieldIndex;
use crate::types::TenantId;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

type IndexKey = (TenantId, String, String);

/// Owns every materialized field index and keeps them current.
///
/// The engine is invisible to callers: the advisor decides what gets
/// materialized, the store routes mutations through [`apply_insert`],
/// [`apply_update`], and [`apply_delete`], and equality lookups consult
/// [`lookup_eq`] before falling back to a scan.
///
/// [`apply_insert`]: IndexEngine::apply_insert
/// [`apply_update`]: IndexEngine::apply_update
/// [`apply_delete`]: IndexEngine::apply_delete
/// [`lookup_eq`]: IndexEngine::lookup_eq
#[derive(Debug, Default)]
pub struct IndexEngine {
    indexes: RwLock<HashMap<IndexKey, FieldIndex>>,
}

impl IndexEngine {
    /// Creates an empty index engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes an index over `field`, backfilled from `docs`.
    ///
    /// Idempotent: if the index already exists this is a no-op and the
    /// existing index is left untouched.
    ///
    /// Returns true if a new index was created.
    pub fn ensure_index(
        &self,
        tenant: &TenantId,
        collection: &str,
        field: &str,
        docs: &[(String, Document)],
    ) -> bool {
        let key = (tenant.clone(), collection.to_string(), field.to_string());
        let mut indexes = self.indexes.write();
        if indexes.contains_key(&key) {
            return false;
        }

        let mut index = FieldIndex::new();
        for (doc_key, doc) in docs {
            if let Some(value) = doc.get(field) {
                index.insert(value, doc_key);
            }
        }
        indexes.insert(key, index);
        true
    }

    /// Returns true if an index exists on the field.
    #[must_use]
    pub fn has_index(&self, tenant: &TenantId, collection: &str, field: &str) -> bool {
        self.indexes.read().contains_key(&(
            tenant.clone(),
            collection.to_string(),
            field.to_string(),
        ))
    }

    /// Returns the total number of materialized indexes.
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indexes.read().len()
    }

    /// Looks up document keys by exact field value.
    ///
    /// Returns `None` when no index exists on the field, in which case
    /// the caller must scan.
    #[must_use]
    pub fn lookup_eq(
        &self,
        tenant: &TenantId,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Option<Vec<String>> {
        let indexes = self.indexes.read();
        let index = indexes.get(&(tenant.clone(), collection.to_string(), field.to_string()))?;
        Some(index.lookup(value))
    }

    /// Records a freshly inserted document in every index on its collection.
    pub fn apply_insert(&self, tenant: &TenantId, collection: &str, doc_key: &str, doc: &Document) {
        let mut indexes = self.indexes.write();
        for ((t, c, field), index) in indexes.iter_mut() {
            if t == tenant && c == collection {
                if let Some(value) = doc.get(field) {
                    index.insert(value, doc_key);
                }
            }
        }
    }

    /// Moves a document between index entries after an update.
    pub fn apply_update(
        &self,
        tenant: &TenantId,
        collection: &str,
        doc_key: &str,
        before: &Document,
        after: &Document,
    ) {
        let mut indexes = self.indexes.write();
        for ((t, c, field), index) in indexes.iter_mut() {
            if t == tenant && c == collection {
                if let Some(old) = before.get(field) {
                    index.remove(old, doc_key);
                }
                if let Some(new) = after.get(field) {
                    index.insert(new, doc_key);
                }
            }
        }
    }

    /// Removes a deleted document from every index on its collection.
    pub fn apply_delete(&self, tenant: &TenantId, collection: &str, doc_key: &str, doc: &Document) {
        let mut indexes = self.indexes.write();
        for ((t, c, field), index) in indexes.iter_mut() {
            if t == tenant && c == collection {
                if let Some(value) = doc.get(field) {
                    index.remove(value, doc_key);
                }
            }
        }
    }
}
