//! Index advisor: usage counting and materialization decisions.

use crate::types::TenantId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Returns true if `field` is a plain identifier safe to index.
///
/// The gate admits `[A-Za-z_][A-Za-z0-9_]*` and nothing else, keeping
/// path expressions, operator syntax, and injection attempts out of the
/// index layer.
#[must_use]
pub fn is_safe_identifier(field: &str) -> bool {
    let mut chars = field.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Watches query field usage and decides when to materialize indexes.
///
/// Every filtered or sorted field feeds [`observe`]. Unsafe identifiers
/// are rejected silently. Usage counters grow without bound; the set of
/// indexed fields per collection is insertion-ordered, capped, and never
/// shrinks.
///
/// [`observe`]: IndexAdvisor::observe
#[derive(Debug)]
pub struct IndexAdvisor {
    counters: RwLock<HashMap<(TenantId, String, String), u64>>,
    indexed: RwLock<HashMap<(TenantId, String), Vec<String>>>,
    max_indexed_fields: usize,
}

impl IndexAdvisor {
    /// Creates an advisor with the given per-collection index cap.
    #[must_use]
    pub fn new(max_indexed_fields: usize) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            indexed: RwLock::new(HashMap::new()),
            max_indexed_fields,
        }
    }

    /// Records one use of `field` in a query against the collection.
    ///
    /// Returns true if the caller should materialize an index for the
    /// field now. The decision is read-then-act: under concurrency the
    /// cap can overshoot slightly, which is tolerated.
    pub fn observe(&self, tenant: &TenantId, collection: &str, field: &str) -> bool {
        if !is_safe_identifier(field) {
            return false;
        }

        {
            let mut counters = self.counters.write();
            let counter = counters
                .entry((
                    tenant.clone(),
                    collection.to_string(),
                    field.to_string(),
                ))
                .or_insert(0);
            *counter += 1;
        }

        let indexed = self.indexed.read();
        match indexed.get(&(tenant.clone(), collection.to_string())) {
            Some(fields) => {
                !fields.iter().any(|f| f == field) && fields.len() < self.max_indexed_fields
            }
            None => self.max_indexed_fields > 0,
        }
    }

    /// Records that an index on `field` was materialized.
    pub fn mark_indexed(&self, tenant: &TenantId, collection: &str, field: &str) {
        let mut indexed = self.indexed.write();
        let fields = indexed
            .entry((tenant.clone(), collection.to_string()))
            .or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    /// Returns the usage counter for a field.
    #[must_use]
    pub fn usage_count(&self, tenant: &TenantId, collection: &str, field: &str) -> u64 {
        self.counters
            .read()
            .get(&(
                tenant.clone(),
                collection.to_string(),
                field.to_string(),
            ))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the indexed fields for a collection, in materialization order.
    #[must_use]
    pub fn indexed_fields(&self, tenant: &TenantId, collection: &str) -> Vec<String> {
        self.indexed
            .read()
            .get(&(tenant.clone(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
