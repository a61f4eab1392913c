//! The multi-tenant document store.
//!
//! [`DocumentStore`] ties the engine together: tenant gating, schema
//! validation, storage reads and writes, advisor-driven indexing, audit
//! recording, and change-event publishing. Every operation is scoped to
//! one (tenant, collection) keyspace; tenants can never observe each
//! other's data.

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::config::EngineConfig;
use crate::document::{Document, SYSTEM_FIELDS};
use crate::error::{EngineError, EngineResult};
use crate::events::{ChangeEvent, ChangeType, EventPublisher};
use crate::index::{encode_index_value, IndexAdvisor, IndexEngine};
use crate::query::{values_equal, Filter, FilterOp, Query, Sort};
use crate::schema::{CollectionSchema, SchemaRegistry};
use crate::tenant::TenantRegistry;
use crate::types::{DocKey, TenantId};
use chrono::Utc;
use docbase_storage::{Keyspace, StorageBackend, StorageError, WriteMode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Options for a single insert.
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// Explicit document key. `None` generates one.
    pub key: Option<String>,
    /// Fields whose values must be unique within the collection.
    pub unique_fields: Vec<String>,
}

impl InsertOptions {
    /// Creates default options: generated key, no uniqueness constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit document key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Adds a unique-field constraint.
    #[must_use]
    pub fn unique(mut self, field: impl Into<String>) -> Self {
        self.unique_fields.push(field.into());
        self
    }
}

/// One failed document in a bulk insert.
#[derive(Debug, Clone)]
pub struct BulkError {
    /// Position of the document in the request.
    pub index: usize,
    /// Why the insert failed.
    pub message: String,
}

/// Outcome of a bulk insert.
///
/// Bulk inserts are not transactional: each document succeeds or fails
/// on its own and the result reports both sides.
#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    /// Number of documents stored.
    pub inserted: usize,
    /// Number of documents rejected.
    pub failed: usize,
    /// The stored documents, stamped, in request order.
    pub documents: Vec<Document>,
    /// Per-document failures, in request order.
    pub errors: Vec<BulkError>,
}

/// Aggregate engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Total stored documents across all tenants.
    pub documents: usize,
    /// Number of non-empty (tenant, collection) keyspaces.
    pub collections: usize,
    /// Number of materialized indexes.
    pub indexes: usize,
}

/// Multi-tenant JSON document store.
///
/// The store owns no I/O of its own: persistence goes through the
/// injected [`StorageBackend`], events through an optional
/// [`EventPublisher`], and audit records through an optional
/// [`AuditSink`]. Indexing is automatic; callers never declare indexes.
///
/// # Example
///
/// ```
/// use docbase_core::{DocumentStore, EngineConfig, InsertOptions, TenantId};
/// use docbase_storage::InMemoryBackend;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # fn main() -> docbase_core::EngineResult<()> {
/// let store = DocumentStore::new(Arc::new(InMemoryBackend::new()), EngineConfig::default());
/// let tenant = TenantId::new("acme");
///
/// let doc = store.insert(&tenant, "users", json!({"name": "ada"}), &InsertOptions::new())?;
/// assert!(doc.key().is_some());
/// # Ok(())
/// # }
/// ```
pub struct DocumentStore {
    backend: Arc<dyn StorageBackend>,
    config: EngineConfig,
    schemas: SchemaRegistry,
    tenants: TenantRegistry,
    indexes: IndexEngine,
    advisor: IndexAdvisor,
    events: Option<EventPublisher>,
    audit: Option<Arc<dyn AuditSink>>,
    write_guards: Mutex<HashMap<(TenantId, String), Arc<Mutex<()>>>>,
}

impl DocumentStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, config: EngineConfig) -> Self {
        let advisor = IndexAdvisor::new(config.max_indexed_fields);
        Self {
            backend,
            config,
            schemas: SchemaRegistry::new(),
            tenants: TenantRegistry::new(),
            indexes: IndexEngine::new(),
            advisor,
            events: None,
            audit: None,
            write_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Attaches a change-event publisher.
    #[must_use]
    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// Attaches an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the tenant registry.
    #[must_use]
    pub fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    /// Inserts a document.
    ///
    /// Stamps `_id`, `createdAt`, and `updatedAt`, validates against the
    /// collection schema if one is saved, and enforces the unique-field
    /// constraints in `options` under a per-collection write guard.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRequest` if `value` is not a JSON object,
    /// `Validation` on a schema violation, `UniqueConstraintViolation`
    /// or `DuplicateKey` on a conflict, and `TenantUnavailable` for a
    /// soft-deleted tenant.
    pub fn insert(
        &self,
        tenant: &TenantId,
        collection: &str,
        value: serde_json::Value,
        options: &InsertOptions,
    ) -> EngineResult<Document> {
        self.tenants.ensure_active(tenant)?;

        let mut document = Document::from_value(value)
            .ok_or_else(|| EngineError::malformed_request("document must be a JSON object"))?;
        if let Some(schema) = self.schemas.get(tenant, collection) {
            schema.validate(&document)?;
        }

        // The guard serializes uniqueness check and write, so two
        // concurrent inserts cannot both pass the same constraint.
        let guard = self.write_guard(tenant, collection);
        let _held = guard.lock();

        if !options.unique_fields.is_empty() {
            let existing = self.load_all(tenant, collection)?;
            for field in &options.unique_fields {
                if let Some(candidate) = document.get(field) {
                    let clash = existing
                        .iter()
                        .any(|(_, d)| d.get(field).is_some_and(|v| values_equal(v, candidate)));
                    if clash {
                        return Err(EngineError::unique_violation(field));
                    }
                }
            }
        }

        let key = match &options.key {
            Some(key) => DocKey::new(key.clone()),
            None => DocKey::generate(),
        };
        document.stamp_new(&key, Utc::now());

        let bytes = document.to_bytes()?;
        let keyspace = self.keyspace(tenant, collection);
        match self
            .backend
            .put(&keyspace, key.as_str(), &bytes, WriteMode::Insert)
        {
            Ok(()) => {}
            Err(StorageError::KeyExists { key }) => return Err(EngineError::duplicate_key(key)),
            Err(other) => return Err(other.into()),
        }

        self.indexes
            .apply_insert(tenant, collection, key.as_str(), &document);
        self.record_audit(tenant, collection, AuditAction::Create, Some(key.to_string()));
        self.publish_change(tenant, ChangeType::Insert, collection, &document);

        Ok(document)
    }

    /// Inserts many documents, continuing past individual failures.
    ///
    /// # Errors
    ///
    /// Returns `TenantUnavailable` for a soft-deleted tenant; every
    /// other failure is reported per document in the result.
    pub fn insert_bulk(
        &self,
        tenant: &TenantId,
        collection: &str,
        values: Vec<serde_json::Value>,
        options: &InsertOptions,
    ) -> EngineResult<BulkResult> {
        self.tenants.ensure_active(tenant)?;

        let mut result = BulkResult::default();
        for (index, value) in values.into_iter().enumerate() {
            // Explicit keys cannot apply across a batch.
            let per_doc = InsertOptions {
                key: None,
                unique_fields: options.unique_fields.clone(),
            };
            match self.insert(tenant, collection, value, &per_doc) {
                Ok(document) => {
                    result.inserted += 1;
                    result.documents.push(document);
                }
                Err(error) => {
                    result.failed += 1;
                    result.errors.push(BulkError {
                        index,
                        message: error.to_string(),
                    });
                }
            }
        }
        Ok(result)
    }

    /// Fetches one document by key.
    ///
    /// With `select`, the result is projected onto the requested fields;
    /// system fields are added back when the engine is configured to
    /// include them.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist and
    /// `TenantUnavailable` for a soft-deleted tenant.
    pub fn get(
        &self,
        tenant: &TenantId,
        collection: &str,
        key: &str,
        select: Option<&[String]>,
    ) -> EngineResult<Document> {
        self.tenants.ensure_active(tenant)?;

        let keyspace = self.keyspace(tenant, collection);
        let bytes = self
            .backend
            .get(&keyspace, key)?
            .ok_or_else(|| EngineError::not_found(collection, key))?;
        let document = Document::from_bytes(&bytes)?;

        self.record_audit(tenant, collection, AuditAction::Read, Some(key.to_string()));

        match select {
            Some(fields) => Ok(self.project(&document, fields)),
            None => Ok(document),
        }
    }

    /// Runs a filtered, sorted, paginated query.
    ///
    /// Filter and sort fields feed the index advisor; an equality filter
    /// over an indexed field resolves through the index instead of a
    /// collection scan. Results default to newest first and the
    /// configured page size.
    ///
    /// # Errors
    ///
    /// Returns `TenantUnavailable` for a soft-deleted tenant and
    /// storage or codec errors from the scan.
    pub fn find(
        &self,
        tenant: &TenantId,
        collection: &str,
        query: &Query,
    ) -> EngineResult<Vec<Document>> {
        self.tenants.ensure_active(tenant)?;
        self.observe_usage(tenant, collection, query);

        let mut documents = self.candidates(tenant, collection, query)?;
        documents.retain(|d| query.matches(d));

        let sort = query.sort.clone().unwrap_or_else(Sort::default_newest_first);
        documents.sort_by(|a, b| sort.compare(a, b));

        let limit = query.limit.unwrap_or(self.config.default_limit);
        let documents: Vec<Document> = documents.into_iter().skip(query.offset).take(limit).collect();

        self.record_audit(tenant, collection, AuditAction::Read, None);
        Ok(documents)
    }

    /// Counts documents matching the filters.
    ///
    /// # Errors
    ///
    /// Returns `TenantUnavailable` for a soft-deleted tenant and
    /// storage or codec errors from the scan.
    pub fn count(
        &self,
        tenant: &TenantId,
        collection: &str,
        filters: &[Filter],
    ) -> EngineResult<usize> {
        self.tenants.ensure_active(tenant)?;

        for filter in filters {
            if self.advisor.observe(tenant, collection, &filter.field) {
                self.materialize_index(tenant, collection, &filter.field);
            }
        }

        let documents = self.load_all(tenant, collection)?;
        let count = documents
            .iter()
            .filter(|(_, d)| filters.iter().all(|f| f.matches(d)))
            .count();

        self.record_audit(tenant, collection, AuditAction::Read, None);
        Ok(count)
    }

    /// Applies a merge patch to a document.
    ///
    /// Patch fields replace stored values; `{"increment": n}` and
    /// `{"decrement": n}` adjust numerics; system fields in the patch
    /// are ignored. The result is revalidated against the collection
    /// schema and `updatedAt` is refreshed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist, `MalformedRequest`
    /// if `patch` is not a JSON object, `Validation` if the patched
    /// document violates the schema, and `TenantUnavailable` for a
    /// soft-deleted tenant.
    pub fn update(
        &self,
        tenant: &TenantId,
        collection: &str,
        key: &str,
        patch: serde_json::Value,
    ) -> EngineResult<Document> {
        self.tenants.ensure_active(tenant)?;

        let patch = Document::from_value(patch)
            .ok_or_else(|| EngineError::malformed_request("patch must be a JSON object"))?;

        let guard = self.write_guard(tenant, collection);
        let _held = guard.lock();

        let keyspace = self.keyspace(tenant, collection);
        let bytes = self
            .backend
            .get(&keyspace, key)?
            .ok_or_else(|| EngineError::not_found(collection, key))?;
        let before = Document::from_bytes(&bytes)?;

        let mut after = before.clone();
        after.apply_patch(&patch);
        if let Some(schema) = self.schemas.get(tenant, collection) {
            schema.validate(&after)?;
        }
        after.touch(Utc::now());

        let bytes = after.to_bytes()?;
        self.backend
            .put(&keyspace, key, &bytes, WriteMode::Upsert)?;

        self.indexes
            .apply_update(tenant, collection, key, &before, &after);
        self.record_audit(tenant, collection, AuditAction::Update, Some(key.to_string()));
        self.publish_change(tenant, ChangeType::Update, collection, &after);

        Ok(after)
    }

    /// Deletes a document and returns it as it was stored.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist and
    /// `TenantUnavailable` for a soft-deleted tenant.
    pub fn delete(&self, tenant: &TenantId, collection: &str, key: &str) -> EngineResult<Document> {
        self.tenants.ensure_active(tenant)?;

        let guard = self.write_guard(tenant, collection);
        let _held = guard.lock();

        let keyspace = self.keyspace(tenant, collection);
        let bytes = self
            .backend
            .delete(&keyspace, key)?
            .ok_or_else(|| EngineError::not_found(collection, key))?;
        let document = Document::from_bytes(&bytes)?;

        self.indexes
            .apply_delete(tenant, collection, key, &document);
        self.record_audit(tenant, collection, AuditAction::Delete, Some(key.to_string()));
        self.publish_change(tenant, ChangeType::Delete, collection, &document);

        Ok(document)
    }

    /// Saves the schema for a collection, replacing any existing one.
    ///
    /// The schema constrains future writes only; stored documents are
    /// not revalidated.
    ///
    /// # Errors
    ///
    /// Returns `TenantUnavailable` for a soft-deleted tenant.
    pub fn set_schema(
        &self,
        tenant: &TenantId,
        collection: &str,
        schema: CollectionSchema,
    ) -> EngineResult<()> {
        self.tenants.ensure_active(tenant)?;
        self.schemas.save(tenant, collection, schema);
        Ok(())
    }

    /// Returns the saved schema for a collection, if any.
    #[must_use]
    pub fn schema(&self, tenant: &TenantId, collection: &str) -> Option<CollectionSchema> {
        self.schemas.get(tenant, collection)
    }

    /// Lists the tenant's non-empty collections, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `TenantUnavailable` for a soft-deleted tenant.
    pub fn list_collections(&self, tenant: &TenantId) -> EngineResult<Vec<String>> {
        self.tenants.ensure_active(tenant)?;

        let mut collections: Vec<String> = self
            .backend
            .keyspaces()?
            .into_iter()
            .filter(|ks| ks.tenant == tenant.as_str())
            .map(|ks| ks.collection)
            .collect();
        collections.sort();
        collections.dedup();
        Ok(collections)
    }

    /// Returns aggregate engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let keyspaces = self.backend.keyspaces().unwrap_or_default();
        let documents: usize = keyspaces
            .iter()
            .map(|ks| self.backend.count(ks).unwrap_or_default())
            .sum();
        EngineStats {
            documents,
            collections: keyspaces.len(),
            indexes: self.indexes.index_count(),
        }
    }

    fn keyspace(&self, tenant: &TenantId, collection: &str) -> Keyspace {
        Keyspace::new(tenant.as_str(), collection)
    }

    fn write_guard(&self, tenant: &TenantId, collection: &str) -> Arc<Mutex<()>> {
        let mut guards = self.write_guards.lock();
        guards
            .entry((tenant.clone(), collection.to_string()))
            .or_default()
            .clone()
    }

    fn load_all(&self, tenant: &TenantId, collection: &str) -> EngineResult<Vec<(String, Document)>> {
        let keyspace = self.keyspace(tenant, collection);
        let mut documents = Vec::new();
        for (key, bytes) in self.backend.scan(&keyspace)? {
            documents.push((key, Document::from_bytes(&bytes)?));
        }
        Ok(documents)
    }

    fn project(&self, document: &Document, select: &[String]) -> Document {
        let mut projected = document.project(select);
        if self.config.select_includes_system_fields {
            for field in SYSTEM_FIELDS {
                if let Some(value) = document.get(field) {
                    projected.set(field, value.clone());
                }
            }
        }
        projected
    }

    fn observe_usage(&self, tenant: &TenantId, collection: &str, query: &Query) {
        let fields = query
            .filters
            .iter()
            .map(|f| f.field.as_str())
            .chain(query.sort.iter().map(|s| s.field.as_str()));
        for field in fields {
            if self.advisor.observe(tenant, collection, field) {
                self.materialize_index(tenant, collection, field);
            }
        }
    }

    /// Best-effort index materialization; never fails the request.
    fn materialize_index(&self, tenant: &TenantId, collection: &str, field: &str) {
        let documents = match self.load_all(tenant, collection) {
            Ok(documents) => documents,
            Err(error) => {
                tracing::warn!(
                    tenant = %tenant,
                    collection,
                    field,
                    %error,
                    "index backfill scan failed"
                );
                return;
            }
        };
        self.indexes.ensure_index(tenant, collection, field, &documents);
        self.advisor.mark_indexed(tenant, collection, field);
    }

    /// Finds candidate documents, through an index when one applies.
    fn candidates(
        &self,
        tenant: &TenantId,
        collection: &str,
        query: &Query,
    ) -> EngineResult<Vec<Document>> {
        for filter in &query.filters {
            if filter.op != FilterOp::Eq || encode_index_value(&filter.value).is_none() {
                continue;
            }
            let Some(keys) = self
                .indexes
                .lookup_eq(tenant, collection, &filter.field, &filter.value)
            else {
                continue;
            };

            let keyspace = self.keyspace(tenant, collection);
            let mut documents = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(bytes) = self.backend.get(&keyspace, &key)? {
                    documents.push(Document::from_bytes(&bytes)?);
                }
            }
            return Ok(documents);
        }

        Ok(self
            .load_all(tenant, collection)?
            .into_iter()
            .map(|(_, d)| d)
            .collect())
    }

    /// Best-effort audit recording; never fails the request.
    fn record_audit(
        &self,
        tenant: &TenantId,
        collection: &str,
        action: AuditAction,
        doc_id: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            let event = AuditEvent::new(tenant, collection, action, doc_id);
            if let Err(error) = sink.record(event) {
                tracing::warn!(%error, "audit sink rejected event");
            }
        }
    }

    fn publish_change(
        &self,
        tenant: &TenantId,
        change_type: ChangeType,
        collection: &str,
        document: &Document,
    ) {
        if let Some(events) = &self.events {
            let event = ChangeEvent::new(change_type, collection, document.clone().into_value());
            events.publish(tenant, &event);
        }
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::events::InProcessBus;
    use crate::schema::{FieldSpec, FieldType};
    use docbase_storage::InMemoryBackend;
    use serde_json::json;

    fn store() -> DocumentStore {
        DocumentStore::new(Arc::new(InMemoryBackend::new()), EngineConfig::default())
    }

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    #[test]
    fn insert_stamps_and_persists() {
        let store = store();
        let doc = store
            .insert(&tenant(), "users", json!({"name": "ada"}), &InsertOptions::new())
            .unwrap();

        let key = doc.key().unwrap();
        assert_eq!(key.len(), 32);
        assert!(doc.has("createdAt"));
        assert!(doc.has("updatedAt"));

        let fetched = store.get(&tenant(), "users", key, None).unwrap();
        assert_eq!(fetched, doc);
    }

    #[test]
    fn insert_with_explicit_key() {
        let store = store();
        let doc = store
            .insert(
                &tenant(),
                "users",
                json!({"name": "ada"}),
                &InsertOptions::new().key("ada-1"),
            )
            .unwrap();
        assert_eq!(doc.key(), Some("ada-1"));

        let err = store
            .insert(
                &tenant(),
                "users",
                json!({"name": "grace"}),
                &InsertOptions::new().key("ada-1"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateKey { .. }));
    }

    #[test]
    fn insert_rejects_non_object() {
        let store = store();
        let err = store
            .insert(&tenant(), "users", json!([1, 2]), &InsertOptions::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedRequest { .. }));
    }

    #[test]
    fn schema_gates_insert_and_update() {
        let store = store();
        let schema = CollectionSchema::new()
            .field("name", FieldSpec::required(FieldType::String))
            .field("age", FieldSpec::optional(FieldType::Number));
        store.set_schema(&tenant(), "users", schema).unwrap();

        let err = store
            .insert(&tenant(), "users", json!({"age": 36}), &InsertOptions::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let doc = store
            .insert(
                &tenant(),
                "users",
                json!({"name": "ada", "age": 36}),
                &InsertOptions::new(),
            )
            .unwrap();

        let err = store
            .update(&tenant(), "users", doc.key().unwrap(), json!({"age": "old"}))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn unique_fields_reject_duplicates() {
        let store = store();
        let options = InsertOptions::new().unique("email");

        store
            .insert(&tenant(), "users", json!({"email": "ada@acme.test"}), &options)
            .unwrap();
        let err = store
            .insert(&tenant(), "users", json!({"email": "ada@acme.test"}), &options)
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::UniqueConstraintViolation { ref field } if field == "email"
        ));
    }

    #[test]
    fn unique_fields_are_tenant_scoped() {
        let store = store();
        let options = InsertOptions::new().unique("email");

        store
            .insert(&tenant(), "users", json!({"email": "ada@acme.test"}), &options)
            .unwrap();
        store
            .insert(
                &TenantId::new("globex"),
                "users",
                json!({"email": "ada@acme.test"}),
                &options,
            )
            .unwrap();
    }

    #[test]
    fn soft_deleted_tenant_is_refused() {
        let store = store();
        store
            .insert(&tenant(), "users", json!({"name": "ada"}), &InsertOptions::new())
            .unwrap();
        store.tenants().mark_deleted(&tenant());

        let err = store
            .insert(&tenant(), "users", json!({"name": "grace"}), &InsertOptions::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::TenantUnavailable { .. }));
        assert!(store.get(&tenant(), "users", "any", None).is_err());

        store.tenants().restore(&tenant());
        assert_eq!(store.count(&tenant(), "users", &[]).unwrap(), 1);
    }

    #[test]
    fn get_with_select_projects() {
        let store = store();
        let doc = store
            .insert(
                &tenant(),
                "users",
                json!({"name": "ada", "age": 36, "role": "admin"}),
                &InsertOptions::new(),
            )
            .unwrap();
        let key = doc.key().unwrap();

        let projected = store
            .get(&tenant(), "users", key, Some(&["name".to_string()]))
            .unwrap();
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("name"), Some(&json!("ada")));
        assert!(projected.key().is_none());
    }

    #[test]
    fn select_can_include_system_fields() {
        let config = EngineConfig::default().select_includes_system_fields(true);
        let store = DocumentStore::new(Arc::new(InMemoryBackend::new()), config);
        let doc = store
            .insert(&tenant(), "users", json!({"name": "ada"}), &InsertOptions::new())
            .unwrap();
        let key = doc.key().unwrap();

        let projected = store
            .get(&tenant(), "users", key, Some(&["name".to_string()]))
            .unwrap();
        assert_eq!(projected.key(), Some(key));
        assert!(projected.has("createdAt"));
    }

    #[test]
    fn get_missing_key_is_not_found() {
        let store = store();
        let err = store.get(&tenant(), "users", "nope", None).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn find_defaults_to_newest_first_with_limit() {
        let store = store();
        for name in ["first", "second", "third"] {
            store
                .insert(&tenant(), "users", json!({"name": name}), &InsertOptions::new())
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let results = store.find(&tenant(), "users", &Query::new()).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].get("name"), Some(&json!("third")));
        assert_eq!(results[2].get("name"), Some(&json!("first")));

        let page = store
            .find(&tenant(), "users", &Query::new().limit(1).offset(1))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].get("name"), Some(&json!("second")));
    }

    #[test]
    fn find_filters_and_sorts() {
        let store = store();
        for (name, age) in [("ada", 36), ("grace", 45), ("mira", 29)] {
            store
                .insert(
                    &tenant(),
                    "users",
                    json!({"name": name, "age": age}),
                    &InsertOptions::new(),
                )
                .unwrap();
        }

        let query = Query::new()
            .filter(Filter::new("age", FilterOp::Gte, json!(30)))
            .sort(Sort::ascending("age"));
        let results = store.find(&tenant(), "users", &query).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get("name"), Some(&json!("ada")));
        assert_eq!(results[1].get("name"), Some(&json!("grace")));
    }

    #[test]
    fn repeated_filtering_materializes_an_index() {
        let store = store();
        for (name, role) in [("ada", "admin"), ("grace", "viewer")] {
            store
                .insert(
                    &tenant(),
                    "users",
                    json!({"name": name, "role": role}),
                    &InsertOptions::new(),
                )
                .unwrap();
        }
        assert_eq!(store.stats().indexes, 0);

        let query = Query::new().filter(Filter::eq("role", json!("admin")));
        let first = store.find(&tenant(), "users", &query).unwrap();
        assert_eq!(store.stats().indexes, 1);

        // Indexed path returns the same result as the scan did.
        let second = store.find(&tenant(), "users", &query).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].get("name"), Some(&json!("ada")));
    }

    #[test]
    fn index_stays_current_across_mutations() {
        let store = store();
        let query = Query::new().filter(Filter::eq("role", json!("admin")));
        store.find(&tenant(), "users", &query).unwrap();
        assert_eq!(store.stats().indexes, 1);

        let doc = store
            .insert(&tenant(), "users", json!({"role": "admin"}), &InsertOptions::new())
            .unwrap();
        assert_eq!(store.find(&tenant(), "users", &query).unwrap().len(), 1);

        store
            .update(&tenant(), "users", doc.key().unwrap(), json!({"role": "viewer"}))
            .unwrap();
        assert!(store.find(&tenant(), "users", &query).unwrap().is_empty());

        store.delete(&tenant(), "users", doc.key().unwrap()).unwrap();
        assert!(store.find(&tenant(), "users", &query).unwrap().is_empty());
    }

    #[test]
    fn unsafe_filter_fields_never_materialize() {
        let store = store();
        let query = Query::new().filter(Filter::eq("a.b", json!(1)));
        store.find(&tenant(), "users", &query).unwrap();

        assert_eq!(store.stats().indexes, 0);
    }

    #[test]
    fn count_applies_filters() {
        let store = store();
        for age in [20, 30, 40] {
            store
                .insert(&tenant(), "users", json!({"age": age}), &InsertOptions::new())
                .unwrap();
        }

        assert_eq!(store.count(&tenant(), "users", &[]).unwrap(), 3);
        assert_eq!(
            store
                .count(
                    &tenant(),
                    "users",
                    &[Filter::new("age", FilterOp::Gt, json!(25))]
                )
                .unwrap(),
            2
        );
    }

    #[test]
    fn update_merges_and_touches() {
        let store = store();
        let doc = store
            .insert(
                &tenant(),
                "users",
                json!({"name": "ada", "visits": 1}),
                &InsertOptions::new(),
            )
            .unwrap();
        let key = doc.key().unwrap().to_string();

        std::thread::sleep(std::time::Duration::from_millis(2));
        let updated = store
            .update(
                &tenant(),
                "users",
                &key,
                json!({"visits": {"increment": 4}, "role": "admin", "_id": "forged"}),
            )
            .unwrap();

        assert_eq!(updated.key(), Some(key.as_str()));
        assert_eq!(updated.get("visits"), Some(&json!(5)));
        assert_eq!(updated.get("role"), Some(&json!("admin")));
        assert_eq!(updated.get("name"), Some(&json!("ada")));
        assert_eq!(updated.get("createdAt"), doc.get("createdAt"));
        assert_ne!(updated.get("updatedAt"), doc.get("updatedAt"));
    }

    #[test]
    fn increment_creates_absent_fields_from_zero() {
        let store = store();
        store
            .insert(&tenant(), "counters", json!({}), &InsertOptions::new().key("c1"))
            .unwrap();

        let once = store
            .update(&tenant(), "counters", "c1", json!({"hits": {"increment": 5}}))
            .unwrap();
        assert_eq!(once.get("hits"), Some(&json!(5)));

        let twice = store
            .update(&tenant(), "counters", "c1", json!({"hits": {"increment": 3}}))
            .unwrap();
        assert_eq!(twice.get("hits"), Some(&json!(8)));
    }

    #[test]
    fn index_cap_stops_new_indexes_but_not_queries() {
        let config = EngineConfig::default().max_indexed_fields(1);
        let store = DocumentStore::new(Arc::new(InMemoryBackend::new()), config);
        for seq in 0..4 {
            store
                .insert(
                    &tenant(),
                    "events",
                    json!({"kind": "audit", "seq": seq}),
                    &InsertOptions::new(),
                )
                .unwrap();
        }

        let by_kind = Query::new().filter(Filter::eq("kind", json!("audit")));
        store.find(&tenant(), "events", &by_kind).unwrap();
        assert_eq!(store.stats().indexes, 1);

        let by_seq = Query::new().filter(Filter::eq("seq", json!(2)));
        for _ in 0..3 {
            let hits = store.find(&tenant(), "events", &by_seq).unwrap();
            assert_eq!(hits.len(), 1);
        }
        assert_eq!(store.stats().indexes, 1);
    }

    #[test]
    fn update_missing_key_is_not_found() {
        let store = store();
        let err = store
            .update(&tenant(), "users", "nope", json!({"a": 1}))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn delete_returns_stored_document() {
        let store = store();
        let doc = store
            .insert(&tenant(), "users", json!({"name": "ada"}), &InsertOptions::new())
            .unwrap();
        let key = doc.key().unwrap().to_string();

        let removed = store.delete(&tenant(), "users", &key).unwrap();
        assert_eq!(removed, doc);

        let err = store.get(&tenant(), "users", &key, None).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn bulk_insert_reports_both_sides() {
        let store = store();
        let schema =
            CollectionSchema::new().field("name", FieldSpec::required(FieldType::String));
        store.set_schema(&tenant(), "users", schema).unwrap();

        let result = store
            .insert_bulk(
                &tenant(),
                "users",
                vec![
                    json!({"name": "ada"}),
                    json!({"age": 36}),
                    json!({"name": "grace"}),
                ],
                &InsertOptions::new(),
            )
            .unwrap();

        assert_eq!(result.inserted, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].index, 1);
        assert_eq!(store.count(&tenant(), "users", &[]).unwrap(), 2);
    }

    #[test]
    fn audit_trail_records_data_access() {
        let sink = Arc::new(MemoryAuditSink::new());
        let store = DocumentStore::new(Arc::new(InMemoryBackend::new()), EngineConfig::default())
            .with_audit(sink.clone());

        let doc = store
            .insert(&tenant(), "users", json!({"name": "ada"}), &InsertOptions::new())
            .unwrap();
        let key = doc.key().unwrap().to_string();
        store.get(&tenant(), "users", &key, None).unwrap();
        store
            .update(&tenant(), "users", &key, json!({"name": "grace"}))
            .unwrap();
        store.delete(&tenant(), "users", &key).unwrap();

        let actions: Vec<AuditAction> = sink.events().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Create,
                AuditAction::Read,
                AuditAction::Update,
                AuditAction::Delete
            ]
        );
        assert!(sink.events().iter().all(|e| e.doc_id.as_deref() == Some(key.as_str())));
    }

    #[tokio::test]
    async fn mutations_publish_change_events() {
        let bus = Arc::new(InProcessBus::new(16));
        let mut subscription = bus.subscribe();
        let publisher = EventPublisher::new("docbase", bus, 16);
        let store = DocumentStore::new(Arc::new(InMemoryBackend::new()), EngineConfig::default())
            .with_events(publisher);

        let doc = store
            .insert(&tenant(), "users", json!({"name": "ada"}), &InsertOptions::new())
            .unwrap();
        let key = doc.key().unwrap().to_string();
        store.delete(&tenant(), "users", &key).unwrap();

        let first = subscription.recv().await.unwrap();
        assert_eq!(first.channel, "docbase:acme:users");
        let event: ChangeEvent = serde_json::from_slice(&first.payload).unwrap();
        assert_eq!(event.change_type, ChangeType::Insert);

        let second = subscription.recv().await.unwrap();
        let event: ChangeEvent = serde_json::from_slice(&second.payload).unwrap();
        assert_eq!(event.change_type, ChangeType::Delete);
        assert_eq!(event.data.get("_id"), Some(&json!(key)));

        // A failed mutation never reaches the bus.
        assert!(store.delete(&tenant(), "users", "missing").is_err());
        assert!(subscription.try_recv().is_err());
    }

    #[test]
    fn list_collections_is_sorted_and_tenant_scoped() {
        let store = store();
        store
            .insert(&tenant(), "orders", json!({"total": 9}), &InsertOptions::new())
            .unwrap();
        store
            .insert(&tenant(), "users", json!({"name": "ada"}), &InsertOptions::new())
            .unwrap();
        store
            .insert(
                &TenantId::new("globex"),
                "invoices",
                json!({"total": 1}),
                &InsertOptions::new(),
            )
            .unwrap();

        assert_eq!(
            store.list_collections(&tenant()).unwrap(),
            vec!["orders", "users"]
        );
    }

    #[test]
    fn documents_survive_backend_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = Arc::new(docbase_storage::LogBackend::open(dir.path()).unwrap());
            let store = DocumentStore::new(backend, EngineConfig::default());
            store
                .insert(
                    &tenant(),
                    "users",
                    json!({"name": "ada"}),
                    &InsertOptions::new().key("u1"),
                )
                .unwrap();
        }

        let backend = Arc::new(docbase_storage::LogBackend::open(dir.path()).unwrap());
        let store = DocumentStore::new(backend, EngineConfig::default());
        let doc = store.get(&tenant(), "users", "u1", None).unwrap();
        assert_eq!(doc.get("name"), Some(&json!("ada")));
    }

    #[test]
    fn stats_counts_documents_and_collections() {
        let store = store();
        store
            .insert(&tenant(), "users", json!({"a": 1}), &InsertOptions::new())
            .unwrap();
        store
            .insert(&tenant(), "users", json!({"a": 2}), &InsertOptions::new())
            .unwrap();
        store
            .insert(&tenant(), "orders", json!({"a": 3}), &InsertOptions::new())
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.collections, 2);
    }
}
