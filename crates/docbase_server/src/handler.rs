//! Request handling for document operations.
//!
//! The handler sits between a routing shell and the engine. Each
//! method takes the already-extracted pieces of a request (tenant,
//! collection, body, query parameters) and returns engine data or a
//! classified [`ServerError`](crate::ServerError). HTTP framing,
//! content negotiation, and response encoding stay in the shell.

use crate::error::{ServerError, ServerResult};
use crate::query::{parse_filters, parse_json_filters, parse_query, parse_select};
use docbase_core::{
    BulkResult, CollectionSchema, Document, DocumentStore, EngineStats, InsertOptions, TenantId,
};
use serde_json::Value;
use std::sync::Arc;

/// Stateless request handler over a shared document store.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    store: Arc<DocumentStore>,
}

impl RequestHandler {
    /// Creates a handler over the given store.
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Inserts a document.
    ///
    /// Recognized parameters: `key` fixes the document key, `unique`
    /// names comma-separated fields that must not collide with stored
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns the engine's classification for malformed bodies,
    /// schema violations, and key or uniqueness conflicts.
    pub fn insert(
        &self,
        tenant: &TenantId,
        collection: &str,
        body: Value,
        params: &[(String, String)],
    ) -> ServerResult<Document> {
        let options = insert_options(params);
        Ok(self.store.insert(tenant, collection, body, &options)?)
    }

    /// Inserts a batch of documents, reporting per-document outcomes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the body is not a JSON array.
    /// Individual document failures are carried in the result, not
    /// returned as errors.
    pub fn insert_bulk(
        &self,
        tenant: &TenantId,
        collection: &str,
        body: Value,
        params: &[(String, String)],
    ) -> ServerResult<BulkResult> {
        let Value::Array(values) = body else {
            return Err(ServerError::invalid_request("bulk insert expects a JSON array"));
        };
        let options = insert_options(params);
        Ok(self.store.insert_bulk(tenant, collection, values, &options)?)
    }

    /// Fetches a document by key.
    ///
    /// A `select` parameter projects the result to the named fields.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` via the engine if the key does not exist.
    pub fn get(
        &self,
        tenant: &TenantId,
        collection: &str,
        key: &str,
        params: &[(String, String)],
    ) -> ServerResult<Document> {
        let select = select_fields(params);
        Ok(self.store.get(tenant, collection, key, select.as_deref())?)
    }

    /// Runs a filtered, sorted, paginated find.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an unparseable query grammar and
    /// engine errors from the scan.
    pub fn find(
        &self,
        tenant: &TenantId,
        collection: &str,
        params: &[(String, String)],
    ) -> ServerResult<Vec<Document>> {
        let query = parse_query(params)?;
        Ok(self.store.find(tenant, collection, &query)?)
    }

    /// Counts documents matching the filters.
    ///
    /// With a body the filters come from its JSON object (`$op`
    /// grammar); otherwise the flat `filter[...]` parameters apply.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an unparseable filter shape.
    pub fn count(
        &self,
        tenant: &TenantId,
        collection: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> ServerResult<usize> {
        let filters = match body {
            Some(value) => parse_json_filters(value)?,
            None => parse_filters(params)?,
        };
        Ok(self.store.count(tenant, collection, &filters)?)
    }

    /// Applies a merge patch to a document.
    ///
    /// # Errors
    ///
    /// Returns the engine's classification for a missing key, a
    /// non-object patch, or a schema violation after patching.
    pub fn update(
        &self,
        tenant: &TenantId,
        collection: &str,
        key: &str,
        body: Value,
    ) -> ServerResult<Document> {
        Ok(self.store.update(tenant, collection, key, body)?)
    }

    /// Deletes a document, returning its final state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` via the engine if the key does not exist.
    pub fn delete(&self, tenant: &TenantId, collection: &str, key: &str) -> ServerResult<Document> {
        Ok(self.store.delete(tenant, collection, key)?)
    }

    /// Registers or replaces a collection schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the body is not a valid schema
    /// definition.
    pub fn set_schema(&self, tenant: &TenantId, collection: &str, body: Value) -> ServerResult<()> {
        let schema: CollectionSchema = serde_json::from_value(body)
            .map_err(|e| ServerError::invalid_request(format!("invalid schema: {e}")))?;
        self.store.set_schema(tenant, collection, schema);
        Ok(())
    }

    /// Returns the registered schema for a collection, if any.
    #[must_use]
    pub fn schema(&self, tenant: &TenantId, collection: &str) -> Option<CollectionSchema> {
        self.store.schema(tenant, collection)
    }

    /// Lists the collections a tenant has written to.
    ///
    /// # Errors
    ///
    /// Returns engine errors from the keyspace enumeration.
    pub fn list_collections(&self, tenant: &TenantId) -> ServerResult<Vec<String>> {
        Ok(self.store.list_collections(tenant)?)
    }

    /// Returns engine-wide counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.store.stats()
    }
}

fn insert_options(params: &[(String, String)]) -> InsertOptions {
    let mut options = InsertOptions::new();
    for (key, value) in params {
        match key.as_str() {
            "key" => options = options.key(value.clone()),
            "unique" => {
                for field in parse_select(value) {
                    options = options.unique(field);
                }
            }
            _ => {}
        }
    }
    options
}

fn select_fields(params: &[(String, String)]) -> Option<Vec<String>> {
    params
        .iter()
        .find(|(key, _)| key == "select")
        .map(|(_, value)| parse_select(value))
}
