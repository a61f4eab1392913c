//! Multi-tenant JSON document engine.
//!
//! `docbase_core` implements the document store proper: schemaless JSON
//! documents grouped into per-tenant collections, optional per-collection
//! schema contracts, a canonical filter and sort model, usage-driven
//! secondary indexing, audit recording, and fire-and-forget change-event
//! publishing.
//!
//! Persistence is delegated to a [`docbase_storage::StorageBackend`];
//! the engine itself performs no I/O beyond that seam.
//!
//! # Architecture
//!
//! - [`DocumentStore`] is the operation surface: insert, get, find,
//!   count, update, delete, schemas, and stats
//! - [`Document`] models one JSON object with engine-stamped system
//!   fields (`_id`, `createdAt`, `updatedAt`)
//! - [`Query`], [`Filter`], and [`Sort`] form the canonical query model
//! - [`IndexAdvisor`] and [`IndexEngine`] materialize and maintain
//!   indexes from observed query usage
//! - [`EventPublisher`] fans mutations out to an [`EventBus`] without
//!   ever blocking the request path

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod config;
mod document;
mod error;
mod events;
mod index;
mod query;
mod schema;
mod store;
mod tenant;
mod types;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink};
pub use config::EngineConfig;
pub use document::{
    format_timestamp, Document, FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT, SYSTEM_FIELDS,
};
pub use error::{EngineError, EngineResult};
pub use events::{
    channel_name, BusMessage, ChangeEvent, ChangeType, EventBus, EventPublisher, InProcessBus,
};
pub use index::{encode_index_value, is_safe_identifier, FieldIndex, IndexAdvisor, IndexEngine};
pub use query::{compare_values, values_equal, Filter, FilterOp, Query, Sort};
pub use schema::{
    CollectionSchema, FieldSpec, FieldType, SchemaRegistry, ValidationError,
};
pub use store::{BulkError, BulkResult, DocumentStore, EngineStats, InsertOptions};
pub use tenant::{Tenant, TenantRegistry};
pub use types::{DocKey, TenantId};
