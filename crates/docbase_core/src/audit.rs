//! Audit trail for data-access operations.
//!
//! Every store operation records one [`AuditEvent`] through an
//! [`AuditSink`]. Recording is best-effort: a failing sink is logged
//! and the originating request proceeds.

use crate::types::TenantId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The data-access category of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    /// Insert operations.
    Create,
    /// Get, find, and count operations.
    Read,
    /// Patch operations.
    Update,
    /// Delete operations.
    Delete,
}

impl AuditAction {
    /// Returns the action name as recorded.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// One audited operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The tenant the operation ran under.
    pub tenant: TenantId,
    /// The collection the operation touched.
    pub collection: String,
    /// The data-access category.
    pub action: AuditAction,
    /// The document key, when the operation targets one document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// When the operation ran.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an audit event stamped with the current time.
    #[must_use]
    pub fn new(
        tenant: &TenantId,
        collection: impl Into<String>,
        action: AuditAction,
        doc_id: Option<String>,
    ) -> Self {
        Self {
            tenant: tenant.clone(),
            collection: collection.into(),
            action,
            doc_id,
            timestamp: Utc::now(),
        }
    }
}

/// A destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot accept the event. The store
    /// logs and ignores the failure.
    fn record(&self, event: AuditEvent) -> crate::error::EngineResult<()>;
}

/// An audit sink that keeps events in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event, in order.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> crate::error::EngineResult<()> {
        self.events.write().push(event);
        Ok(())
    }
}
