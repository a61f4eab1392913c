//! Tenant registry with soft-delete markers.

use crate::error::{EngineError, EngineResult};
use crate::types::TenantId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// The tenant's opaque identifier.
    pub id: TenantId,
    /// The owning account, as resolved by the authentication layer.
    pub owner: String,
    /// Soft-delete marker. Data is retained but the tenant is refused.
    #[serde(default)]
    pub deleted: bool,
}

impl Tenant {
    /// Creates an active tenant.
    #[must_use]
    pub fn new(id: impl Into<TenantId>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            deleted: false,
        }
    }
}

/// Thread-safe registry of known tenants.
///
/// The registry only tracks tenants that were explicitly registered or
/// soft-deleted. Tenant ids arrive already resolved, so an unknown
/// tenant is served normally; only a registered tenant carrying the
/// soft-delete marker is refused.
#[derive(Debug, Default)]
pub struct TenantRegistry {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl TenantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tenant, replacing any existing entry.
    pub fn register(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id.clone(), tenant);
    }

    /// Marks a tenant as soft-deleted, registering it if unknown.
    pub fn mark_deleted(&self, id: &TenantId) {
        let mut tenants = self.tenants.write();
        match tenants.get_mut(id) {
            Some(tenant) => tenant.deleted = true,
            None => {
                tenants.insert(
                    id.clone(),
                    Tenant {
                        id: id.clone(),
                        owner: String::new(),
                        deleted: true,
                    },
                );
            }
        }
    }

    /// Clears the soft-delete marker on a tenant.
    pub fn restore(&self, id: &TenantId) {
        if let Some(tenant) = self.tenants.write().get_mut(id) {
            tenant.deleted = false;
        }
    }

    /// Returns the registered tenant, if known.
    #[must_use]
    pub fn get(&self, id: &TenantId) -> Option<Tenant> {
        self.tenants.read().get(id).cloned()
    }

    /// Returns true unless the tenant is soft-deleted.
    #[must_use]
    pub fn is_active(&self, id: &TenantId) -> bool {
        self.tenants.read().get(id).is_none_or(|t| !t.deleted)
    }

    /// Fails with `TenantUnavailable` if the tenant is soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns `TenantUnavailable` for a soft-deleted tenant.
    pub fn ensure_active(&self, id: &TenantId) -> EngineResult<()> {
        if self.is_active(id) {
            Ok(())
        } else {
            Err(EngineError::tenant_unavailable(id.as_str()))
        }
    }
}
