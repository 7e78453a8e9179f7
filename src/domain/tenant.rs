//! Per-execution tenant binding.
//!
//! Each request or job execution owns its own [`TenantContext`] and passes it
//! explicitly into the services; nothing is stored in process-wide state.

use std::ops::Deref;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no tenant in context")]
pub struct MissingTenant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<Uuid>,
}

impl TenantContext {
    pub fn unbound() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
        }
    }

    pub fn get(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn set(&mut self, tenant_id: Uuid) {
        self.tenant_id = Some(tenant_id);
    }

    pub fn clear(&mut self) {
        self.tenant_id = None;
    }

    pub fn require(&self) -> Result<Uuid, MissingTenant> {
        self.tenant_id.ok_or(MissingTenant)
    }

    /// Bind `tenant_id` until the returned guard drops, on every exit path.
    pub fn bind(&mut self, tenant_id: Uuid) -> TenantBinding<'_> {
        self.set(tenant_id);
        TenantBinding { context: self }
    }
}

/// Scope guard returned by [`TenantContext::bind`]; clears the binding on drop.
#[derive(Debug)]
pub struct TenantBinding<'a> {
    context: &'a mut TenantContext,
}

impl Deref for TenantBinding<'_> {
    type Target = TenantContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl Drop for TenantBinding<'_> {
    fn drop(&mut self) {
        self.context.clear();
    }
}
