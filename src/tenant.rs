//! TenantLookup: external collaborator resolving per-tenant routing
//! and credentials. See `spec.md` §1 ("external collaborators").

use crate::remote::RemoteClientConfig;
use crate::types::{BranchId, TenantId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Per-tenant settings the engine needs but does not own: which branch
/// serves a conversation, the remote credentials to use, and pricing
/// parameters that vary by tenant.
#[derive(Debug, Clone)]
pub struct TenantProfile {
    pub tenant: TenantId,
    pub branch: BranchId,
    pub remote: Arc<RemoteClientConfig>,
    pub tax_rate: Decimal,
    pub restaurant_lat: f64,
    pub restaurant_lng: f64,
}

/// Resolves a `TenantId` to its operating profile. Implementations
/// typically cache against a control-plane API; this engine never
/// assumes tenants are known ahead of time.
#[async_trait]
pub trait TenantLookup: Send + Sync {
    async fn resolve(&self, tenant: &TenantId) -> Option<TenantProfile>;
}

/// Fixed single-tenant lookup, useful for local runs and tests where
/// only one tenant's configuration is in play.
pub struct StaticTenantLookup {
    profile: TenantProfile,
}

impl StaticTenantLookup {
    #[must_use]
    pub fn new(profile: TenantProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl TenantLookup for StaticTenantLookup {
    async fn resolve(&self, tenant: &TenantId) -> Option<TenantProfile> {
        if *tenant == self.profile.tenant {
            Some(self.profile.clone())
        } else {
            None
        }
    }
}
