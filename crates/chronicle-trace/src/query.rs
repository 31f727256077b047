//! Tenant-guarded query service.

use crate::forest::{build_forest, TraceNode};
use chronicle_backends::{EventFilter, EventStore, StoreError};
use chronicle_types::AuditEvent;
use std::sync::Arc;
use tracing::warn;

/// The caller's authorization scope.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Tenant the caller may read.
    pub tenant_id: String,
}

impl QueryContext {
    /// Context scoped to one tenant.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }
}

/// Query failures.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The caller asked for a tenant outside its scope. Never partial data.
    #[error("access denied")]
    AccessDenied,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-side service over the primary store.
///
/// Queries are plain async calls with no shared mutable state, so a caller
/// dropping the future (client disconnect) simply abandons the read.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn EventStore>,
}

impl QueryService {
    /// Create a service over a store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Run a filtered query within the caller's tenant.
    pub async fn query(
        &self,
        ctx: &QueryContext,
        filter: &EventFilter,
    ) -> Result<Vec<AuditEvent>, QueryError> {
        if ctx.tenant_id != filter.tenant_id {
            warn!(
                caller_tenant = %ctx.tenant_id,
                requested_tenant = %filter.tenant_id,
                "Cross-tenant query rejected"
            );
            return Err(QueryError::AccessDenied);
        }
        Ok(self.store.query(filter).await?)
    }

    /// Reconstruct the execution forest of one workflow run.
    pub async fn trace(
        &self,
        ctx: &QueryContext,
        request_id: &str,
    ) -> Result<Vec<TraceNode>, QueryError> {
        let events = self
            .store
            .fetch_request(&ctx.tenant_id, request_id)
            .await?;
        Ok(build_forest(events))
    }
}
