use std::future::Future;
use std::sync::RwLock;

use super::{SchemaName, TenantError, TenantId};

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

/// Request-scoped storage, visible to everything awaited inside `RequestContext::scope`.
///
/// The slot is task-local: futures handed to `tokio::spawn` start without it and
/// must open their own scope.
#[derive(Debug, Default)]
pub struct RequestContext {
    tenant: RwLock<Option<TenantId>>,
}

impl RequestContext {
    /// Run `fut` with a fresh, empty context
    pub async fn scope<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        REQUEST_CONTEXT.scope(RequestContext::default(), fut).await
    }

    /// Run `fut` with a context already bound to `tenant`
    pub async fn scope_with_tenant<F>(tenant: TenantId, fut: F) -> F::Output
    where
        F: Future,
    {
        let context = RequestContext {
            tenant: RwLock::new(Some(tenant)),
        };
        REQUEST_CONTEXT.scope(context, fut).await
    }

    /// True inside a `scope`, whether or not a tenant was set
    pub fn is_active() -> bool {
        REQUEST_CONTEXT.try_with(|_| ()).is_ok()
    }
}

/// Accessors for the tenant stored in the current request context
pub struct TenantContext;

impl TenantContext {
    /// Store the tenant for the rest of this request. Later calls overwrite.
    pub fn set_tenant(tenant: TenantId) -> Result<(), TenantError> {
        REQUEST_CONTEXT
            .try_with(|ctx| {
                let mut slot = ctx.tenant.write().unwrap_or_else(|e| e.into_inner());
                *slot = Some(tenant);
            })
            .map_err(|_| TenantError::ContextNotSet)
    }

    pub fn tenant_id() -> Result<TenantId, TenantError> {
        REQUEST_CONTEXT
            .try_with(|ctx| ctx.tenant.read().unwrap_or_else(|e| e.into_inner()).clone())
            .ok()
            .flatten()
            .ok_or(TenantError::ContextNotSet)
    }

    /// Converts `project-a` to `project_a`
    pub fn schema_name() -> Result<SchemaName, TenantError> {
        Self::tenant_id().map(|tenant| tenant.schema_name())
    }

    pub fn has_tenant() -> bool {
        Self::tenant_id().is_ok()
    }
}
