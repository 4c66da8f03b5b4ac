use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::Instrument;

use crate::error::ApiError;
use crate::tenant::{extract_tenant, AllowList, TenantContext, TenantId};

/// Where the tenant sits in the path and which tenants are accepted
#[derive(Clone, Debug)]
pub struct TenantRouting {
    pub route_prefix: Arc<str>,
    pub allow_list: Arc<AllowList>,
}

impl TenantRouting {
    pub fn new(route_prefix: impl Into<String>, allow_list: AllowList) -> Self {
        Self {
            route_prefix: Arc::from(route_prefix.into()),
            allow_list: Arc::new(allow_list),
        }
    }
}

/// Tenant resolved for this request, also available as a request extension
#[derive(Clone, Debug)]
pub struct ValidatedTenant(pub TenantId);

/// Middleware that resolves `/{prefix}/{tenant}/...` against the allow-list
/// and records the tenant in the request context.
/// Rejected requests never reach the handler.
pub async fn validate_tenant_middleware(
    State(routing): State<TenantRouting>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();

    let tenant = extract_tenant(&path, &routing.route_prefix, &routing.allow_list).map_err(|e| {
        tracing::warn!("Tenant validation failed for {}: {}", path, e);
        ApiError::from(e)
    })?;

    TenantContext::set_tenant(tenant.clone())?;
    tracing::debug!("Tenant resolved: {} (schema {})", tenant, tenant.schema_name());

    let span = tracing::info_span!("tenant", tenant = %tenant);
    request.extensions_mut().insert(ValidatedTenant(tenant));

    Ok(next.run(request).instrument(span).await)
}
