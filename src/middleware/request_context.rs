use axum::{extract::Request, middleware::Next, response::Response};

use crate::tenant::RequestContext;

/// Opens a fresh request context around everything downstream.
/// Must wrap `validate_tenant_middleware`.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    RequestContext::scope(next.run(request)).await
}
