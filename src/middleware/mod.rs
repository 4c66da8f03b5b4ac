pub mod request_context;
pub mod response;
pub mod validate_tenant;

pub use request_context::request_context_middleware;
pub use response::{ApiResponse, ApiResult};
pub use validate_tenant::{validate_tenant_middleware, TenantRouting, ValidatedTenant};
