pub mod context;
pub mod extract;
pub mod id;

pub use context::{RequestContext, TenantContext};
pub use extract::extract_tenant;
pub use id::{AllowList, SchemaName, TenantId};

use thiserror::Error;

/// Failures resolving the tenant a request belongs to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    #[error("Project ID not found in request")]
    MissingTenant,

    #[error("Invalid project ID: {tenant}. Allowed projects: {}", .allowed.join(", "))]
    UnknownTenant { tenant: String, allowed: Vec<String> },

    #[error("Tenant context not set")]
    ContextNotSet,

    #[error("Project ID {tenant} maps to invalid schema name {schema}")]
    InvalidSchema { tenant: String, schema: String },
}
