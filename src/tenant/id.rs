use serde::Serialize;
use std::fmt;

use super::TenantError;

/// Identifier of a logical tenant as it appears in the request path (e.g. `project-a`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap a raw id without consulting an allow-list.
    /// Request handling goes through `AllowList::resolve` instead.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema holding this tenant's tables: hyphens become underscores
    pub fn schema_name(&self) -> SchemaName {
        SchemaName(self.0.replace('-', "_"))
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PostgreSQL schema name derived from a `TenantId`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SchemaName(String);

impl SchemaName {
    /// Name of the shared, non-tenant schema. Part of the contract with the database.
    pub const PUBLIC: &'static str = "public";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn public() -> Self {
        Self(Self::PUBLIC.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Plain identifier: ASCII alphanumerics and `_`, at most 63 bytes, not `pg_`-prefixed.
    /// Names reach SQL quoted, but nothing else is ever expected.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 63
            && !self.0.starts_with("pg_")
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Double-quoted identifier, safe to splice into SQL
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed set of tenants this process serves, configured at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    tenants: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for tenant in tenants {
            let tenant = tenant.into();
            if !tenant.is_empty() && !list.contains(&tenant) {
                list.push(tenant);
            }
        }
        Self { tenants: list }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.tenants.iter().any(|t| t == candidate)
    }

    /// Admit a candidate id, or report every id that would have been accepted
    pub fn resolve(&self, candidate: &str) -> Result<TenantId, TenantError> {
        if self.contains(candidate) {
            Ok(TenantId::new(candidate))
        } else {
            Err(TenantError::UnknownTenant {
                tenant: candidate.to_string(),
                allowed: self.tenants.clone(),
            })
        }
    }

    /// Every configured tenant must map to a usable schema name
    pub fn validate(&self) -> Result<(), TenantError> {
        for tenant in self.tenants() {
            let schema = tenant.schema_name();
            if !schema.is_valid() {
                return Err(TenantError::InvalidSchema {
                    tenant: tenant.to_string(),
                    schema: schema.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn tenants(&self) -> impl Iterator<Item = TenantId> + '_ {
        self.tenants.iter().map(TenantId::new)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tenants
    }
}
