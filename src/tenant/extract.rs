use super::{AllowList, TenantError, TenantId};

/// Derive the tenant from a request path of the form `/{root}/{tenant}/...`.
///
/// Empty segments are ignored, so `//api///project-a` resolves the same as
/// `/api/project-a`. The candidate must be in the allow-list.
pub fn extract_tenant(path: &str, root: &str, allow_list: &AllowList) -> Result<TenantId, TenantError> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let candidate = match (segments.next(), segments.next()) {
        (Some(first), Some(second)) if first == root => second,
        _ => return Err(TenantError::MissingTenant),
    };

    allow_list.resolve(candidate)
}
