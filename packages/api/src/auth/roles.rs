//! Role resolution for primary-backend (staff) identities.

use std::sync::Arc;

use crate::backend::RoleDirectory;
use crate::models::Role;

/// Role-table values that grant the admin role.
const ADMIN_ROLES: [&str; 2] = ["admin", "manager"];

/// Maps a primary-backend identity to a coarse [`Role`] by looking up `users.role`.
///
/// Results are never cached: every sign-in and session check re-resolves.
#[derive(Clone)]
pub struct RoleResolver {
    directory: Arc<dyn RoleDirectory>,
}

impl RoleResolver {
    pub fn new(directory: Arc<dyn RoleDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve the role of `auth_user_id`. A missing row or a failed lookup
    /// resolves to [`Role::Customer`].
    pub async fn resolve(&self, auth_user_id: &str) -> Role {
        match self.directory.role_for(auth_user_id).await {
            Ok(role) => classify(role.as_deref()),
            Err(e) => {
                tracing::warn!(
                    user_id = auth_user_id,
                    "role lookup failed, defaulting to customer: {}",
                    e
                );
                Role::Customer
            }
        }
    }
}

/// Classify a raw role-table value.
pub fn classify(raw: Option<&str>) -> Role {
    match raw {
        Some(value) if ADMIN_ROLES.contains(&value.trim().to_lowercase().as_str()) => Role::Admin,
        _ => Role::Customer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Some("admin")), Role::Admin);
        assert_eq!(classify(Some(" Manager ")), Role::Admin);
        assert_eq!(classify(Some("ADMIN")), Role::Admin);
        assert_eq!(classify(Some("sales")), Role::Customer);
        assert_eq!(classify(Some("")), Role::Customer);
        assert_eq!(classify(None), Role::Customer);
    }

    #[tokio::test]
    async fn test_resolve_from_directory() {
        let backend = MemoryBackend::new("primary");
        backend.set_role("u1", "manager");
        let resolver = RoleResolver::new(Arc::new(backend.clone()));

        assert_eq!(resolver.resolve("u1").await, Role::Admin);
        assert_eq!(resolver.resolve("missing").await, Role::Customer);

        backend.set_unavailable(true);
        assert_eq!(resolver.resolve("u1").await, Role::Customer);
    }
}
