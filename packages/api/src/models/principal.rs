//! # Principal — the resolved current user
//!
//! Defines the two identity representations used across the workspace:
//!
//! ## [`AuthUser`]
//!
//! The raw identity a hosted auth backend returns after a password sign-in, a signup
//! or a session lookup: the auth-user `id`, the `email`, the free-form
//! `user_metadata` captured at signup (`name`, `company`), and whether the email has
//! been confirmed.
//!
//! ## [`Principal`]
//!
//! The identity the rest of the application works with, produced by an identity
//! provider from an [`AuthUser`] plus whatever lookups that provider performs. The
//! coarse [`Role`] is a single field, so a principal is admin or customer, never both;
//! [`Principal::is_admin`] is derived from it. `provider` records which identity
//! provider produced the principal so sign-out and diagnostics can be routed back.
//!
//! A `Principal` is `Serialize + Deserialize` because it is mirrored verbatim into the
//! cached session record.

use serde::{Deserialize, Serialize};

/// Coarse role used for access decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current user plus coarse role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub role: Role,
    /// Name of the identity provider that produced this principal.
    pub provider: String,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }

    /// Get display name, falling back to email if name is not set.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Identity record returned by a hosted auth backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl AuthUser {
    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    /// The `name` captured in user metadata at signup, if any.
    pub fn metadata_name(&self) -> Option<&str> {
        self.user_metadata
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: "u1".to_string(),
            email: "jane@example.com".to_string(),
            display_name: None,
            company: None,
            role,
            provider: "primary".to_string(),
        }
    }

    #[test]
    fn test_role_is_exclusive() {
        let admin = principal(Role::Admin);
        assert!(admin.is_admin());
        assert!(!admin.is_customer());

        let customer = principal(Role::Customer);
        assert!(customer.is_customer());
        assert!(!customer.is_admin());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut p = principal(Role::Customer);
        assert_eq!(p.display_name(), "jane@example.com");
        p.display_name = Some("Jane".to_string());
        assert_eq!(p.display_name(), "Jane");
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(principal(Role::Admin)).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["email"], "jane@example.com");
        assert!(json.get("displayName").is_none());
    }

    #[test]
    fn test_auth_user_metadata() {
        let user: AuthUser = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "email": "a@b.c",
            "user_metadata": { "name": "Ann", "company": "Shop" }
        }))
        .unwrap();
        assert_eq!(user.metadata_name(), Some("Ann"));
        assert!(!user.is_confirmed());
    }
}
