//! # Backend seams
//!
//! The auth façade never talks HTTP directly. Everything it needs from a hosted
//! backend goes through one of these traits, implemented by
//! [`crate::supabase::SupabaseClient`] for the real services and by
//! [`crate::memory::MemoryBackend`] for tests and offline development.
//!
//! | Trait | Backed by |
//! |-------|-----------|
//! | [`AuthBackend`] | hosted auth: password sign-in, signup, current session, sign-out, admin email confirmation |
//! | [`RoleDirectory`] | primary backend `users` table (`auth_user_id` → `role`) |
//! | [`CustomerDirectory`] | secondary backend `customers` / `customer_users` tables |
//! | [`ImageStorage`] | secondary backend `brands` table and per-brand storage buckets |

use async_trait::async_trait;

use crate::error::BackendError;
use crate::models::{
    AuthUser, Brand, Customer, CustomerUser, NewCustomer, NewCustomerUser, StorageObject,
};

/// Hosted email/password authentication.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Authenticate and keep the resulting session as the backend's active session.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, BackendError>;

    /// Create a new auth identity. `metadata` is stored as the user's metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<AuthUser, BackendError>;

    /// The user behind the active session, if there is one.
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError>;

    /// End the active session. Succeeds when there is none.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Mark a user's email as confirmed. Requires service-role access.
    async fn confirm_email(&self, user_id: &str) -> Result<(), BackendError>;
}

/// Role lookup keyed by auth identity.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_for(&self, auth_user_id: &str) -> Result<Option<String>, BackendError>;
}

/// Company and contact records of the customer domain.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CustomerUser>, BackendError>;

    /// Contact linked to an auth identity, with its company joined.
    async fn find_customer_user_by_auth_id(
        &self,
        auth_user_id: &str,
    ) -> Result<Option<CustomerUser>, BackendError>;

    /// Company record with this contact email belonging to `linked_company`.
    async fn find_customer_by_email(
        &self,
        email: &str,
        linked_company: &str,
    ) -> Result<Option<Customer>, BackendError>;

    async fn insert_customer(&self, customer: &NewCustomer) -> Result<Customer, BackendError>;

    async fn insert_customer_user(
        &self,
        user: &NewCustomerUser,
    ) -> Result<CustomerUser, BackendError>;

    /// Stamp `last_login` and mark the contact online.
    async fn record_login(&self, customer_user_id: &str) -> Result<(), BackendError>;

    async fn set_online(&self, auth_user_id: &str, online: bool) -> Result<(), BackendError>;

    /// All contacts of companies linked to `linked_company`, newest first.
    async fn list_customer_users(
        &self,
        linked_company: &str,
    ) -> Result<Vec<CustomerUser>, BackendError>;

    /// Set `is_active` on a contact and on its company.
    async fn set_customer_user_active(
        &self,
        customer_user_id: &str,
        active: bool,
    ) -> Result<(), BackendError>;

    async fn delete_customer_user(&self, customer_user_id: &str) -> Result<(), BackendError>;
}

/// Brand catalogue and per-brand object storage.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Active brands of `company_id`, ordered by name.
    async fn list_brands(&self, company_id: &str) -> Result<Vec<Brand>, BackendError>;

    async fn list_buckets(&self) -> Result<Vec<String>, BackendError>;

    /// Objects at the root of `bucket`, newest first.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StorageObject>, BackendError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, BackendError>;
}
