//! # Identity providers
//!
//! An [`IdentityProvider`] is one source that can check an email/password pair and,
//! where it keeps a remote session, resume that session after a restart. The auth
//! façade holds an ordered list of them and never knows which concrete backends sit
//! behind the list.
//!
//! | Provider | Audience | Backend |
//! |----------|----------|---------|
//! | [`StaffProvider`] | staff | primary auth + `users.role` via [`RoleResolver`] |
//! | [`CustomerProvider`] | customer | secondary auth + `customer_users` |
//! | [`LocalAdminProvider`] | staff | configured email + Argon2id hash, no remote session |

use std::sync::Arc;

use async_trait::async_trait;

use super::password::verify_password;
use super::roles::RoleResolver;
use crate::backend::{AuthBackend, CustomerDirectory};
use crate::error::{AuthError, BackendError};
use crate::models::{AuthUser, CustomerUser, Principal, Role};

/// Which sign-in entry point a provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Staff,
    Customer,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    fn audience(&self) -> Audience;

    /// Check credentials and produce the principal they identify.
    async fn try_authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    /// Principal of the provider's still-active session, if any.
    async fn resume_session(&self) -> Result<Option<Principal>, AuthError>;

    /// End the provider's session. Succeeds when there is none.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Staff sign-in against the primary backend.
pub struct StaffProvider {
    name: String,
    auth: Arc<dyn AuthBackend>,
    roles: RoleResolver,
}

impl StaffProvider {
    pub fn new(name: &str, auth: Arc<dyn AuthBackend>, roles: RoleResolver) -> Self {
        Self {
            name: name.to_string(),
            auth,
            roles,
        }
    }

    async fn principal(&self, user: &AuthUser) -> Principal {
        let role = self.roles.resolve(&user.id).await;
        Principal {
            id: user.id.clone(),
            email: user.email().to_string(),
            display_name: user.metadata_name().map(str::to_string),
            company: None,
            role,
            provider: self.name.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaffProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn audience(&self) -> Audience {
        Audience::Staff
    }

    async fn try_authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let user = self
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| AuthError::backend(&self.name, e))?;
        Ok(self.principal(&user).await)
    }

    async fn resume_session(&self) -> Result<Option<Principal>, AuthError> {
        let user = self
            .auth
            .current_user()
            .await
            .map_err(|e| AuthError::backend(&self.name, e))?;
        match user {
            Some(user) => Ok(Some(self.principal(&user).await)),
            None => Ok(None),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth
            .sign_out()
            .await
            .map_err(|e| AuthError::backend(&self.name, e))
    }
}

/// Customer sign-in against the secondary backend.
///
/// Authentication succeeds only for identities linked to an active `customer_users`
/// row. An identity whose row is inactive is pending approval; one with no row at all
/// is rejected like a wrong password.
pub struct CustomerProvider {
    name: String,
    auth: Arc<dyn AuthBackend>,
    directory: Arc<dyn CustomerDirectory>,
}

impl CustomerProvider {
    pub fn new(
        name: &str,
        auth: Arc<dyn AuthBackend>,
        directory: Arc<dyn CustomerDirectory>,
    ) -> Self {
        Self {
            name: name.to_string(),
            auth,
            directory,
        }
    }

    fn principal(&self, user: &AuthUser, contact: &CustomerUser) -> Principal {
        let email = match user.email() {
            "" => contact.email.clone(),
            email => email.to_string(),
        };
        Principal {
            id: user.id.clone(),
            email,
            display_name: Some(contact.name.clone()),
            company: contact.customer.as_ref().map(|c| c.display_name.clone()),
            role: Role::Customer,
            provider: self.name.clone(),
        }
    }

    async fn contact_for(&self, user: &AuthUser) -> Result<Option<CustomerUser>, AuthError> {
        self.directory
            .find_customer_user_by_auth_id(&user.id)
            .await
            .map_err(|e| AuthError::backend(&self.name, e))
    }

    /// Drop a session that does not belong to an active customer.
    async fn discard_session(&self) {
        if let Err(e) = self.auth.sign_out().await {
            tracing::warn!(provider = %self.name, "failed to discard customer session: {}", e);
        }
    }
}

#[async_trait]
impl IdentityProvider for CustomerProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn audience(&self) -> Audience {
        Audience::Customer
    }

    async fn try_authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let user = self
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| AuthError::backend(&self.name, e))?;

        let contact = match self.contact_for(&user).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                tracing::info!(
                    provider = %self.name,
                    user_id = %user.id,
                    "no customer record for identity"
                );
                self.discard_session().await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                self.discard_session().await;
                return Err(e);
            }
        };

        if !contact.is_active {
            tracing::info!(
                provider = %self.name,
                customer_user = %contact.id,
                "customer account pending approval"
            );
            self.discard_session().await;
            return Err(AuthError::PendingApproval);
        }

        if let Err(e) = self.directory.record_login(&contact.id).await {
            tracing::warn!(provider = %self.name, "failed to record customer login: {}", e);
        }

        Ok(self.principal(&user, &contact))
    }

    async fn resume_session(&self) -> Result<Option<Principal>, AuthError> {
        let user = self
            .auth
            .current_user()
            .await
            .map_err(|e| AuthError::backend(&self.name, e))?;
        let Some(user) = user else {
            return Ok(None);
        };

        match self.contact_for(&user).await? {
            Some(contact) if contact.is_active => Ok(Some(self.principal(&user, &contact))),
            _ => Ok(None),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let current = match self.auth.current_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::debug!(provider = %self.name, "no current user before sign-out: {}", e);
                None
            }
        };
        if let Some(user) = current {
            if let Err(e) = self.directory.set_online(&user.id, false).await {
                tracing::warn!(provider = %self.name, "failed to clear online flag: {}", e);
            }
        }

        self.auth
            .sign_out()
            .await
            .map_err(|e| AuthError::backend(&self.name, e))
    }
}

/// Fallback admin whose credentials come from configuration.
pub struct LocalAdminProvider {
    email: String,
    password_hash: String,
}

impl LocalAdminProvider {
    pub const NAME: &'static str = "local-admin";

    pub fn new(email: &str, password_hash: &str) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            password_hash: password_hash.to_string(),
        }
    }

    fn principal(&self) -> Principal {
        Principal {
            id: format!("{}:{}", Self::NAME, self.email),
            email: self.email.clone(),
            display_name: Some("Administrator".to_string()),
            company: None,
            role: Role::Admin,
            provider: Self::NAME.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalAdminProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn audience(&self) -> Audience {
        Audience::Staff
    }

    async fn try_authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        if email.trim().to_lowercase() != self.email {
            return Err(AuthError::InvalidCredentials);
        }
        match verify_password(password, &self.password_hash) {
            Ok(true) => Ok(self.principal()),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                tracing::error!("local admin password hash is malformed: {}", e);
                Err(AuthError::backend(
                    Self::NAME,
                    BackendError::NotConfigured(format!("invalid password hash: {}", e)),
                ))
            }
        }
    }

    async fn resume_session(&self) -> Result<Option<Principal>, AuthError> {
        Ok(None)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
