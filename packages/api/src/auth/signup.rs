//! # Customer signup
//!
//! [`CustomerSignup`] registers a new customer contact in the secondary backend:
//!
//! 1. Validate the form locally (no network call on bad input).
//! 2. Reject an email that already has a `customer_users` row.
//! 3. Look for a company record with the same email under the configured company.
//! 4. Create the auth identity, storing `name` and `company` as user metadata.
//! 5. For a known company, confirm the email through the service-role client so the
//!    contact can sign in straight away. Failure here is only logged.
//! 6. Attach to the known company, or insert a new pending one.
//! 7. Insert the contact row, active only when the company was already known.
//!
//! Signup never signs the new user in.

use std::sync::Arc;

use crate::backend::{AuthBackend, CustomerDirectory};
use crate::error::{AuthError, BackendError};
use crate::models::{CustomerSignupData, CustomerUser, NewCustomer, NewCustomerUser};

const MIN_PASSWORD_LEN: usize = 6;

/// Result of a successful signup.
#[derive(Debug, Clone, PartialEq)]
pub struct SignupOutcome {
    /// The company was not known yet; an admin must approve the account.
    pub needs_approval: bool,
    pub customer_user: CustomerUser,
}

/// Signup registry for the customer backend.
pub struct CustomerSignup {
    name: String,
    auth: Arc<dyn AuthBackend>,
    directory: Arc<dyn CustomerDirectory>,
    admin_auth: Option<Arc<dyn AuthBackend>>,
    linked_company: String,
}

impl CustomerSignup {
    pub fn new(
        name: &str,
        auth: Arc<dyn AuthBackend>,
        directory: Arc<dyn CustomerDirectory>,
        linked_company: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            auth,
            directory,
            admin_auth: None,
            linked_company: linked_company.to_string(),
        }
    }

    /// Service-role auth client used to confirm emails of known companies.
    pub fn with_admin_auth(mut self, admin_auth: Arc<dyn AuthBackend>) -> Self {
        self.admin_auth = Some(admin_auth);
        self
    }

    fn failed(&self, e: BackendError) -> AuthError {
        if e.is_unavailable() {
            return AuthError::backend(&self.name, e);
        }
        match e {
            BackendError::Conflict(_) => {
                AuthError::SignupFailed("email address is already registered".to_string())
            }
            other => AuthError::SignupFailed(other.to_string()),
        }
    }

    pub async fn sign_up(
        &self,
        data: &CustomerSignupData,
        password: &str,
    ) -> Result<SignupOutcome, AuthError> {
        let data = validate(data, password)?;

        let duplicate = self
            .directory
            .find_customer_user_by_email(&data.email)
            .await
            .map_err(|e| self.failed(e))?;
        if duplicate.is_some() {
            return Err(AuthError::SignupFailed(
                "an account with this email already exists".to_string(),
            ));
        }

        let existing = self
            .directory
            .find_customer_by_email(&data.email, &self.linked_company)
            .await
            .map_err(|e| self.failed(e))?;

        let metadata = serde_json::json!({ "name": data.name, "company": data.company });
        let user = self
            .auth
            .sign_up(&data.email, password, metadata)
            .await
            .map_err(|e| self.failed(e))?;
        tracing::debug!(provider = %self.name, user_id = %user.id, "created auth identity");

        let customer_id = match &existing {
            Some(customer) => {
                if !user.is_confirmed() {
                    self.confirm(&user.id).await;
                }
                customer.id.clone()
            }
            None => {
                let pending =
                    NewCustomer::pending(&data.company, &data.email, &self.linked_company);
                let created = self
                    .directory
                    .insert_customer(&pending)
                    .await
                    .map_err(|e| self.failed(e))?;
                created.id
            }
        };

        let is_active = existing.is_some();
        let contact = NewCustomerUser {
            auth_user_id: user.id.clone(),
            name: data.name.clone(),
            email: data.email.clone(),
            phone: data.phone.clone(),
            linked_customer: customer_id,
            primary_contact: true,
            contact_type: data.contact_type,
            is_active,
            master_user: true,
            location_type: "shipping".to_string(),
            marketing: false,
        };
        let customer_user = self
            .directory
            .insert_customer_user(&contact)
            .await
            .map_err(|e| self.failed(e))?;

        tracing::info!(
            provider = %self.name,
            customer_user = %customer_user.id,
            needs_approval = !is_active,
            "customer signup complete"
        );
        Ok(SignupOutcome {
            needs_approval: !is_active,
            customer_user,
        })
    }

    async fn confirm(&self, user_id: &str) {
        let Some(admin) = &self.admin_auth else {
            tracing::warn!(
                provider = %self.name,
                "no service client configured, email left unconfirmed"
            );
            return;
        };
        if let Err(e) = admin.confirm_email(user_id).await {
            tracing::warn!(provider = %self.name, "failed to auto-confirm email: {}", e);
        }
    }
}

/// Normalise and check the signup form.
fn validate(data: &CustomerSignupData, password: &str) -> Result<CustomerSignupData, AuthError> {
    let name = data.name.trim();
    let company = data.company.trim();
    let email = data.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AuthError::Validation("Name is required".to_string()));
    }
    if company.is_empty() {
        return Err(AuthError::Validation("Company is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AuthError::Validation("A valid email address is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    Ok(CustomerSignupData {
        name: name.to_string(),
        email,
        phone: data
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        company: company.to_string(),
        contact_type: data.contact_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::models::{ContactType, Customer};

    fn form(email: &str) -> CustomerSignupData {
        CustomerSignupData {
            name: "Sam Buyer".to_string(),
            email: email.to_string(),
            phone: Some("  ".to_string()),
            company: "Corner Shop".to_string(),
            contact_type: ContactType::Buyer,
        }
    }

    fn registry(backend: &MemoryBackend) -> CustomerSignup {
        let shared = Arc::new(backend.clone());
        CustomerSignup::new("customer", shared.clone(), shared.clone(), "dm").with_admin_auth(shared)
    }

    #[test]
    fn test_validation() {
        let ok = validate(&form(" Sam@Shop.TEST "), "secret").unwrap();
        assert_eq!(ok.email, "sam@shop.test");
        assert_eq!(ok.phone, None);

        assert!(matches!(validate(&form("no-at-sign"), "secret"), Err(AuthError::Validation(_))));
        assert!(matches!(validate(&form("a@b.c"), "short"), Err(AuthError::Validation(_))));

        let mut blank = form("a@b.c");
        blank.company = "   ".to_string();
        assert!(matches!(validate(&blank, "secret"), Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_new_company_needs_approval() {
        let backend = MemoryBackend::new("customer");
        let outcome = registry(&backend)
            .sign_up(&form("sam@shop.test"), "secret")
            .await
            .unwrap();

        assert!(outcome.needs_approval);
        assert!(!outcome.customer_user.is_active);
        let company = backend.customer(&outcome.customer_user.linked_customer).unwrap();
        assert!(!company.is_active);
        assert_eq!(company.display_name, "Corner Shop");
        assert!(backend.current_user_id().is_none());
    }

    #[tokio::test]
    async fn test_known_company_is_active_and_confirmed() {
        let backend = MemoryBackend::new("customer");
        backend.require_email_confirmation(true);
        backend.add_customer(Customer {
            id: "c1".to_string(),
            display_name: "Corner Shop Ltd".to_string(),
            trading_name: None,
            email: Some("sam@shop.test".to_string()),
            linked_company: "dm".to_string(),
            is_active: true,
            logo_url: None,
        });

        let outcome = registry(&backend)
            .sign_up(&form("sam@shop.test"), "secret")
            .await
            .unwrap();

        assert!(!outcome.needs_approval);
        assert!(outcome.customer_user.is_active);
        assert_eq!(outcome.customer_user.linked_customer, "c1");
        assert_eq!(backend.customers().len(), 1);
        assert!(backend.user_by_email("sam@shop.test").unwrap().is_confirmed());
    }

    #[tokio::test]
    async fn test_duplicate_contact_rejected() {
        let backend = MemoryBackend::new("customer");
        let registry = registry(&backend);
        registry.sign_up(&form("sam@shop.test"), "secret").await.unwrap();

        let err = registry.sign_up(&form("sam@shop.test"), "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::SignupFailed(_)));
    }

    #[tokio::test]
    async fn test_offline_backend_is_unavailable() {
        let backend = MemoryBackend::new("customer");
        backend.set_unavailable(true);

        let err = registry(&backend)
            .sign_up(&form("sam@shop.test"), "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BackendUnavailable { .. }));
    }
}
