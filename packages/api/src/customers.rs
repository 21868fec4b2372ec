//! Administrative customer management over the service-role client.

use std::sync::Arc;

use crate::backend::CustomerDirectory;
use crate::error::AuthError;
use crate::models::{CustomerUser, Principal};

/// Approve, suspend, list and remove customer contacts. Every call requires an admin
/// principal.
#[derive(Clone)]
pub struct CustomerAdmin {
    name: String,
    directory: Arc<dyn CustomerDirectory>,
    linked_company: String,
}

impl CustomerAdmin {
    pub fn new(name: &str, directory: Arc<dyn CustomerDirectory>, linked_company: &str) -> Self {
        Self {
            name: name.to_string(),
            directory,
            linked_company: linked_company.to_string(),
        }
    }

    fn authorize(actor: &Principal) -> Result<(), AuthError> {
        if actor.is_admin() {
            Ok(())
        } else {
            tracing::warn!(user_id = %actor.id, "customer administration denied to non-admin");
            Err(AuthError::Forbidden)
        }
    }

    /// Contacts of the configured company's customers, newest first.
    pub async fn list_customer_users(
        &self,
        actor: &Principal,
    ) -> Result<Vec<CustomerUser>, AuthError> {
        Self::authorize(actor)?;
        self.directory
            .list_customer_users(&self.linked_company)
            .await
            .map_err(|e| AuthError::backend(&self.name, e))
    }

    /// Set `is_active` on a contact and on its company.
    pub async fn set_customer_user_active(
        &self,
        actor: &Principal,
        customer_user_id: &str,
        active: bool,
    ) -> Result<(), AuthError> {
        Self::authorize(actor)?;
        self.directory
            .set_customer_user_active(customer_user_id, active)
            .await
            .map_err(|e| AuthError::backend(&self.name, e))?;
        tracing::info!(
            admin = %actor.id,
            customer_user = customer_user_id,
            active,
            "customer access updated"
        );
        Ok(())
    }

    pub async fn approve(
        &self,
        actor: &Principal,
        customer_user_id: &str,
    ) -> Result<(), AuthError> {
        self.set_customer_user_active(actor, customer_user_id, true).await
    }

    pub async fn delete_customer_user(
        &self,
        actor: &Principal,
        customer_user_id: &str,
    ) -> Result<(), AuthError> {
        Self::authorize(actor)?;
        self.directory
            .delete_customer_user(customer_user_id)
            .await
            .map_err(|e| AuthError::backend(&self.name, e))?;
        tracing::info!(
            admin = %actor.id,
            customer_user = customer_user_id,
            "customer user deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CustomerSignup;
    use crate::memory::MemoryBackend;
    use crate::models::{ContactType, CustomerSignupData, Role};

    fn principal(role: Role) -> Principal {
        Principal {
            id: "actor".to_string(),
            email: "actor@dm.test".to_string(),
            display_name: None,
            company: None,
            role,
            provider: "primary".to_string(),
        }
    }

    async fn signed_up(backend: &MemoryBackend, email: &str) -> CustomerUser {
        let shared = Arc::new(backend.clone());
        let data = CustomerSignupData {
            name: "Sam".to_string(),
            email: email.to_string(),
            phone: None,
            company: "Corner Shop".to_string(),
            contact_type: ContactType::Buyer,
        };
        CustomerSignup::new("customer", shared.clone(), shared, "dm")
            .sign_up(&data, "secret")
            .await
            .unwrap()
            .customer_user
    }

    #[tokio::test]
    async fn test_approve_activates_contact_and_company() {
        let backend = MemoryBackend::new("customer");
        let pending = signed_up(&backend, "sam@shop.test").await;
        let admin = CustomerAdmin::new("customer-admin", Arc::new(backend.clone()), "dm");

        let listed = admin.list_customer_users(&principal(Role::Admin)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].is_active);

        admin.approve(&principal(Role::Admin), &pending.id).await.unwrap();
        let contact = backend.customer_user_by_email("sam@shop.test").unwrap();
        assert!(contact.is_active);
        assert!(backend.customer(&contact.linked_customer).unwrap().is_active);

        admin
            .set_customer_user_active(&principal(Role::Admin), &pending.id, false)
            .await
            .unwrap();
        assert!(!backend.customer_user_by_email("sam@shop.test").unwrap().is_active);
    }

    #[tokio::test]
    async fn test_customer_principal_is_forbidden() {
        let backend = MemoryBackend::new("customer");
        let pending = signed_up(&backend, "sam@shop.test").await;
        let admin = CustomerAdmin::new("customer-admin", Arc::new(backend.clone()), "dm");
        let customer = principal(Role::Customer);

        assert!(matches!(admin.list_customer_users(&customer).await, Err(AuthError::Forbidden)));
        assert!(matches!(admin.approve(&customer, &pending.id).await, Err(AuthError::Forbidden)));
        assert!(matches!(
            admin.delete_customer_user(&customer, &pending.id).await,
            Err(AuthError::Forbidden)
        ));
        assert!(!backend.customer_user_by_email("sam@shop.test").unwrap().is_active);
    }

    #[tokio::test]
    async fn test_delete_and_unknown_id() {
        let backend = MemoryBackend::new("customer");
        let pending = signed_up(&backend, "sam@shop.test").await;
        let admin = CustomerAdmin::new("customer-admin", Arc::new(backend.clone()), "dm");
        let actor = principal(Role::Admin);

        admin.delete_customer_user(&actor, &pending.id).await.unwrap();
        assert!(backend.customer_user_by_email("sam@shop.test").is_none());

        let err = admin.approve(&actor, "missing").await.unwrap_err();
        assert!(matches!(err, AuthError::BackendUnavailable { .. }));
    }
}
