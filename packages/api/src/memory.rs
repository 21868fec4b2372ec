//! # In-memory backend
//!
//! [`MemoryBackend`] implements every backend trait against process memory. It stands in
//! for a hosted backend in tests and in offline development builds, and can be switched
//! "offline" with [`MemoryBackend::set_unavailable`] to exercise the unreachable-backend
//! paths.
//!
//! Passwords are compared verbatim. This type is not a credential store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::backend::{AuthBackend, CustomerDirectory, ImageStorage, RoleDirectory};
use crate::error::BackendError;
use crate::models::{
    AuthUser, Brand, Customer, CustomerUser, NewCustomer, NewCustomerUser, StorageObject,
};

#[derive(Debug, Clone)]
struct MemoryUser {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<MemoryUser>,
    current: Option<String>,
    roles: HashMap<String, String>,
    customers: Vec<Customer>,
    customer_users: Vec<CustomerUser>,
    brands: Vec<Brand>,
    buckets: HashMap<String, Vec<StorageObject>>,
    unavailable: bool,
    require_confirmation: bool,
    sign_in_attempts: usize,
}

/// In-memory stand-in for one hosted backend. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    name: String,
    state: Arc<Mutex<State>>,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl MemoryBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state, failing like an unreachable backend when offline.
    fn online(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        let state = self.lock();
        if state.unavailable {
            return Err(BackendError::Transport(format!("{} is offline", self.name)));
        }
        Ok(state)
    }

    /// Simulate the backend being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// New signups start unconfirmed and cannot sign in until confirmed.
    pub fn require_email_confirmation(&self, required: bool) {
        self.lock().require_confirmation = required;
    }

    /// Number of password sign-in attempts received.
    pub fn sign_in_attempts(&self) -> usize {
        self.lock().sign_in_attempts
    }

    /// Id of the user behind the active session.
    pub fn current_user_id(&self) -> Option<String> {
        self.lock().current.clone()
    }

    /// Register a confirmed auth user.
    pub fn add_user(&self, email: &str, password: &str, name: Option<&str>) -> AuthUser {
        let user = AuthUser {
            id: new_id(),
            email: Some(email.to_string()),
            user_metadata: match name {
                Some(name) => serde_json::json!({ "name": name }),
                None => serde_json::json!({}),
            },
            email_confirmed_at: Some(now()),
        };
        self.lock().users.push(MemoryUser {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    pub fn user_by_email(&self, email: &str) -> Option<AuthUser> {
        self.lock()
            .users
            .iter()
            .find(|u| u.user.email() == email)
            .map(|u| u.user.clone())
    }

    /// Set the `users.role` value for an auth user.
    pub fn set_role(&self, auth_user_id: &str, role: &str) {
        self.lock()
            .roles
            .insert(auth_user_id.to_string(), role.to_string());
    }

    pub fn add_customer(&self, customer: Customer) {
        self.lock().customers.push(customer);
    }

    pub fn add_customer_user(&self, user: CustomerUser) {
        self.lock().customer_users.push(user);
    }

    pub fn customer(&self, id: &str) -> Option<Customer> {
        self.lock().customers.iter().find(|c| c.id == id).cloned()
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.lock().customers.clone()
    }

    pub fn customer_user_by_email(&self, email: &str) -> Option<CustomerUser> {
        self.lock()
            .customer_users
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    pub fn add_brand(&self, brand: Brand) {
        self.lock().brands.push(brand);
    }

    /// Create `bucket` if needed and add `object` to it.
    pub fn add_object(&self, bucket: &str, object: StorageObject) {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .push(object);
    }

    fn joined(state: &State, user: &CustomerUser) -> CustomerUser {
        let mut user = user.clone();
        user.customer = state
            .customers
            .iter()
            .find(|c| c.id == user.linked_customer)
            .map(Customer::summary);
        user
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, BackendError> {
        let mut state = self.online()?;
        state.sign_in_attempts += 1;

        let Some(found) = state
            .users
            .iter()
            .find(|u| u.user.email() == email && u.password == password)
            .cloned()
        else {
            return Err(BackendError::InvalidCredentials);
        };
        if state.require_confirmation && !found.user.is_confirmed() {
            return Err(BackendError::EmailNotConfirmed);
        }

        state.current = Some(found.user.id.clone());
        Ok(found.user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<AuthUser, BackendError> {
        let mut state = self.online()?;
        if state.users.iter().any(|u| u.user.email() == email) {
            return Err(BackendError::Conflict("User already registered".to_string()));
        }

        let user = AuthUser {
            id: new_id(),
            email: Some(email.to_string()),
            user_metadata: metadata,
            email_confirmed_at: if state.require_confirmation {
                None
            } else {
                Some(now())
            },
        };
        state.users.push(MemoryUser {
            user: user.clone(),
            password: password.to_string(),
        });
        Ok(user)
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        let state = self.online()?;
        Ok(state.current.as_ref().and_then(|id| {
            state
                .users
                .iter()
                .find(|u| &u.user.id == id)
                .map(|u| u.user.clone())
        }))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        // Local session state is dropped even when the backend is offline.
        let mut state = self.lock();
        state.current = None;
        if state.unavailable {
            return Err(BackendError::Transport(format!("{} is offline", self.name)));
        }
        Ok(())
    }

    async fn confirm_email(&self, user_id: &str) -> Result<(), BackendError> {
        let mut state = self.online()?;
        let Some(found) = state.users.iter_mut().find(|u| u.user.id == user_id) else {
            return Err(BackendError::Status {
                status: 404,
                message: "User not found".to_string(),
            });
        };
        found.user.email_confirmed_at = Some(now());
        Ok(())
    }
}

#[async_trait]
impl RoleDirectory for MemoryBackend {
    async fn role_for(&self, auth_user_id: &str) -> Result<Option<String>, BackendError> {
        let state = self.online()?;
        Ok(state.roles.get(auth_user_id).cloned())
    }
}

#[async_trait]
impl CustomerDirectory for MemoryBackend {
    async fn find_customer_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CustomerUser>, BackendError> {
        let state = self.online()?;
        Ok(state
            .customer_users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_customer_user_by_auth_id(
        &self,
        auth_user_id: &str,
    ) -> Result<Option<CustomerUser>, BackendError> {
        let state = self.online()?;
        Ok(state
            .customer_users
            .iter()
            .find(|u| u.auth_user_id.as_deref() == Some(auth_user_id))
            .map(|u| Self::joined(&state, u)))
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
        linked_company: &str,
    ) -> Result<Option<Customer>, BackendError> {
        let state = self.online()?;
        Ok(state
            .customers
            .iter()
            .find(|c| c.email.as_deref() == Some(email) && c.linked_company == linked_company)
            .cloned())
    }

    async fn insert_customer(&self, customer: &NewCustomer) -> Result<Customer, BackendError> {
        let mut state = self.online()?;
        let created = Customer {
            id: new_id(),
            display_name: customer.display_name.clone(),
            trading_name: Some(customer.trading_name.clone()),
            email: Some(customer.email.clone()),
            linked_company: customer.linked_company.clone(),
            is_active: customer.is_active,
            logo_url: None,
        };
        state.customers.push(created.clone());
        Ok(created)
    }

    async fn insert_customer_user(
        &self,
        user: &NewCustomerUser,
    ) -> Result<CustomerUser, BackendError> {
        let mut state = self.online()?;
        if state.customer_users.iter().any(|u| u.email == user.email) {
            return Err(BackendError::Conflict(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }
        let created = CustomerUser {
            id: new_id(),
            auth_user_id: Some(user.auth_user_id.clone()),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            linked_customer: user.linked_customer.clone(),
            primary_contact: user.primary_contact,
            contact_type: user.contact_type,
            is_active: user.is_active,
            master_user: user.master_user,
            location_type: Some(user.location_type.clone()),
            marketing: user.marketing,
            is_online: false,
            last_login: None,
            created_date: Some(now()),
            customer: None,
        };
        state.customer_users.push(created.clone());
        Ok(created)
    }

    async fn record_login(&self, customer_user_id: &str) -> Result<(), BackendError> {
        let mut state = self.online()?;
        if let Some(user) = state
            .customer_users
            .iter_mut()
            .find(|u| u.id == customer_user_id)
        {
            user.last_login = Some(now());
            user.is_online = true;
        }
        Ok(())
    }

    async fn set_online(&self, auth_user_id: &str, online: bool) -> Result<(), BackendError> {
        let mut state = self.online()?;
        for user in state
            .customer_users
            .iter_mut()
            .filter(|u| u.auth_user_id.as_deref() == Some(auth_user_id))
        {
            user.is_online = online;
        }
        Ok(())
    }

    async fn list_customer_users(
        &self,
        linked_company: &str,
    ) -> Result<Vec<CustomerUser>, BackendError> {
        let state = self.online()?;
        let mut users: Vec<CustomerUser> = state
            .customer_users
            .iter()
            .map(|u| Self::joined(&state, u))
            .filter(|u| {
                u.customer
                    .as_ref()
                    .is_some_and(|c| c.linked_company == linked_company)
            })
            .collect();
        users.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(users)
    }

    async fn set_customer_user_active(
        &self,
        customer_user_id: &str,
        active: bool,
    ) -> Result<(), BackendError> {
        let mut state = self.online()?;
        let Some(user) = state
            .customer_users
            .iter_mut()
            .find(|u| u.id == customer_user_id)
        else {
            return Err(BackendError::Status {
                status: 404,
                message: format!("customer user {} not found", customer_user_id),
            });
        };
        user.is_active = active;
        let linked = user.linked_customer.clone();

        if let Some(customer) = state.customers.iter_mut().find(|c| c.id == linked) {
            customer.is_active = active;
        }
        Ok(())
    }

    async fn delete_customer_user(&self, customer_user_id: &str) -> Result<(), BackendError> {
        let mut state = self.online()?;
        state.customer_users.retain(|u| u.id != customer_user_id);
        Ok(())
    }
}

#[async_trait]
impl ImageStorage for MemoryBackend {
    async fn list_brands(&self, company_id: &str) -> Result<Vec<Brand>, BackendError> {
        let state = self.online()?;
        let mut brands: Vec<Brand> = state
            .brands
            .iter()
            .filter(|b| b.is_active && b.company_id.as_deref() == Some(company_id))
            .cloned()
            .collect();
        brands.sort_by(|a, b| a.brand_name.cmp(&b.brand_name));
        Ok(brands)
    }

    async fn list_buckets(&self) -> Result<Vec<String>, BackendError> {
        let state = self.online()?;
        let mut names: Vec<String> = state.buckets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<StorageObject>, BackendError> {
        let state = self.online()?;
        let Some(objects) = state.buckets.get(bucket) else {
            return Err(BackendError::Status {
                status: 404,
                message: "Bucket not found".to_string(),
            });
        };
        let mut objects = objects.clone();
        objects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(objects)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{}/public/{}/{}", self.name, bucket, path)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, BackendError> {
        let state = self.online()?;
        let exists = state
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.iter().any(|o| o.name == path));
        if !exists {
            return Err(BackendError::Status {
                status: 404,
                message: "Object not found".to_string(),
            });
        }
        Ok(format!(
            "memory://{}/signed/{}/{}?expires_in={}",
            self.name, bucket, path, expires_in_secs
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_session() {
        let backend = MemoryBackend::new("primary");
        let user = backend.add_user("staff@dm.test", "secret", Some("Staff"));

        assert!(matches!(
            backend.sign_in_with_password("staff@dm.test", "wrong").await,
            Err(BackendError::InvalidCredentials)
        ));
        assert!(backend.current_user().await.unwrap().is_none());

        let signed_in = backend
            .sign_in_with_password("staff@dm.test", "secret")
            .await
            .unwrap();
        assert_eq!(signed_in.id, user.id);
        assert_eq!(backend.current_user().await.unwrap().unwrap().id, user.id);
        assert_eq!(backend.sign_in_attempts(), 2);

        backend.sign_out().await.unwrap();
        assert!(backend.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_backend() {
        let backend = MemoryBackend::new("primary");
        backend.add_user("staff@dm.test", "secret", None);
        backend.set_unavailable(true);

        let err = backend
            .sign_in_with_password("staff@dm.test", "secret")
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(backend.sign_out().await.is_err());
    }

    #[tokio::test]
    async fn test_email_confirmation() {
        let backend = MemoryBackend::new("customer");
        backend.require_email_confirmation(true);

        let user = backend
            .sign_up("new@shop.test", "secret", serde_json::json!({}))
            .await
            .unwrap();
        assert!(matches!(
            backend.sign_in_with_password("new@shop.test", "secret").await,
            Err(BackendError::EmailNotConfirmed)
        ));

        backend.confirm_email(&user.id).await.unwrap();
        assert!(backend
            .sign_in_with_password("new@shop.test", "secret")
            .await
            .is_ok());

        assert!(matches!(
            backend
                .sign_up("new@shop.test", "other", serde_json::json!({}))
                .await,
            Err(BackendError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_bucket() {
        let backend = MemoryBackend::new("customer");
        assert!(matches!(
            backend.list_objects("Nope").await,
            Err(BackendError::Status { status: 404, .. })
        ));
    }
}
