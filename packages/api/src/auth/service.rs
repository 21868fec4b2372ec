//! # Auth façade
//!
//! [`AuthService`] is the single writer of the application's session state. It owns
//! an ordered list of [`IdentityProvider`]s, the local [`SessionCache`] mirror of the
//! last staff sign-in, and the optional [`CustomerSignup`] registry. The current
//! [`SessionState`] is broadcast on a `tokio::sync::watch` channel: views subscribe,
//! only the façade publishes.
//!
//! ## Session resolution
//!
//! [`AuthService::check_session`] resolves at most one principal, first hit wins:
//!
//! 1. the cached session record, if younger than the session TTL (no network call);
//!    an expired or unreadable record is deleted and resolution continues
//! 2. each staff provider's active backend session (role re-resolved)
//! 3. each customer provider's active backend session
//!
//! A provider failing during the check is logged and skipped.
//!
//! ## Sign-in
//!
//! When several providers are tried, failures are folded together: pending approval is
//! returned as soon as it is seen; otherwise a rejected password wins over an
//! unreachable backend, so the two are never conflated.

use std::sync::Arc;
use std::time::Duration;

use store::SessionCache;
use tokio::sync::watch;

use super::providers::{Audience, IdentityProvider};
use super::signup::{CustomerSignup, SignupOutcome};
use crate::error::AuthError;
use crate::models::{CustomerSignupData, Principal};

/// How long a cached staff session stays valid.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Session state as seen by the views.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// The startup session check has not finished.
    #[default]
    Resolving,
    Anonymous,
    SignedIn(Principal),
}

impl SessionState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionState::SignedIn(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self, SessionState::Resolving)
    }
}

impl From<Option<Principal>> for SessionState {
    fn from(principal: Option<Principal>) -> Self {
        match principal {
            Some(principal) => SessionState::SignedIn(principal),
            None => SessionState::Anonymous,
        }
    }
}

struct Inner {
    providers: Vec<Arc<dyn IdentityProvider>>,
    cache: SessionCache<Principal>,
    ttl: Duration,
    signup: Option<CustomerSignup>,
    state: watch::Sender<SessionState>,
}

/// Cloneable handle to the auth façade. Clones share state.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl PartialEq for AuthService {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<&str> = self.inner.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("AuthService")
            .field("providers", &providers)
            .field("cache", &self.inner.cache)
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}

pub struct AuthServiceBuilder {
    providers: Vec<Arc<dyn IdentityProvider>>,
    cache: SessionCache<Principal>,
    ttl: Duration,
    signup: Option<CustomerSignup>,
}

impl AuthServiceBuilder {
    /// Append a provider. Providers are tried in the order they are added.
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn signup(mut self, signup: CustomerSignup) -> Self {
        self.signup = Some(signup);
        self
    }

    pub fn build(self) -> AuthService {
        let (state, _) = watch::channel(SessionState::Resolving);
        AuthService {
            inner: Arc::new(Inner {
                providers: self.providers,
                cache: self.cache,
                ttl: self.ttl,
                signup: self.signup,
                state,
            }),
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl AuthService {
    pub fn builder(cache: SessionCache<Principal>) -> AuthServiceBuilder {
        AuthServiceBuilder {
            providers: Vec::new(),
            cache,
            ttl: DEFAULT_SESSION_TTL,
            signup: None,
        }
    }

    /// Names of the registered providers, in sign-in order.
    pub fn provider_names(&self) -> Vec<String> {
        self.inner
            .providers
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.inner.state.borrow().principal().cloned()
    }

    fn publish(&self, state: SessionState) {
        self.inner.state.send_replace(state);
    }

    fn providers_for(
        &self,
        audience: Option<Audience>,
    ) -> impl Iterator<Item = &Arc<dyn IdentityProvider>> {
        self.inner
            .providers
            .iter()
            .filter(move |p| match audience {
                Some(audience) => p.audience() == audience,
                None => true,
            })
    }

    /// Resolve the current principal and publish the result.
    pub async fn check_session(&self) -> Option<Principal> {
        let principal = self.resolve_session().await;
        self.publish(principal.clone().into());
        principal
    }

    async fn resolve_session(&self) -> Option<Principal> {
        if let Some(principal) = self.cached_principal() {
            tracing::debug!(user_id = %principal.id, "session restored from local cache");
            return Some(principal);
        }

        for audience in [Audience::Staff, Audience::Customer] {
            for provider in self.providers_for(Some(audience)) {
                match provider.resume_session().await {
                    Ok(Some(principal)) => {
                        tracing::info!(
                            provider = provider.name(),
                            user_id = %principal.id,
                            "resumed backend session"
                        );
                        return Some(principal);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            provider = provider.name(),
                            category = ?e.category(),
                            "session check failed, skipping provider: {}",
                            e
                        );
                    }
                }
            }
        }
        None
    }

    fn cached_principal(&self) -> Option<Principal> {
        let cache = &self.inner.cache;
        match cache.load() {
            Ok(Some(record)) if !record.is_expired(now_ms(), self.inner.ttl) => Some(record.user),
            Ok(Some(_)) => {
                tracing::info!(key = cache.key(), "cached session expired, discarding");
                self.discard_cache();
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = cache.key(), "unreadable cached session, discarding: {}", e);
                self.discard_cache();
                None
            }
        }
    }

    fn discard_cache(&self) {
        if let Err(e) = self.inner.cache.clear() {
            tracing::warn!(key = self.inner.cache.key(), "failed to clear cached session: {}", e);
        }
    }

    async fn authenticate(
        &self,
        audience: Option<Audience>,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let email = email.trim();
        let mut tried = false;
        let mut rejected = false;
        let mut unavailable = None;

        for provider in self.providers_for(audience) {
            tried = true;
            match provider.try_authenticate(email, password).await {
                Ok(principal) => {
                    self.complete_sign_in(provider, &principal).await;
                    return Ok(principal);
                }
                Err(AuthError::PendingApproval) => return Err(AuthError::PendingApproval),
                Err(AuthError::InvalidCredentials) => {
                    tracing::debug!(provider = provider.name(), "credentials rejected");
                    rejected = true;
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), "sign-in failed: {}", e);
                    unavailable = Some(e);
                }
            }
        }

        if !tried {
            return Err(AuthError::NoProviders);
        }
        if rejected {
            return Err(AuthError::InvalidCredentials);
        }
        Err(unavailable.unwrap_or(AuthError::InvalidCredentials))
    }

    /// Make `principal` the only signed-in identity: the local cache mirrors it only
    /// when it is staff, and every other provider's backend session is ended so a
    /// previous user cannot be resumed on the next session check.
    async fn complete_sign_in(&self, winner: &Arc<dyn IdentityProvider>, principal: &Principal) {
        if winner.audience() == Audience::Staff {
            if let Err(e) = self.inner.cache.save(principal, now_ms()) {
                tracing::warn!(key = self.inner.cache.key(), "failed to cache session: {}", e);
            }
        } else {
            self.discard_cache();
        }
        for provider in self.inner.providers.iter().filter(|p| !Arc::ptr_eq(*p, winner)) {
            if let Err(e) = provider.sign_out().await {
                tracing::warn!(
                    provider = provider.name(),
                    "failed to end previous session: {}",
                    e
                );
            }
        }
        tracing::info!(
            provider = %principal.provider,
            user_id = %principal.id,
            role = %principal.role,
            "signed in"
        );
        self.publish(SessionState::SignedIn(principal.clone()));
    }

    /// Sign in through the staff providers.
    pub async fn sign_in_admin(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.authenticate(Some(Audience::Staff), email, password).await
    }

    /// Sign in through the customer providers.
    pub async fn sign_in_customer(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        self.authenticate(Some(Audience::Customer), email, password).await
    }

    /// Sign in through every provider in configured order; first success wins.
    pub async fn sign_in_any(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.authenticate(None, email, password).await
    }

    /// Register a customer. Does not sign the new user in.
    pub async fn sign_up_customer(
        &self,
        data: &CustomerSignupData,
        password: &str,
    ) -> Result<SignupOutcome, AuthError> {
        let Some(signup) = &self.inner.signup else {
            tracing::warn!("customer signup requested but no customer backend is configured");
            return Err(AuthError::NoProviders);
        };
        signup.sign_up(data, password).await
    }

    /// Clear the cached session, sign out of every provider and publish `Anonymous`.
    /// Failures are logged, never returned.
    pub async fn sign_out(&self) {
        self.discard_cache();
        for provider in &self.inner.providers {
            if let Err(e) = provider.sign_out().await {
                tracing::warn!(provider = provider.name(), "sign-out failed: {}", e);
            }
        }
        self.publish(SessionState::Anonymous);
        tracing::info!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CustomerProvider, RoleResolver, StaffProvider};
    use crate::memory::MemoryBackend;
    use crate::models::{ContactType, Customer, CustomerUser, Role};
    use store::{KeyValueStore, MemoryStore, SessionRecord};

    const CACHE_KEY: &str = "dm-brands-auth";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    struct Fixture {
        primary: MemoryBackend,
        customer: MemoryBackend,
        store: MemoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            init_tracing();
            let primary = MemoryBackend::new("primary");
            let admin = primary.add_user("ops@dm.test", "staff-pass", Some("Ops"));
            primary.set_role(&admin.id, "admin");

            let customer = MemoryBackend::new("customer");
            Self {
                primary,
                customer,
                store: MemoryStore::new(),
            }
        }

        fn cache(&self) -> SessionCache<Principal> {
            SessionCache::new(Arc::new(self.store.clone()), CACHE_KEY)
        }

        fn service(&self) -> AuthService {
            let primary = Arc::new(self.primary.clone());
            let customer = Arc::new(self.customer.clone());
            AuthService::builder(self.cache())
                .provider(Arc::new(StaffProvider::new(
                    "primary",
                    primary.clone(),
                    RoleResolver::new(primary),
                )))
                .provider(Arc::new(CustomerProvider::new(
                    "customer",
                    customer.clone(),
                    customer.clone(),
                )))
                .signup(CustomerSignup::new("customer", customer.clone(), customer.clone(), "dm")
                    .with_admin_auth(customer))
                .build()
        }

        fn add_customer(&self, email: &str, active: bool) {
            let user = self.customer.add_user(email, "cust-pass", None);
            self.customer.add_customer(Customer {
                id: format!("c-{}", email),
                display_name: "Corner Shop".to_string(),
                trading_name: None,
                email: Some(email.to_string()),
                linked_company: "dm".to_string(),
                is_active: active,
                logo_url: None,
            });
            self.customer.add_customer_user(CustomerUser {
                id: format!("cu-{}", email),
                auth_user_id: Some(user.id),
                name: "Sam".to_string(),
                email: email.to_string(),
                phone: None,
                linked_customer: format!("c-{}", email),
                primary_contact: true,
                contact_type: ContactType::Buyer,
                is_active: active,
                master_user: true,
                location_type: None,
                marketing: false,
                is_online: false,
                last_login: None,
                created_date: None,
                customer: None,
            });
        }
    }

    fn signup_form(email: &str) -> CustomerSignupData {
        CustomerSignupData {
            name: "Sam".to_string(),
            email: email.to_string(),
            phone: None,
            company: "Corner Shop".to_string(),
            contact_type: ContactType::Buyer,
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_resolving() {
        let fixture = Fixture::new();
        let service = fixture.service();
        assert!(service.state().is_resolving());

        assert!(service.check_session().await.is_none());
        assert_eq!(service.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_sign_in_any_admin_skips_customer_backend() {
        let fixture = Fixture::new();
        let service = fixture.service();

        let principal = service.sign_in_any("ops@dm.test", "staff-pass").await.unwrap();
        assert_eq!(principal.role, Role::Admin);
        assert_eq!(fixture.customer.sign_in_attempts(), 0);
        assert_eq!(service.current_principal(), Some(principal));
    }

    #[tokio::test]
    async fn test_sign_in_any_falls_through_to_customer() {
        let fixture = Fixture::new();
        fixture.add_customer("sam@shop.test", true);
        let service = fixture.service();

        let principal = service.sign_in_any("sam@shop.test", "cust-pass").await.unwrap();
        assert_eq!(principal.role, Role::Customer);
        assert_eq!(fixture.primary.sign_in_attempts(), 1);
        // Customer sign-ins are not mirrored locally.
        assert!(fixture.store.get_item(CACHE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_inactive_customer_is_pending_not_invalid() {
        let fixture = Fixture::new();
        fixture.add_customer("sam@shop.test", false);
        let service = fixture.service();

        let err = service.sign_in_customer("sam@shop.test", "cust-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::PendingApproval));
        let err = service.sign_in_any("sam@shop.test", "cust-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::PendingApproval));

        let err = service.sign_in_customer("sam@shop.test", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_admin_session_survives_restart_without_network() {
        let fixture = Fixture::new();
        let principal = fixture
            .service()
            .sign_in_admin("ops@dm.test", "staff-pass")
            .await
            .unwrap();

        fixture.primary.set_unavailable(true);
        fixture.customer.set_unavailable(true);

        let restarted = fixture.service();
        assert_eq!(restarted.check_session().await, Some(principal.clone()));
        assert_eq!(restarted.state(), SessionState::SignedIn(principal));
    }

    #[tokio::test]
    async fn test_customer_sign_in_replaces_cached_admin() {
        let fixture = Fixture::new();
        fixture.add_customer("sam@shop.test", true);
        let service = fixture.service();
        service.sign_in_admin("ops@dm.test", "staff-pass").await.unwrap();
        assert!(fixture.store.get_item(CACHE_KEY).is_some());

        let principal = service.sign_in_customer("sam@shop.test", "cust-pass").await.unwrap();
        assert_eq!(service.current_principal(), Some(principal));
        assert!(fixture.store.get_item(CACHE_KEY).is_none());
        assert!(fixture.primary.current_user_id().is_none());

        let restarted = fixture.service().check_session().await.unwrap();
        assert_eq!(restarted.email, "sam@shop.test");
        assert_eq!(restarted.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_admin_sign_in_ends_customer_session() {
        let fixture = Fixture::new();
        fixture.add_customer("sam@shop.test", true);
        let service = fixture.service();
        service.sign_in_customer("sam@shop.test", "cust-pass").await.unwrap();

        service.sign_in_admin("ops@dm.test", "staff-pass").await.unwrap();
        assert!(fixture.customer.current_user_id().is_none());
        assert!(!fixture.customer.customer_user_by_email("sam@shop.test").unwrap().is_online);

        fixture.store.remove_item(CACHE_KEY).unwrap();
        let restarted = fixture.service().check_session().await.unwrap();
        assert_eq!(restarted.email, "ops@dm.test");
    }

    #[tokio::test]
    async fn test_sign_out_twice() {
        let fixture = Fixture::new();
        let service = fixture.service();
        service.sign_in_admin("ops@dm.test", "staff-pass").await.unwrap();

        service.sign_out().await;
        assert_eq!(service.state(), SessionState::Anonymous);
        assert!(fixture.store.get_item(CACHE_KEY).is_none());

        fixture.primary.set_unavailable(true);
        service.sign_out().await;
        assert_eq!(service.state(), SessionState::Anonymous);
        assert!(service.check_session().await.is_none());
    }

    #[tokio::test]
    async fn test_signup_with_known_company_can_sign_in() {
        let fixture = Fixture::new();
        fixture.customer.add_customer(Customer {
            id: "c1".to_string(),
            display_name: "Corner Shop".to_string(),
            trading_name: None,
            email: Some("new@shop.test".to_string()),
            linked_company: "dm".to_string(),
            is_active: true,
            logo_url: None,
        });
        let service = fixture.service();

        let outcome = service
            .sign_up_customer(&signup_form("new@shop.test"), "cust-pass")
            .await
            .unwrap();
        assert!(!outcome.needs_approval);
        assert!(service.current_principal().is_none());

        let principal = service.sign_in_customer("new@shop.test", "cust-pass").await.unwrap();
        assert!(principal.is_customer());
    }

    #[tokio::test]
    async fn test_signup_new_company_is_pending() {
        let fixture = Fixture::new();
        let service = fixture.service();

        let outcome = service
            .sign_up_customer(&signup_form("new@shop.test"), "cust-pass")
            .await
            .unwrap();
        assert!(outcome.needs_approval);

        let err = service.sign_in_customer("new@shop.test", "cust-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::PendingApproval));
    }

    #[tokio::test]
    async fn test_primary_user_without_role_row_is_customer() {
        let fixture = Fixture::new();
        fixture.primary.add_user("clerk@dm.test", "clerk-pass", None);
        let service = fixture.service();

        let principal = service.sign_in_admin("clerk@dm.test", "clerk-pass").await.unwrap();
        assert_eq!(principal.role, Role::Customer);
        assert!(!principal.is_admin());
    }

    #[tokio::test]
    async fn test_expired_cache_is_discarded() {
        let fixture = Fixture::new();
        let stale = Principal {
            id: "old".to_string(),
            email: "old@dm.test".to_string(),
            display_name: None,
            company: None,
            role: Role::Admin,
            provider: "primary".to_string(),
        };
        let eight_days_ago = now_ms() - 8 * 24 * 60 * 60 * 1000;
        fixture.cache().save(&stale, eight_days_ago).unwrap();

        let service = fixture.service();
        assert!(service.check_session().await.is_none());
        assert!(fixture.store.get_item(CACHE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_discarded() {
        let fixture = Fixture::new();
        fixture.store.set_item(CACHE_KEY, "{not json").unwrap();

        let service = fixture.service();
        assert!(service.check_session().await.is_none());
        assert!(fixture.store.get_item(CACHE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_fresh_cache_record_wins() {
        let fixture = Fixture::new();
        let cached = Principal {
            id: "cached".to_string(),
            email: "cached@dm.test".to_string(),
            display_name: None,
            company: None,
            role: Role::Admin,
            provider: "primary".to_string(),
        };
        let record = SessionRecord::new(&cached, now_ms() - 60_000);
        fixture
            .store
            .set_item(CACHE_KEY, &serde_json::to_string(&record).unwrap())
            .unwrap();

        assert_eq!(fixture.service().check_session().await, Some(cached));
    }

    #[tokio::test]
    async fn test_unavailable_distinct_from_invalid() {
        let fixture = Fixture::new();
        fixture.primary.set_unavailable(true);
        let service = fixture.service();

        let err = service.sign_in_admin("ops@dm.test", "staff-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::BackendUnavailable { ref provider, .. } if provider == "primary"));

        fixture.primary.set_unavailable(false);
        let err = service.sign_in_admin("ops@dm.test", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_rejection_outranks_unreachable_backend() {
        let fixture = Fixture::new();
        fixture.customer.set_unavailable(true);
        let service = fixture.service();

        let err = service.sign_in_any("ops@dm.test", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_resume_backend_session_and_skip_failing_provider() {
        let fixture = Fixture::new();
        fixture.add_customer("sam@shop.test", true);
        let service = fixture.service();
        service.sign_in_customer("sam@shop.test", "cust-pass").await.unwrap();

        fixture.primary.set_unavailable(true);
        let restarted = fixture.service();
        let principal = restarted.check_session().await.unwrap();
        assert_eq!(principal.email, "sam@shop.test");
        assert_eq!(principal.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_no_providers() {
        let fixture = Fixture::new();
        let service = AuthService::builder(fixture.cache()).build();

        let err = service.sign_in_any("ops@dm.test", "staff-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::NoProviders));
        assert!(matches!(
            service.sign_up_customer(&signup_form("x@y.z"), "secret").await,
            Err(AuthError::NoProviders)
        ));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let fixture = Fixture::new();
        let service = fixture.service();
        let mut rx = service.subscribe();
        assert!(rx.borrow_and_update().is_resolving());

        service.sign_in_admin("ops@dm.test", "staff-pass").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().principal().is_some());

        service.sign_out().await;
        assert_eq!(*rx.borrow_and_update(), SessionState::Anonymous);
    }
}
