//! Assembles the application's services from [`Settings`].
//!
//! Provider order is fixed: primary staff backend, local fallback admin, customer
//! backend. Backends that are not configured are skipped with a log line.

use std::sync::Arc;

use store::{KeyValueStore, SessionCache};

use crate::auth::{
    AuthService, CustomerProvider, CustomerSignup, LocalAdminProvider, RoleResolver,
    StaffProvider,
};
use crate::customers::CustomerAdmin;
use crate::error::BackendError;
use crate::image_bank::ImageBank;
use crate::models::Principal;
use crate::settings::Settings;
use crate::supabase::SupabaseClient;

pub const PRIMARY: &str = "primary";
pub const CUSTOMER: &str = "customer";
pub const CUSTOMER_SERVICE: &str = "customer-service";

/// Everything the views need, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    /// Present when the customer backend is configured. Reads with the customer's
    /// own session.
    pub image_bank: Option<ImageBank>,
    /// Present when the customer backend has a service-role key. Staff have no
    /// customer-backend session, so their listings and download links go through it.
    pub admin_image_bank: Option<ImageBank>,
    /// Present when the customer backend has a service-role key.
    pub customer_admin: Option<CustomerAdmin>,
}

fn client(
    name: &str,
    url: &str,
    key: &str,
    persistence: Option<(&Arc<dyn KeyValueStore>, &str)>,
) -> Result<Arc<SupabaseClient>, BackendError> {
    let client = SupabaseClient::new(name, url, key)?;
    let client = match persistence {
        Some((store, storage_key)) => client.with_persistence(Arc::clone(store), storage_key),
        None => client,
    };
    Ok(Arc::new(client))
}

impl Services {
    pub fn from_settings(settings: &Settings, store: Arc<dyn KeyValueStore>) -> Self {
        let cache = SessionCache::new(Arc::clone(&store), settings.session.storage_key.clone());
        let mut auth = AuthService::builder(cache).session_ttl(settings.session.ttl());

        let primary = &settings.primary;
        if primary.is_configured() {
            let persistence = primary
                .persist_session
                .then_some((&store, primary.storage_key.as_str()));
            match client(PRIMARY, &primary.url, &primary.anon_key, persistence) {
                Ok(client) => {
                    auth = auth.provider(Arc::new(StaffProvider::new(
                        PRIMARY,
                        client.clone(),
                        RoleResolver::new(client),
                    )));
                }
                Err(e) => tracing::error!("primary backend unusable: {}", e),
            }
        } else {
            tracing::info!("primary backend not configured, staff sign-in disabled");
        }

        let local_admin = &settings.local_admin;
        if local_admin.is_configured() {
            auth = auth.provider(Arc::new(LocalAdminProvider::new(
                &local_admin.email,
                &local_admin.password_hash,
            )));
        }

        let customer = &settings.customer;
        let service_client = if customer.has_service_key() {
            match client(CUSTOMER_SERVICE, &customer.url, &customer.service_key, None) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::error!("customer service client unusable: {}", e);
                    None
                }
            }
        } else {
            tracing::info!("customer service key not configured, customer administration disabled");
            None
        };

        let mut image_bank = None;
        if customer.is_configured() {
            let persistence = customer
                .persist_session
                .then_some((&store, customer.storage_key.as_str()));
            match client(CUSTOMER, &customer.url, &customer.anon_key, persistence) {
                Ok(client) => {
                    auth = auth.provider(Arc::new(CustomerProvider::new(
                        CUSTOMER,
                        client.clone(),
                        client.clone(),
                    )));
                    let mut signup = CustomerSignup::new(
                        CUSTOMER,
                        client.clone(),
                        client.clone(),
                        &customer.company_id,
                    );
                    if let Some(service) = &service_client {
                        signup = signup.with_admin_auth(service.clone());
                    }
                    auth = auth.signup(signup);
                    image_bank = Some(
                        ImageBank::new(CUSTOMER, client, &customer.company_id)
                            .with_signed_url_ttl(settings.image_bank.signed_url_ttl_secs),
                    );
                }
                Err(e) => tracing::error!("customer backend unusable: {}", e),
            }
        } else {
            tracing::info!("customer backend not configured, customer sign-in disabled");
        }

        let admin_image_bank = service_client.as_ref().map(|service| {
            ImageBank::new(CUSTOMER_SERVICE, service.clone(), &customer.company_id)
                .with_signed_url_ttl(settings.image_bank.signed_url_ttl_secs)
        });
        let customer_admin = service_client
            .map(|service| CustomerAdmin::new(CUSTOMER_SERVICE, service, &customer.company_id));

        let auth = auth.build();
        tracing::info!(providers = ?auth.provider_names(), "auth service ready");
        Self {
            auth,
            image_bank,
            admin_image_bank,
            customer_admin,
        }
    }

    /// The image bank `principal` should read through: the service-role bank for
    /// admins when one is configured, the customer bank otherwise.
    pub fn image_bank_for(&self, principal: &Principal) -> Option<&ImageBank> {
        if principal.is_admin() {
            if let Some(bank) = &self.admin_image_bank {
                return Some(bank);
            }
            tracing::debug!("no service-role image bank, admin reads use the customer key");
        }
        self.image_bank.as_ref()
    }
}
