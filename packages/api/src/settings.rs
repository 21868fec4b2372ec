//! # Settings
//!
//! Layered configuration via the `config` crate, later sources overriding earlier:
//!
//! 1. built-in defaults
//! 2. `imagebank.toml` in the working directory, if present
//! 3. environment variables prefixed `IMAGEBANK__`, sections separated by `__`
//!    (e.g. `IMAGEBANK__PRIMARY__ANON_KEY`), after `dotenvy` has loaded any `.env`
//!
//! ```toml
//! [primary]
//! url = "https://primary.example.co"
//! anon_key = "..."
//!
//! [customer]
//! url = "https://customer.example.co"
//! anon_key = "..."
//! service_key = "..."
//! company_id = "..."
//!
//! [local_admin]
//! email = "admin@example.com"
//! password_hash = "$argon2id$v=19$..."
//! ```
//!
//! A backend whose url or key is blank counts as not configured.

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const CONFIG_FILE: &str = "imagebank.toml";
const ENV_PREFIX: &str = "IMAGEBANK";

fn is_set(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Primary (staff) backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrimaryBackend {
    pub url: String,
    pub anon_key: String,
    /// Local key the backend session is mirrored under.
    pub storage_key: String,
    pub persist_session: bool,
}

impl PrimaryBackend {
    pub fn is_configured(&self) -> bool {
        is_set(&self.url) && is_set(&self.anon_key)
    }
}

/// Secondary (customer) backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomerBackend {
    pub url: String,
    pub anon_key: String,
    /// Service-role key for email confirmation and customer administration.
    pub service_key: String,
    pub storage_key: String,
    pub persist_session: bool,
    /// Company whose customers, brands and buckets this application serves.
    pub company_id: String,
}

impl CustomerBackend {
    pub fn is_configured(&self) -> bool {
        is_set(&self.url) && is_set(&self.anon_key)
    }

    pub fn has_service_key(&self) -> bool {
        is_set(&self.url) && is_set(&self.service_key)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionSettings {
    pub storage_key: String,
    pub ttl_secs: u64,
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Fallback admin account. `password_hash` is an Argon2id PHC string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalAdmin {
    pub email: String,
    pub password_hash: String,
}

impl LocalAdmin {
    pub fn is_configured(&self) -> bool {
        is_set(&self.email) && is_set(&self.password_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageBankSettings {
    pub signed_url_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub primary: PrimaryBackend,
    pub customer: CustomerBackend,
    pub session: SessionSettings,
    pub local_admin: LocalAdmin,
    pub image_bank: ImageBankSettings,
}

impl Settings {
    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("primary.url", "")?
            .set_default("primary.anon_key", "")?
            .set_default("primary.storage_key", "dm-brands-admin-token")?
            .set_default("primary.persist_session", true)?
            .set_default("customer.url", "")?
            .set_default("customer.anon_key", "")?
            .set_default("customer.service_key", "")?
            .set_default("customer.storage_key", "splitfin-customer-token")?
            .set_default("customer.persist_session", true)?
            .set_default("customer.company_id", "")?
            .set_default("session.storage_key", "dm-brands-auth")?
            .set_default("session.ttl_secs", 7 * 24 * 60 * 60)?
            .set_default("local_admin.email", "")?
            .set_default("local_admin.password_hash", "")?
            .set_default("image_bank.signed_url_ttl_secs", 3600)
    }

    /// Load from defaults, `imagebank.toml` and the environment.
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::defaults()?
            .add_source(
                File::with_name(CONFIG_FILE)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Load from defaults overlaid with a TOML document only.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::set_var;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert!(!settings.primary.is_configured());
        assert!(!settings.customer.is_configured());
        assert!(!settings.local_admin.is_configured());
        assert_eq!(settings.session.storage_key, "dm-brands-auth");
        assert_eq!(settings.session.ttl(), Duration::from_secs(604_800));
        assert_eq!(settings.customer.storage_key, "splitfin-customer-token");
        assert_eq!(settings.image_bank.signed_url_ttl_secs, 3600);
    }

    #[test]
    fn test_toml_overrides() {
        let settings = Settings::from_toml(
            r#"
            [primary]
            url = "https://primary.test"
            anon_key = "anon"
            persist_session = false

            [customer]
            url = "https://customer.test"
            anon_key = "anon"
            company_id = "dm"

            [session]
            ttl_secs = 60
            "#,
        )
        .unwrap();
        assert!(settings.primary.is_configured());
        assert!(!settings.primary.persist_session);
        assert!(settings.customer.is_configured());
        assert!(!settings.customer.has_service_key());
        assert_eq!(settings.session.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_environment_overrides() {
        set_var("IMAGEBANK__CUSTOMER__SERVICE_KEY", "service");
        set_var("IMAGEBANK__IMAGE_BANK__SIGNED_URL_TTL_SECS", "120");
        let settings = Settings::new().unwrap();
        assert_eq!(settings.customer.service_key, "service");
        assert_eq!(settings.image_bank.signed_url_ttl_secs, 120);
    }
}
