use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use store::KeyValueStore;

use crate::backend::AuthBackend;
use crate::error::BackendError;
use crate::models::AuthUser;

/// Seconds before expiry at which an access token is treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Token response of the hosted auth API, kept as the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    fn is_expired(&self, now_secs: i64) -> bool {
        self.expires_at
            .map(|at| at - EXPIRY_MARGIN_SECS <= now_secs)
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignupResponse {
    Session(AuthSession),
    User(AuthUser),
}

/// REST client for one hosted backend credential.
pub struct SupabaseClient {
    name: String,
    url: String,
    api_key: String,
    http: reqwest::Client,
    session: RwLock<Option<AuthSession>>,
    persistence: Option<(Arc<dyn KeyValueStore>, String)>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}

impl SupabaseClient {
    /// Create a client for the backend at `url` using `api_key` (anon or service role).
    ///
    /// `name` only labels log lines and errors.
    pub fn new(name: &str, url: &str, api_key: &str) -> Result<Self, BackendError> {
        let url = url.trim().trim_end_matches('/');
        let api_key = api_key.trim();
        if url.is_empty() {
            return Err(BackendError::NotConfigured(format!("{} url not set", name)));
        }
        if api_key.is_empty() {
            return Err(BackendError::NotConfigured(format!("{} key not set", name)));
        }

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            api_key: api_key.to_string(),
            http,
            session: RwLock::new(None),
            persistence: None,
        })
    }

    /// Mirror the active session to `store` under `key`, restoring any session
    /// already stored there.
    pub fn with_persistence(mut self, store: Arc<dyn KeyValueStore>, key: &str) -> Self {
        if let Some(raw) = store.get_item(key) {
            match serde_json::from_str::<AuthSession>(&raw) {
                Ok(session) => {
                    tracing::debug!("Restored {} session for {}", self.name, session.user.id);
                    *self.session.get_mut().unwrap_or_else(PoisonError::into_inner) =
                        Some(session);
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable {} session: {}", self.name, e);
                    if let Err(e) = store.remove_item(key) {
                        tracing::warn!("Failed to remove {} session: {}", self.name, e);
                    }
                }
            }
        }
        self.persistence = Some((store, key.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Snapshot of the active session.
    pub fn session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_session(&self, session: Option<AuthSession>) {
        if let Some((store, key)) = &self.persistence {
            let result = match &session {
                Some(s) => serde_json::to_string(s)
                    .map_err(store::StoreError::from)
                    .and_then(|raw| store.set_item(key, &raw)),
                None => store.remove_item(key),
            };
            if let Err(e) = result {
                tracing::warn!("Failed to persist {} session: {}", self.name, e);
            }
        }
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Bearer token for table and storage calls: the session's access token when
    /// signed in, the API key otherwise.
    fn bearer(&self) -> String {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.api_key.clone())
    }

    /// Request authorised with the active session (or the API key).
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_with_token(method, path, &self.bearer())
    }

    /// Request authorised with the API key regardless of session.
    pub(crate) fn request_as_key(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_with_token(method, path, &self.api_key)
    }

    fn request_with_token(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        tracing::debug!("{} {} {}", self.name, method, path);
        self.http
            .request(method, format!("{}{}", self.url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
    }

    /// Send and decode a JSON body, mapping non-success statuses to [`BackendError`].
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Send and discard the body.
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<(), BackendError> {
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let request = self
            .request_as_key(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        self.send_json(request).await
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_response(status.as_u16(), &body))
}

/// Map an error response of the auth, REST or storage APIs to a [`BackendError`].
pub(crate) fn error_from_response(status: u16, body: &str) -> BackendError {
    fn str_field<'a>(json: &'a serde_json::Value, name: &str) -> &'a str {
        json.get(name).and_then(|v| v.as_str()).unwrap_or_default()
    }

    let json: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let field = |name: &str| str_field(&json, name);

    let code = [field("error_code"), field("code"), field("error")]
        .into_iter()
        .find(|c| !c.is_empty())
        .unwrap_or_default()
        .to_string();
    let message = [
        field("msg"),
        field("message"),
        field("error_description"),
        field("error"),
    ]
    .into_iter()
    .find(|m| !m.is_empty())
    .map(str::to_string)
    .unwrap_or_else(|| body.trim().to_string());

    let lower = message.to_lowercase();
    if code == "invalid_credentials"
        || (code == "invalid_grant" && !lower.contains("refresh"))
        || lower.contains("invalid login credentials")
    {
        return BackendError::InvalidCredentials;
    }
    if code == "email_not_confirmed" || lower.contains("email not confirmed") {
        return BackendError::EmailNotConfirmed;
    }
    if status == 409
        || code == "23505"
        || code == "user_already_exists"
        || lower.contains("already registered")
    {
        return BackendError::Conflict(message);
    }
    BackendError::Status { status, message }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, BackendError> {
        let request = self
            .request_as_key(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }));
        let session: AuthSession = self.send_json(request).await?;
        let user = session.user.clone();
        self.set_session(Some(session));
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<AuthUser, BackendError> {
        let request = self
            .request_as_key(Method::POST, "/auth/v1/signup")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }));
        // Signup never replaces the active session; approval decides when the
        // new identity may sign in.
        match self.send_json::<SignupResponse>(request).await? {
            SignupResponse::Session(session) => Ok(session.user),
            SignupResponse::User(user) => Ok(user),
        }
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        let Some(mut session) = self.session() else {
            return Ok(None);
        };

        if session.is_expired(now_secs()) {
            let Some(refresh_token) = session.refresh_token.clone() else {
                self.set_session(None);
                return Ok(None);
            };
            match self.refresh(&refresh_token).await {
                Ok(refreshed) => {
                    self.set_session(Some(refreshed.clone()));
                    session = refreshed;
                }
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    tracing::info!("{} session could not be refreshed: {}", self.name, e);
                    self.set_session(None);
                    return Ok(None);
                }
            }
        }

        let request =
            self.request_with_token(Method::GET, "/auth/v1/user", &session.access_token);
        match self.send_json::<AuthUser>(request).await {
            Ok(user) => Ok(Some(user)),
            Err(BackendError::Status { status, .. }) if status == 401 || status == 403 => {
                self.set_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(session) = self.session() else {
            return Ok(());
        };
        // Local state is cleared even if the revocation call fails.
        self.set_session(None);
        let request =
            self.request_with_token(Method::POST, "/auth/v1/logout", &session.access_token);
        self.send_empty(request).await
    }

    async fn confirm_email(&self, user_id: &str) -> Result<(), BackendError> {
        let path = format!("/auth/v1/admin/users/{}", urlencoding::encode(user_id));
        let request = self
            .request_as_key(Method::PUT, &path)
            .json(&serde_json::json!({ "email_confirm": true }));
        self.send_empty(request).await
    }
}
