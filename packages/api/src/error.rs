//! # Error taxonomy
//!
//! Two layers of errors:
//!
//! - [`BackendError`] — what a single hosted backend (or its in-memory stand-in) reported.
//!   It keeps "the backend said no" ([`BackendError::InvalidCredentials`]) apart from
//!   "the backend could not be reached or is not set up" ([`BackendError::Transport`],
//!   [`BackendError::NotConfigured`]).
//! - [`AuthError`] — what the auth façade and its callers see. Every variant maps to one
//!   [`ErrorCategory`]; only categories 1, 2 and 4 carry text meant for end users
//!   ([`AuthError::user_message`]).

use thiserror::Error;

/// Failure reported by a hosted backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("email address not confirmed")]
    EmailNotConfirmed,

    #[error("backend not configured: {0}")]
    NotConfigured(String),

    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("conflicting record: {0}")]
    Conflict(String),

    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether the failure means the backend could not serve the request at all,
    /// as opposed to answering it negatively.
    pub fn is_unavailable(&self) -> bool {
        match self {
            BackendError::NotConfigured(_) | BackendError::Transport(_) => true,
            BackendError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Error categories exposed to callers and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wrong email or password.
    InvalidCredentials,
    /// Credentials are valid but the account awaits approval.
    PendingApproval,
    /// A backend is unreachable or misconfigured.
    Unavailable,
    /// Signup could not create the account.
    SignupFailed,
    /// The principal lacks the role an operation needs.
    Forbidden,
    /// Local persistence failed.
    Storage,
}

/// Failure surfaced by the auth façade and the services built on it.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account pending approval")]
    PendingApproval,

    #[error("{provider} unavailable: {reason}")]
    BackendUnavailable { provider: String, reason: String },

    #[error("no identity provider is configured")]
    NoProviders,

    #[error("signup failed: {0}")]
    SignupFailed(String),

    #[error("{0}")]
    Validation(String),

    #[error("operation requires the admin role")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] store::StoreError),
}

impl AuthError {
    /// Wrap a backend failure that happened while talking to `provider`.
    pub fn backend(provider: &str, e: BackendError) -> Self {
        match e {
            BackendError::InvalidCredentials => AuthError::InvalidCredentials,
            BackendError::EmailNotConfirmed => AuthError::PendingApproval,
            other => AuthError::BackendUnavailable {
                provider: provider.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::InvalidCredentials => ErrorCategory::InvalidCredentials,
            AuthError::PendingApproval => ErrorCategory::PendingApproval,
            AuthError::BackendUnavailable { .. } | AuthError::NoProviders => {
                ErrorCategory::Unavailable
            }
            AuthError::SignupFailed(_) | AuthError::Validation(_) => ErrorCategory::SignupFailed,
            AuthError::Forbidden => ErrorCategory::Forbidden,
            AuthError::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Text safe to show an end user, for the categories that have any.
    pub fn user_message(&self) -> Option<String> {
        match self {
            AuthError::InvalidCredentials => Some("Invalid email or password".to_string()),
            AuthError::PendingApproval => {
                Some("Account pending approval. Please contact administrator.".to_string())
            }
            AuthError::Validation(msg) => Some(msg.clone()),
            AuthError::SignupFailed(_) => Some("Signup failed. Please try again.".to_string()),
            _ => None,
        }
    }
}
