//! # Route guard
//!
//! The access decision behind every protected view, kept free of any UI framework so
//! it can be tested directly. The `ui` crate's `RequireRole` component renders the
//! [`GuardDecision`] this module produces.
//!
//! While the session is still [`SessionState::Resolving`] the guard answers
//! [`GuardDecision::Loading`] and never guesses. A denied visitor is sent to the sign-in
//! path with the original destination preserved in a percent-encoded `redirect` query
//! parameter, which [`redirect_target`] recovers after sign-in.

use super::service::SessionState;
use crate::models::{Principal, Role};

/// Roles allowed through a guarded route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Any signed-in principal.
    #[default]
    Any,
    AdminOnly,
    CustomerOnly,
}

impl Access {
    pub fn permits(&self, principal: &Principal) -> bool {
        match self {
            Access::Any => true,
            Access::AdminOnly => principal.role == Role::Admin,
            Access::CustomerOnly => principal.role == Role::Customer,
        }
    }
}

/// What a guarded view should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session resolution is in progress.
    Loading,
    Allow,
    /// Navigate (replacing the current history entry) to `to`.
    Redirect { to: String },
}

/// Decide whether a visitor in `state` may view `from`.
pub fn evaluate(
    state: &SessionState,
    access: Access,
    from: &str,
    login_path: &str,
) -> GuardDecision {
    match state {
        SessionState::Resolving => GuardDecision::Loading,
        SessionState::SignedIn(principal) if access.permits(principal) => GuardDecision::Allow,
        SessionState::SignedIn(principal) => {
            tracing::debug!(
                role = %principal.role,
                path = from,
                "role not permitted, redirecting to sign-in"
            );
            GuardDecision::Redirect {
                to: login_redirect(login_path, from),
            }
        }
        SessionState::Anonymous => GuardDecision::Redirect {
            to: login_redirect(login_path, from),
        },
    }
}

/// Sign-in URL that remembers `from`.
pub fn login_redirect(login_path: &str, from: &str) -> String {
    if from.is_empty() {
        return login_path.to_string();
    }
    let separator = if login_path.contains('?') { '&' } else { '?' };
    format!("{}{}redirect={}", login_path, separator, urlencoding::encode(from))
}

/// Default page for a freshly signed-in principal.
pub fn landing_path(principal: &Principal) -> &'static str {
    match principal.role {
        Role::Admin => "/admin",
        Role::Customer => "/image-bank",
    }
}

/// Destination preserved by [`login_redirect`], read from a query string (with or
/// without the leading `?`). Only same-origin absolute paths are returned.
pub fn redirect_target(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let raw = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("redirect="))?;
    let decoded = urlencoding::decode(raw).ok()?;

    if decoded.starts_with('/') && !decoded.starts_with("//") && !decoded.contains('\\') {
        Some(decoded.into_owned())
    } else {
        None
    }
}
