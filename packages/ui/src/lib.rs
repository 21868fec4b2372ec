//! Shared dioxus components for the image bank: the auth context provider, the
//! role-gated route wrapper and the logout button.

mod auth;
pub use auth::{use_auth, use_auth_service, AuthProvider, LogoutButton};

mod guard;
pub use guard::RequireRole;

mod storage;
pub use storage::default_store;

pub use api::auth::Access;
pub use api::SessionState;
