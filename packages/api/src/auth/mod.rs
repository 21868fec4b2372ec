//! Authentication: identity providers, role resolution, customer signup, the auth
//! façade and the route-guard predicate.

pub mod guard;
mod password;
mod providers;
mod roles;
mod service;
mod signup;

pub use guard::{evaluate, landing_path, login_redirect, redirect_target, Access, GuardDecision};
pub use password::{hash_password, verify_password};
pub use providers::{
    Audience, CustomerProvider, IdentityProvider, LocalAdminProvider, StaffProvider,
};
pub use roles::{classify, RoleResolver};
pub use service::{AuthService, AuthServiceBuilder, SessionState, DEFAULT_SESSION_TTL};
pub use signup::{CustomerSignup, SignupOutcome};
