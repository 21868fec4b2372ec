//! # API crate — authentication and data access for the brand image bank
//!
//! Staff sign in against a primary hosted backend; customers sign in against a second,
//! externally owned backend that also holds the brand imagery. This crate resolves one
//! current principal across both, classifies it as admin or customer, keeps a local
//! mirror of staff sessions, decides route access, and exposes the image-bank and
//! customer-approval operations the views call.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | identity providers, role resolver, customer signup, [`AuthService`] façade, route guard |
//! | [`backend`] | async traits the façade talks to instead of HTTP |
//! | [`supabase`] | REST client implementing the backend traits for the hosted services |
//! | [`memory`] | in-memory implementation of the backend traits |
//! | [`image_bank`] | brand listing, image listing, download links, listing helpers |
//! | [`customers`] | admin-only customer approval and removal |
//! | [`models`] | principals, customer records, brands and images |
//! | [`settings`] | layered configuration |
//! | [`services`] | wiring of all of the above from [`Settings`] |
//! | [`error`] | [`BackendError`], [`AuthError`] and their categories |

pub mod auth;
pub mod backend;
pub mod customers;
pub mod error;
pub mod image_bank;
pub mod memory;
pub mod models;
pub mod services;
pub mod settings;
pub mod supabase;

pub use auth::{Access, AuthService, GuardDecision, SessionState, SignupOutcome};
pub use customers::CustomerAdmin;
pub use error::{AuthError, BackendError, ErrorCategory};
pub use image_bank::{ImageBank, SortBy, SortOrder};
pub use models::{Brand, CustomerSignupData, CustomerUser, ImageItem, Principal, Role};
pub use services::Services;
pub use settings::Settings;
