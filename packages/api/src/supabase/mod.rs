//! # Hosted backend client
//!
//! [`SupabaseClient`] speaks the REST surface of a hosted auth + Postgres + storage
//! backend (GoTrue-style `/auth/v1`, PostgREST-style `/rest/v1`, `/storage/v1`). One
//! client instance represents one backend credential: the primary (staff) backend with
//! its anon key, the secondary (customer) backend with its anon key, or the secondary
//! backend with its service-role key for administrative calls.
//!
//! ## Modules
//!
//! | Module | Implements |
//! |--------|-----------|
//! | `client` | construction, request helpers, error mapping, session persistence, [`crate::backend::AuthBackend`] |
//! | `rest` | [`crate::backend::RoleDirectory`] and [`crate::backend::CustomerDirectory`] over PostgREST |
//! | `storage` | [`crate::backend::ImageStorage`] over the `brands` table and storage buckets |
//!
//! ## Sessions
//!
//! A successful password sign-in makes the returned access token the client's active
//! session; subsequent table calls are authorised with it. When the client was built
//! with [`SupabaseClient::with_persistence`], the session is mirrored to a
//! [`store::KeyValueStore`] key so it can be resumed after a restart. Expired access
//! tokens are refreshed once with the refresh token when the session is resumed.

mod client;
mod rest;
mod storage;

pub use client::{AuthSession, SupabaseClient};
