//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the owner behind a JWT Bearer token.

pub mod auth;
