//! Bearer token validation.
//!
//! Tokens are issued by the identity service; this crate only verifies them
//! and reads the owner id from `sub`.

pub mod jwt;
