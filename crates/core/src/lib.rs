//! Domain types and pure rules for the generation job pipeline.
//!
//! Nothing in this crate performs I/O. Persistence, the provider client and
//! the HTTP layer all build on the types defined here.

pub mod error;
pub mod hashing;
pub mod job;
pub mod output;
pub mod payload;
pub mod quota;
pub mod types;
