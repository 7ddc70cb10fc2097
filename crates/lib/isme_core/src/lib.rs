//! # isme_core
//!
//! Session lifecycle core for isme: credential issuance and rotation,
//! session revocation, and the cross-application login handoff.

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod models;
pub mod repo;
pub mod service;

pub use error::{AuthError, AuthResult};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
