//! Domain models.
//!
//! Storage rows (`User`, `Session`, `AppService`), the typed token claims, and
//! the request/response shapes returned by the services.

pub mod app;
pub mod auth;
