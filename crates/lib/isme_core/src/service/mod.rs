//! Authentication flows and the application registry.

pub mod app;
pub mod auth;

pub use app::AppRegistryService;
pub use auth::AuthService;

use chrono::{DateTime, SecondsFormat, Utc};
use validator::ValidateEmail;

/// Minimum length of a new password.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Cache keys holding the token bundle behind an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCodeKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
}

pub fn exchange_code_keys(code: &str) -> ExchangeCodeKeys {
    ExchangeCodeKeys {
        access_token: format!("auth:external:code:{code}:access_token"),
        refresh_token: format!("auth:external:code:{code}:refresh_token"),
        expires_at: format!("auth:external:code:{code}:expires_at"),
    }
}

/// Cache key mapping a login handoff code to an app service id.
pub fn handoff_key(code: &str) -> String {
    format!("auth:external:session:{code}")
}

/// RFC 5322 address syntax via `validator`, plus a dotted domain so bare
/// hosts such as `a@localhost` are refused.
pub(crate) fn is_valid_email(email: &str) -> bool {
    email.validate_email()
        && email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| domain.contains('.'))
}

pub(crate) fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
