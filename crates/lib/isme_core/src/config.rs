//! Session lifecycle configuration.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

pub const ACCESS_PRIVATE_KEY_VAR: &str = "AUTH_ACCESS_TOKEN_PRIVATE_KEY";
pub const ACCESS_PUBLIC_KEY_VAR: &str = "AUTH_ACCESS_TOKEN_PUBLIC_KEY";
pub const REFRESH_SECRET_VAR: &str = "AUTH_REFRESH_TOKEN_SECRET_KEY";
pub const ACCESS_TTL_VAR: &str = "AUTH_ACCESS_TOKEN_EXPIRE_IN";
pub const REFRESH_TTL_VAR: &str = "AUTH_REFRESH_TOKEN_EXPIRE_IN";
pub const LOGIN_SESSION_TTL_VAR: &str = "AUTH_EXTERNAL_LOGIN_SESSION_TTL";
pub const EXCHANGE_CODE_TTL_VAR: &str = "AUTH_EXTERNAL_EXCHANGE_CODE_TTL";
pub const LOGIN_PAGE_URL_VAR: &str = "AUTH_LOGIN_PAGE_URL";
pub const AES_SECRET_VAR: &str = "AES_SECRET";

const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_LOGIN_SESSION_TTL_SECS: u64 = 5 * 60;
const DEFAULT_EXCHANGE_CODE_TTL_SECS: u64 = 60;
const DEFAULT_LOGIN_PAGE_URL: &str = "/auth/login";
/// Upper bound for any lifetime: 10 years.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Key material, lifetimes and the login page location.
#[derive(Clone)]
pub struct AuthConfig {
    /// RS256 private key (PEM, PKCS#1 or PKCS#8).
    pub access_private_key: String,
    /// RS256 public key (PEM).
    pub access_public_key: String,
    /// HS256 shared secret for refresh tokens.
    pub refresh_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Lifetime of a handoff code issued by `request_login`.
    pub login_session_ttl: Duration,
    /// Lifetime of an authorization code issued by a handoff login.
    pub exchange_code_ttl: Duration,
    pub login_page_url: String,
    /// Passphrase for the app secret cipher.
    pub aes_secret: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_private_key", &"<redacted>")
            .field("access_public_key", &self.access_public_key.len())
            .field("refresh_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("login_session_ttl", &self.login_session_ttl)
            .field("exchange_code_ttl", &self.exchange_code_ttl)
            .field("login_page_url", &self.login_page_url)
            .field("aes_secret", &"<redacted>")
            .finish()
    }
}

impl AuthConfig {
    /// Reads configuration from the process environment.
    ///
    /// | Variable                          | Default       |
    /// |-----------------------------------|---------------|
    /// | `AUTH_ACCESS_TOKEN_PRIVATE_KEY`   | required      |
    /// | `AUTH_ACCESS_TOKEN_PUBLIC_KEY`    | required      |
    /// | `AUTH_REFRESH_TOKEN_SECRET_KEY`   | required      |
    /// | `AUTH_ACCESS_TOKEN_EXPIRE_IN`     | `900`         |
    /// | `AUTH_REFRESH_TOKEN_EXPIRE_IN`    | `2592000`     |
    /// | `AUTH_EXTERNAL_LOGIN_SESSION_TTL` | `300`         |
    /// | `AUTH_EXTERNAL_EXCHANGE_CODE_TTL` | `60`          |
    /// | `AUTH_LOGIN_PAGE_URL`             | `/auth/login` |
    /// | `AES_SECRET`                      | required      |
    ///
    /// Lifetimes are in seconds. A `.env` file is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };
        let seconds = |var: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match lookup(var).filter(|v| !v.trim().is_empty()) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(0) => Err(ConfigError::Invalid {
                        var,
                        reason: "must be greater than zero".into(),
                    }),
                    Ok(secs) if secs > MAX_TTL_SECS => Err(ConfigError::Invalid {
                        var,
                        reason: format!("must not exceed {MAX_TTL_SECS} seconds"),
                    }),
                    Ok(secs) => Ok(Duration::from_secs(secs)),
                    Err(e) => Err(ConfigError::Invalid {
                        var,
                        reason: e.to_string(),
                    }),
                },
            }
        };

        Ok(Self {
            access_private_key: expand_newlines(&required(ACCESS_PRIVATE_KEY_VAR)?),
            access_public_key: expand_newlines(&required(ACCESS_PUBLIC_KEY_VAR)?),
            refresh_secret: required(REFRESH_SECRET_VAR)?,
            access_token_ttl: seconds(ACCESS_TTL_VAR, DEFAULT_ACCESS_TTL_SECS)?,
            refresh_token_ttl: seconds(REFRESH_TTL_VAR, DEFAULT_REFRESH_TTL_SECS)?,
            login_session_ttl: seconds(LOGIN_SESSION_TTL_VAR, DEFAULT_LOGIN_SESSION_TTL_SECS)?,
            exchange_code_ttl: seconds(EXCHANGE_CODE_TTL_VAR, DEFAULT_EXCHANGE_CODE_TTL_SECS)?,
            login_page_url: lookup(LOGIN_PAGE_URL_VAR)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOGIN_PAGE_URL.into()),
            aes_secret: required(AES_SECRET_VAR)?,
        })
    }
}

/// PEM blocks in env files are often written on one line with `\n` escapes.
fn expand_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (ACCESS_PRIVATE_KEY_VAR, "-----BEGIN-----\\nabc\\n-----END-----".to_string()),
            (ACCESS_PUBLIC_KEY_VAR, "pub".to_string()),
            (REFRESH_SECRET_VAR, "refresh".to_string()),
            (AES_SECRET_VAR, "aes".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AuthConfig, ConfigError> {
        AuthConfig::from_lookup(|var| env.get(var).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.access_token_ttl, Duration::from_secs(900));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(2_592_000));
        assert_eq!(config.login_session_ttl, Duration::from_secs(300));
        assert_eq!(config.exchange_code_ttl, Duration::from_secs(60));
        assert_eq!(config.login_page_url, "/auth/login");
    }

    #[test]
    fn pem_escapes_are_expanded() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.access_private_key, "-----BEGIN-----\nabc\n-----END-----");
    }

    #[test]
    fn missing_secret_is_reported() {
        let mut env = base_env();
        env.remove(AES_SECRET_VAR);
        assert!(matches!(load(&env), Err(ConfigError::Missing(AES_SECRET_VAR))));
    }

    #[test]
    fn bad_ttl_is_rejected() {
        let mut env = base_env();
        env.insert(ACCESS_TTL_VAR, "soon".into());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { var: ACCESS_TTL_VAR, .. })
        ));
        env.insert(ACCESS_TTL_VAR, "0".into());
        assert!(load(&env).is_err());
    }

    #[test]
    fn overrides_apply() {
        let mut env = base_env();
        env.insert(EXCHANGE_CODE_TTL_VAR, "30".into());
        env.insert(LOGIN_PAGE_URL_VAR, "https://sso.example.com/login".into());
        let config = load(&env).unwrap();
        assert_eq!(config.exchange_code_ttl, Duration::from_secs(30));
        assert_eq!(config.login_page_url, "https://sso.example.com/login");
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", load(&base_env()).unwrap());
        assert!(!rendered.contains("refresh\""));
        assert!(rendered.contains("<redacted>"));
    }
}
