//! Shared setup for the service integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use isme_core::cache::TtlCache;
use isme_core::config::AuthConfig;
use isme_core::context::CallerContext;
use isme_core::models::app::CTX_INFO_AUTHEN;
use isme_core::models::auth::{LoginResponse, TokenBundle};
use isme_core::repo::memory::{
    MemoryAppRegistryRepository, MemoryIdentityRepository, MemorySessionRepository,
};
use isme_core::service::{AppRegistryService, AuthService};

pub const PRIVATE_PEM: &str = include_str!("../fixtures/access_private.pem");
pub const PUBLIC_PEM: &str = include_str!("../fixtures/access_public.pem");

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct-horse";

pub fn test_config() -> AuthConfig {
    AuthConfig {
        access_private_key: PRIVATE_PEM.into(),
        access_public_key: PUBLIC_PEM.into(),
        refresh_secret: "integration-refresh-secret".into(),
        access_token_ttl: Duration::from_secs(900),
        refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
        login_session_ttl: Duration::from_secs(300),
        exchange_code_ttl: Duration::from_secs(60),
        login_page_url: "/auth/login".into(),
        aes_secret: "integration-aes-secret".into(),
    }
}

/// Services wired to in-memory repositories, with handles on the
/// repositories for direct inspection.
pub struct Harness {
    pub auth: AuthService,
    pub registry: AppRegistryService,
    pub users: Arc<MemoryIdentityRepository>,
    pub sessions: Arc<MemorySessionRepository>,
    pub apps: Arc<MemoryAppRegistryRepository>,
    pub cache: Arc<TtlCache>,
}

impl Harness {
    pub fn new() -> Self {
        let config = test_config();
        let users = Arc::new(MemoryIdentityRepository::new());
        let sessions = Arc::new(MemorySessionRepository::new());
        let apps = Arc::new(MemoryAppRegistryRepository::new());
        let cache = Arc::new(TtlCache::new());

        let registry = AppRegistryService::new(&config, apps.clone());
        let auth = AuthService::new(
            config,
            users.clone(),
            sessions.clone(),
            apps.clone(),
            cache.clone(),
        )
        .expect("auth service");

        Self {
            auth,
            registry,
            users,
            sessions,
            apps,
            cache,
        }
    }

    /// Sign up the default user and return its id.
    pub async fn sign_up(&self) -> String {
        self.auth
            .sign_up("Ada", EMAIL, PASSWORD)
            .await
            .expect("sign up")
    }

    /// Direct login of the default user.
    pub async fn login(&self) -> TokenBundle {
        match self
            .auth
            .login(&CallerContext::anonymous(), EMAIL, PASSWORD, None)
            .await
            .expect("login")
        {
            LoginResponse::Tokens(bundle) => bundle,
            other => panic!("expected tokens, got {other:?}"),
        }
    }

    /// Caller context for the holder of `access_token`.
    pub async fn caller(&self, access_token: &str) -> CallerContext {
        let verified = self
            .auth
            .verify_token(access_token)
            .await
            .expect("verify token");
        let claims = verified.claims.expect("claims");
        CallerContext::from_claims(&claims, Some("127.0.0.1".into()), Some("tests".into()))
    }

    /// Register an `authen` application and return its plaintext secret.
    pub async fn register_app(&self, code: &str) -> String {
        self.registry
            .register_app(code, "Partner", "https://partner.example.com/callback", CTX_INFO_AUTHEN)
            .await
            .expect("register app")
            .app_secret
    }
}

/// Value of the `session_id` query parameter in a login redirect.
pub fn session_id_from(redirect_url: &str) -> String {
    let (_, query) = redirect_url.split_once('?').expect("query string");
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "session_id")
        .map(|(_, v)| v.into_owned())
        .expect("session_id parameter")
}
