//! Session lifecycle manager.
//!
//! Login, token refresh, logout, password change, and the two-step handoff
//! that lets a registered application obtain a user's tokens:
//!
//! 1. The application calls [`AuthService::request_login`] with its
//!    credentials and gets a login page URL carrying a handoff code.
//! 2. The user logs in with that code; the tokens are parked in the cache
//!    behind a fresh authorization code and only the code is returned.
//! 3. The application redeems the code once with
//!    [`AuthService::exchange_code`].
//!
//! The service itself is stateless; sessions live in the repository and
//! handoff artifacts in the [`TtlCache`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::app::{SecretCheck, check_secret};
use super::{MIN_PASSWORD_LEN, exchange_code_keys, handoff_key, is_valid_email, rfc3339};
use crate::auth::hash_token;
use crate::auth::jwt::TokenKeys;
use crate::auth::password::verify_password;
use crate::cache::TtlCache;
use crate::config::AuthConfig;
use crate::context::CallerContext;
use crate::error::{AuthError, AuthResult};
use crate::ids::one_time_code;
use crate::models::app::AppService;
use crate::models::auth::{
    Claims, LoginResponse, MeResponse, NewSession, RequestLoginResponse, RotateSession,
    TokenBundle, User, VerifyTokenResponse,
};
use crate::repo::{AppRegistryRepository, IdentityRepository, RepoError, SessionRepository};

const INVALID_CREDENTIALS: &str = "invalid email or password";
const INVALID_REFRESH_TOKEN: &str = "invalid refresh token";
const INVALID_SESSION_ID: &str = "invalid session_id";
const INVALID_AUTHORIZATION_CODE: &str = "invalid authorization code";

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

/// Freshly minted access/refresh pair.
struct IssuedTokens {
    access_token: String,
    access_claims: Claims,
    refresh_token: String,
}

impl IssuedTokens {
    fn bundle(self) -> TokenBundle {
        TokenBundle {
            expires_at: rfc3339(self.access_claims.expires_at()),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// Orchestrates the authentication flows. Share behind an `Arc`.
pub struct AuthService {
    config: AuthConfig,
    keys: TokenKeys,
    users: Arc<dyn IdentityRepository>,
    sessions: Arc<dyn SessionRepository>,
    apps: Arc<dyn AppRegistryRepository>,
    cache: Arc<TtlCache>,
}

impl AuthService {
    /// Parses the key material in `config`; fails if either RSA key is
    /// malformed.
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn IdentityRepository>,
        sessions: Arc<dyn SessionRepository>,
        apps: Arc<dyn AppRegistryRepository>,
        cache: Arc<TtlCache>,
    ) -> AuthResult<Self> {
        let keys = TokenKeys::new(
            &config.access_private_key,
            &config.access_public_key,
            config.refresh_secret.as_bytes(),
        )
        .map_err(|e| AuthError::Internal(format!("token keys: {e}")))?;

        Ok(Self {
            config,
            keys,
            users,
            sessions,
            apps,
            cache,
        })
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    /// Create an active user with a password. Returns the new user id.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> AuthResult<String> {
        if name.trim().is_empty() {
            return Err(AuthError::invalid("name is required"));
        }
        if !is_valid_email(email) {
            return Err(AuthError::invalid("invalid email"));
        }
        if password.is_empty() {
            return Err(AuthError::invalid("password is required"));
        }

        let existing = self
            .users
            .get_by_email(email)
            .await
            .map_err(AuthError::collaborator("users.get_by_email"))?;
        if existing.is_some() {
            return Err(AuthError::invalid("user already exists"));
        }

        let user_id = match self.users.create_with_password(name, email, password).await {
            Ok(id) => id,
            Err(RepoError::Conflict(_)) => return Err(AuthError::invalid("user already exists")),
            Err(e) => return Err(AuthError::collaborator("users.create_with_password")(e)),
        };

        info!(user_id = %user_id, "user signed up");
        Ok(user_id)
    }

    /// Profile of the calling user.
    pub async fn get_me(&self, ctx: &CallerContext) -> AuthResult<MeResponse> {
        let user_id = ctx.require_user_id()?;
        let user = self
            .users
            .get_by_id(user_id)
            .await
            .map_err(AuthError::collaborator("users.get_by_id"))?
            .ok_or_else(|| AuthError::invalid("user not found"))?;
        let is_admin = self
            .users
            .is_admin(&user.id)
            .await
            .map_err(AuthError::collaborator("users.is_admin"))?;

        Ok(MeResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            is_admin,
        })
    }

    /// Change the caller's password and revoke every one of their sessions,
    /// including the one making this call.
    pub async fn change_password(
        &self,
        ctx: &CallerContext,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let user_id = ctx.require_user_id()?;
        if old_password.is_empty() {
            return Err(AuthError::invalid("old_password is required"));
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::invalid(format!(
                "new_password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = self
            .users
            .get_by_id(user_id)
            .await
            .map_err(AuthError::collaborator("users.get_by_id"))?
            .ok_or_else(|| AuthError::invalid("user not found"))?;
        if !user.is_active() {
            return Err(AuthError::invalid("user account is inactive"));
        }
        if !self.password_matches(&user, old_password) {
            return Err(AuthError::invalid("old password is incorrect"));
        }

        if new_password != old_password {
            self.users
                .set_password(&user.id, new_password)
                .await
                .map_err(AuthError::collaborator("users.set_password"))?;
        }
        self.sessions
            .inactivate_all_for_user(&user.id)
            .await
            .map_err(AuthError::collaborator("sessions.inactivate_all_for_user"))?;

        info!(user_id = %user.id, "password changed, all sessions revoked");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Authenticate with email and password.
    ///
    /// Without a handoff code the tokens are returned directly. With one,
    /// the tokens are parked behind a new authorization code and only the
    /// application's redirect URL and that code are returned. A failed
    /// login does not consume the handoff code.
    pub async fn login(
        &self,
        ctx: &CallerContext,
        email: &str,
        password: &str,
        handoff_code: Option<&str>,
    ) -> AuthResult<LoginResponse> {
        let handoff = match handoff_code.filter(|c| !c.is_empty()) {
            Some(code) => Some((code, self.resolve_handoff(code).await?)),
            None => None,
        };

        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::invalid(INVALID_CREDENTIALS));
        }
        let user = self
            .users
            .get_by_email(email)
            .await
            .map_err(AuthError::collaborator("users.get_by_email"))?
            .filter(User::is_active)
            .ok_or_else(|| AuthError::invalid(INVALID_CREDENTIALS))?;
        if !self.password_matches(&user, password) {
            debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::invalid(INVALID_CREDENTIALS));
        }

        // Single use: of two logins racing on one handoff code, one wins.
        if let Some((code, _)) = &handoff
            && self.cache.take(&handoff_key(code)).is_none()
        {
            return Err(AuthError::invalid(INVALID_SESSION_ID));
        }

        let tokens = self.issue_tokens(&user)?;
        let session = self
            .sessions
            .create(NewSession {
                user_id: user.id.clone(),
                token_id: tokens.access_claims.jti.clone(),
                email: user.email.clone(),
                refresh_token_hash: hash_token(&tokens.refresh_token),
                expires_at: tokens.access_claims.expires_at(),
                client_ip: ctx.client_ip.clone(),
                user_agent: ctx.user_agent.clone(),
            })
            .await
            .map_err(AuthError::collaborator("sessions.create"))?;
        self.users
            .update_last_login(&user.id)
            .await
            .map_err(AuthError::collaborator("users.update_last_login"))?;

        info!(user_id = %user.id, session_id = %session.id, "user logged in");

        let Some((_, app)) = handoff else {
            return Ok(LoginResponse::Tokens(tokens.bundle()));
        };

        let authorization_code = one_time_code();
        let keys = exchange_code_keys(&authorization_code);
        let ttl = self.config.exchange_code_ttl;
        let bundle = tokens.bundle();
        // Gate key last so a concurrent exchange never sees a partial bundle.
        self.cache.set(keys.refresh_token, bundle.refresh_token, ttl);
        self.cache.set(keys.expires_at, bundle.expires_at, ttl);
        self.cache.set(keys.access_token, bundle.access_token, ttl);

        info!(user_id = %user.id, app_code = %app.code, "handoff login completed");
        Ok(LoginResponse::Handoff {
            redirect_url: app.redirect_url,
            authorization_code,
        })
    }

    /// Rotate a session's credentials. The presented refresh token is
    /// spent: presenting it again fails.
    pub async fn refresh_token(
        &self,
        ctx: &CallerContext,
        refresh_token: &str,
    ) -> AuthResult<TokenBundle> {
        let reject = || AuthError::invalid(INVALID_REFRESH_TOKEN);
        if refresh_token.is_empty() {
            return Err(AuthError::invalid("refresh_token is required"));
        }

        let claims = self.keys.verify_refresh(refresh_token).map_err(|_| reject())?;
        if claims.is_expired() {
            return Err(reject());
        }

        let presented_hash = hash_token(refresh_token);
        let session = self
            .sessions
            .find_by_refresh_token_hash(&presented_hash)
            .await
            .map_err(AuthError::collaborator("sessions.find_by_refresh_token_hash"))?
            .filter(|s| s.is_active() && s.user_id == claims.uid)
            .ok_or_else(reject)?;
        let user = self
            .users
            .get_by_id(&session.user_id)
            .await
            .map_err(AuthError::collaborator("users.get_by_id"))?
            .filter(User::is_active)
            .ok_or_else(reject)?;

        let tokens = self.issue_tokens(&user)?;
        let rotated = self
            .sessions
            .rotate(
                RotateSession {
                    session_id: session.id.clone(),
                    token_id: tokens.access_claims.jti.clone(),
                    refresh_token_hash: hash_token(&tokens.refresh_token),
                    expires_at: tokens.access_claims.expires_at(),
                    client_ip: ctx.client_ip.clone(),
                    user_agent: ctx.user_agent.clone(),
                },
                &presented_hash,
            )
            .await
            .map_err(AuthError::collaborator("sessions.rotate"))?;
        if !rotated {
            warn!(session_id = %session.id, "refresh token already spent");
            return Err(reject());
        }

        debug!(session_id = %session.id, "session rotated");
        Ok(tokens.bundle())
    }

    /// Check an access token against its session.
    ///
    /// A token that does not verify, or has expired, is an error. A valid
    /// token whose session is gone, revoked or past expiry answers
    /// `ok = false`.
    pub async fn verify_token(&self, access_token: &str) -> AuthResult<VerifyTokenResponse> {
        if access_token.is_empty() {
            return Err(AuthError::invalid("token is required"));
        }
        let claims = self
            .keys
            .verify_access(access_token)
            .map_err(|_| AuthError::invalid("invalid token"))?;
        if claims.is_expired() {
            return Err(AuthError::invalid("invalid token"));
        }

        let session = self
            .sessions
            .find_by_token_id(claims.token_id())
            .await
            .map_err(AuthError::collaborator("sessions.find_by_token_id"))?;
        match session {
            Some(s) if s.is_active() && !s.is_expired() => Ok(VerifyTokenResponse::valid(claims)),
            _ => Ok(VerifyTokenResponse::rejected()),
        }
    }

    /// Revoke the caller's current session.
    pub async fn logout(&self, ctx: &CallerContext) -> AuthResult<()> {
        let user_id = ctx.require_user_id()?;
        let token_id = ctx.require_token_id()?;

        let session = self
            .sessions
            .find_by_token_id(token_id)
            .await
            .map_err(AuthError::collaborator("sessions.find_by_token_id"))?;
        match session {
            None => {
                debug!(user_id, "logout for unknown session");
                return Ok(());
            }
            Some(s) if s.user_id != user_id => {
                return Err(AuthError::unauthorized("session does not belong to caller"));
            }
            Some(_) => {}
        }

        self.sessions
            .inactivate_by_token_id(token_id)
            .await
            .map_err(AuthError::collaborator("sessions.inactivate_by_token_id"))?;
        info!(user_id, "user logged out");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cross-application handoff
    // -----------------------------------------------------------------------

    /// Authenticate a registered application and hand it a login page URL
    /// carrying a short-lived handoff code.
    pub async fn request_login(
        &self,
        app_code: &str,
        app_secret: &str,
        ctx_info: &str,
    ) -> AuthResult<RequestLoginResponse> {
        for (value, field) in [
            (app_code, "app_code"),
            (app_secret, "app_secret"),
            (ctx_info, "ctx_info"),
        ] {
            if value.is_empty() {
                return Err(AuthError::invalid(format!("{field} is required")));
            }
        }

        let app = self
            .apps
            .get_by_code(app_code)
            .await
            .map_err(AuthError::collaborator("apps.get_by_code"))?
            .filter(AppService::is_active)
            .ok_or_else(|| AuthError::invalid("app service not found"))?;
        if app.ctx_info != ctx_info {
            return Err(AuthError::invalid("invalid ctx_info"));
        }
        if check_secret(&app, app_secret, &self.config.aes_secret) != SecretCheck::Match {
            return Err(AuthError::invalid("invalid app_secret"));
        }

        let code = one_time_code();
        self.cache
            .set(handoff_key(&code), app.id.clone(), self.config.login_session_ttl);

        debug!(app_code, "login handoff issued");
        Ok(RequestLoginResponse {
            redirect_url: self.login_redirect(&code),
        })
    }

    /// Redeem an authorization code for the parked token bundle. Succeeds
    /// at most once per code.
    pub async fn exchange_code(&self, authorization_code: &str) -> AuthResult<TokenBundle> {
        if authorization_code.is_empty() {
            return Err(AuthError::invalid("authorization_code is required"));
        }
        let keys = exchange_code_keys(authorization_code);

        let access_token = self
            .cache
            .take(&keys.access_token)
            .ok_or_else(|| AuthError::invalid(INVALID_AUTHORIZATION_CODE))?;
        let refresh_token = self.cache.take(&keys.refresh_token);
        let expires_at = self.cache.take(&keys.expires_at);

        match (refresh_token, expires_at) {
            (Some(refresh_token), Some(expires_at)) => Ok(TokenBundle {
                access_token,
                refresh_token,
                expires_at,
            }),
            _ => Err(AuthError::invalid(INVALID_AUTHORIZATION_CODE)),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// App service behind a live handoff code. Does not consume the code.
    async fn resolve_handoff(&self, code: &str) -> AuthResult<AppService> {
        let app_id = self
            .cache
            .get(&handoff_key(code))
            .ok_or_else(|| AuthError::invalid(INVALID_SESSION_ID))?;
        self.apps
            .get_by_id(&app_id)
            .await
            .map_err(AuthError::collaborator("apps.get_by_id"))?
            .ok_or_else(|| AuthError::invalid(INVALID_SESSION_ID))
    }

    fn password_matches(&self, user: &User, password: &str) -> bool {
        match verify_password(password, &user.password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "stored password hash unusable");
                false
            }
        }
    }

    fn issue_tokens(&self, user: &User) -> AuthResult<IssuedTokens> {
        let (access_token, access_claims) = self
            .keys
            .issue_access(&user.id, &user.email, ttl_secs(self.config.access_token_ttl))
            .map_err(AuthError::collaborator("jwt.issue_access"))?;
        let (refresh_token, _) = self
            .keys
            .issue_refresh(&user.id, &user.email, ttl_secs(self.config.refresh_token_ttl))
            .map_err(AuthError::collaborator("jwt.issue_refresh"))?;
        Ok(IssuedTokens {
            access_token,
            access_claims,
            refresh_token,
        })
    }

    fn login_redirect(&self, code: &str) -> String {
        let base = &self.config.login_page_url;
        let separator = if base.contains('?') { '&' } else { '?' };
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("session_id", code)
            .finish();
        format!("{base}{separator}{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoResult;
    use crate::repo::memory::{
        MemoryAppRegistryRepository, MemoryIdentityRepository, MemorySessionRepository,
    };

    const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/access_private.pem");
    const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/access_public.pem");

    fn config(login_page_url: &str) -> AuthConfig {
        AuthConfig {
            access_private_key: PRIVATE_PEM.into(),
            access_public_key: PUBLIC_PEM.into(),
            refresh_secret: "unit-refresh-secret".into(),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(3600),
            login_session_ttl: Duration::from_secs(300),
            exchange_code_ttl: Duration::from_secs(60),
            login_page_url: login_page_url.into(),
            aes_secret: "unit-aes".into(),
        }
    }

    fn service(login_page_url: &str) -> AuthService {
        AuthService::new(
            config(login_page_url),
            Arc::new(MemoryIdentityRepository::new()),
            Arc::new(MemorySessionRepository::new()),
            Arc::new(MemoryAppRegistryRepository::new()),
            Arc::new(TtlCache::new()),
        )
        .unwrap()
    }

    #[test]
    fn malformed_keys_fail_construction() {
        let mut cfg = config("/auth/login");
        cfg.access_public_key = "not a key".into();
        let result = AuthService::new(
            cfg,
            Arc::new(MemoryIdentityRepository::new()),
            Arc::new(MemorySessionRepository::new()),
            Arc::new(MemoryAppRegistryRepository::new()),
            Arc::new(TtlCache::new()),
        );
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[test]
    fn redirect_appends_session_id() {
        assert_eq!(
            service("/auth/login").login_redirect("abc"),
            "/auth/login?session_id=abc"
        );
        assert_eq!(
            service("https://sso.example.com/login?lang=en").login_redirect("abc"),
            "https://sso.example.com/login?lang=en&session_id=abc"
        );
    }

    #[tokio::test]
    async fn sign_up_validates_input() {
        let svc = service("/auth/login");
        let cases = [
            ("", "a@b.com", "secret1", "name is required"),
            ("A", "not-an-email", "secret1", "invalid email"),
            ("A", "a@b.com", "", "password is required"),
        ];
        for (name, email, password, msg) in cases {
            let err = svc.sign_up(name, email, password).await.unwrap_err();
            assert_eq!(err.to_string(), msg);
        }
    }

    /// Users store that only supports the single-write sign-up path.
    struct SingleWriteUsers(MemoryIdentityRepository);

    #[async_trait::async_trait]
    impl IdentityRepository for SingleWriteUsers {
        async fn create(&self, _: &str, _: &str) -> RepoResult<String> {
            Err(RepoError::Unavailable("create without password".into()))
        }

        async fn create_with_password(
            &self,
            name: &str,
            email: &str,
            password: &str,
        ) -> RepoResult<String> {
            self.0.create_with_password(name, email, password).await
        }

        async fn get_by_id(&self, id: &str) -> RepoResult<Option<User>> {
            self.0.get_by_id(id).await
        }

        async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            self.0.get_by_email(email).await
        }

        async fn set_password(&self, _: &str, _: &str) -> RepoResult<()> {
            Err(RepoError::Unavailable("set_password".into()))
        }

        async fn update_last_login(&self, id: &str) -> RepoResult<()> {
            self.0.update_last_login(id).await
        }

        async fn is_admin(&self, id: &str) -> RepoResult<bool> {
            self.0.is_admin(id).await
        }

        async fn promote_admin(&self, id: &str) -> RepoResult<()> {
            self.0.promote_admin(id).await
        }
    }

    #[tokio::test]
    async fn sign_up_stores_user_and_password_in_one_write() {
        let svc = AuthService::new(
            config("/auth/login"),
            Arc::new(SingleWriteUsers(MemoryIdentityRepository::new())),
            Arc::new(MemorySessionRepository::new()),
            Arc::new(MemoryAppRegistryRepository::new()),
            Arc::new(TtlCache::new()),
        )
        .unwrap();

        svc.sign_up("A", "a@b.com", "secret1").await.unwrap();
        let resp = svc
            .login(&CallerContext::anonymous(), "a@b.com", "secret1", None)
            .await
            .unwrap();
        assert!(matches!(resp, LoginResponse::Tokens(_)));
    }

    #[tokio::test]
    async fn login_errors_are_generic() {
        let svc = service("/auth/login");
        svc.sign_up("A", "a@b.com", "secret1").await.unwrap();
        let ctx = CallerContext::anonymous();

        for (email, password) in [("a@b.com", "wrong"), ("nobody@b.com", "secret1"), ("", "")] {
            let err = svc.login(&ctx, email, password, None).await.unwrap_err();
            assert_eq!(err.to_string(), INVALID_CREDENTIALS);
        }
    }

    #[tokio::test]
    async fn login_with_unknown_handoff_code_fails() {
        let svc = service("/auth/login");
        svc.sign_up("A", "a@b.com", "secret1").await.unwrap();
        let err = svc
            .login(&CallerContext::anonymous(), "a@b.com", "secret1", Some("bogus"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_SESSION_ID);
    }

    #[tokio::test]
    async fn exchange_rejects_empty_and_unknown_codes() {
        let svc = service("/auth/login");
        assert_eq!(
            svc.exchange_code("").await.unwrap_err().to_string(),
            "authorization_code is required"
        );
        assert_eq!(
            svc.exchange_code("unknown").await.unwrap_err().to_string(),
            INVALID_AUTHORIZATION_CODE
        );
    }

    #[tokio::test]
    async fn anonymous_callers_are_unauthorized() {
        let svc = service("/auth/login");
        let ctx = CallerContext::anonymous();
        assert!(matches!(svc.logout(&ctx).await, Err(AuthError::Unauthorized(_))));
        assert!(matches!(svc.get_me(&ctx).await, Err(AuthError::Unauthorized(_))));
        assert!(matches!(
            svc.change_password(&ctx, "secret1", "secret2").await,
            Err(AuthError::Unauthorized(_))
        ));
    }
}
