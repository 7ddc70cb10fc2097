//! Registration and authentication of external applications.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::auth::cipher::{decrypt, encrypt, generate_secret};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::models::app::{
    ALLOWED_CTX_INFOS, AppSecretResponse, AppService, NewAppService, VerifyAppResponse,
};
use crate::repo::{AppRegistryRepository, RepoError};

/// Outcome of comparing a presented secret with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SecretCheck {
    Match,
    Mismatch,
    /// Stored ciphertext does not open under the app's context.
    Undecryptable,
}

/// Decrypt the stored secret under the app's own context and compare it
/// with `presented` in constant time.
pub(crate) fn check_secret(app: &AppService, presented: &str, aes_secret: &str) -> SecretCheck {
    match decrypt(&app.secret_ciphertext, aes_secret, &app.ctx_info) {
        Ok(stored) => {
            if bool::from(stored.as_bytes().ct_eq(presented.as_bytes())) {
                SecretCheck::Match
            } else {
                SecretCheck::Mismatch
            }
        }
        Err(e) => {
            warn!(app_code = %app.code, error = %e, "stored app secret does not decrypt");
            SecretCheck::Undecryptable
        }
    }
}

fn require(value: &str, field: &str) -> AuthResult<()> {
    if value.trim().is_empty() {
        return Err(AuthError::invalid(format!("{field} is required")));
    }
    Ok(())
}

/// Manages registered applications and their secrets.
pub struct AppRegistryService {
    apps: Arc<dyn AppRegistryRepository>,
    aes_secret: String,
}

impl AppRegistryService {
    pub fn new(config: &AuthConfig, apps: Arc<dyn AppRegistryRepository>) -> Self {
        Self {
            apps,
            aes_secret: config.aes_secret.clone(),
        }
    }

    /// Register an application. The plaintext secret is returned once and
    /// only its ciphertext is stored.
    pub async fn register_app(
        &self,
        app_code: &str,
        app_name: &str,
        redirect_url: &str,
        ctx_info: &str,
    ) -> AuthResult<AppSecretResponse> {
        require(app_code, "app_code")?;
        require(app_name, "app_name")?;
        require(redirect_url, "redirect_url")?;
        require(ctx_info, "ctx_info")?;

        if url::Url::parse(redirect_url).is_err() {
            return Err(AuthError::invalid("invalid redirect_url"));
        }
        if !ALLOWED_CTX_INFOS.contains(&ctx_info) {
            return Err(AuthError::invalid("invalid ctx_info"));
        }

        let existing = self
            .apps
            .get_by_code(app_code)
            .await
            .map_err(AuthError::collaborator("apps.get_by_code"))?;
        if existing.is_some() {
            return Err(AuthError::invalid("app_code already exists"));
        }

        let app_secret = generate_secret();
        let secret_ciphertext = encrypt(&app_secret, &self.aes_secret, ctx_info)
            .map_err(AuthError::collaborator("cipher.encrypt"))?;

        let id = match self
            .apps
            .create(NewAppService {
                code: app_code.to_string(),
                name: app_name.to_string(),
                secret_ciphertext,
                redirect_url: redirect_url.to_string(),
                ctx_info: ctx_info.to_string(),
            })
            .await
        {
            Ok(id) => id,
            // Lost a race with a concurrent registration of the same code.
            Err(RepoError::Conflict(_)) => {
                return Err(AuthError::invalid("app_code already exists"));
            }
            Err(e) => return Err(AuthError::collaborator("apps.create")(e)),
        };

        info!(app_id = %id, app_code, ctx_info, "app service registered");
        Ok(AppSecretResponse { app_secret })
    }

    /// Check an application's credentials.
    ///
    /// Unknown code, context mismatch and an undecryptable stored secret all
    /// answer `ok = false`; a wrong secret is an error.
    pub async fn verify_app(
        &self,
        app_code: &str,
        app_secret: &str,
        ctx_info: &str,
    ) -> AuthResult<VerifyAppResponse> {
        require(app_code, "app_code")?;
        require(ctx_info, "ctx_info")?;
        require(app_secret, "app_secret")?;

        let Some(app) = self
            .apps
            .get_by_code(app_code)
            .await
            .map_err(AuthError::collaborator("apps.get_by_code"))?
        else {
            return Ok(VerifyAppResponse { ok: false });
        };
        if app.ctx_info != ctx_info {
            return Ok(VerifyAppResponse { ok: false });
        }

        match check_secret(&app, app_secret, &self.aes_secret) {
            SecretCheck::Match => Ok(VerifyAppResponse { ok: app.is_active() }),
            SecretCheck::Undecryptable => Ok(VerifyAppResponse { ok: false }),
            SecretCheck::Mismatch => {
                debug!(app_code, "app secret mismatch");
                Err(AuthError::invalid("invalid app_secret"))
            }
        }
    }

    /// Replace an application's secret after authenticating with the
    /// current one. Returns the new plaintext secret.
    pub async fn refresh_app_secret(
        &self,
        app_code: &str,
        app_secret: &str,
        ctx_info: &str,
    ) -> AuthResult<AppSecretResponse> {
        require(app_code, "app_code")?;
        require(app_secret, "app_secret")?;
        require(ctx_info, "ctx_info")?;

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
        if check_secret(&app, app_secret, &self.aes_secret) != SecretCheck::Match {
            return Err(AuthError::invalid("invalid app_secret"));
        }

        let new_secret = generate_secret();
        let ciphertext = encrypt(&new_secret, &self.aes_secret, &app.ctx_info)
            .map_err(AuthError::collaborator("cipher.encrypt"))?;
        self.apps
            .update_secret(&app.id, &ciphertext)
            .await
            .map_err(AuthError::collaborator("apps.update_secret"))?;

        info!(app_id = %app.id, app_code, "app secret rotated");
        Ok(AppSecretResponse {
            app_secret: new_secret,
        })
    }
}
