//! Subcommand implementations.

use std::sync::Arc;

use isme_core::auth::{cipher, jwt};
use isme_core::cache::TtlCache;
use isme_core::config::AuthConfig;
use isme_core::context::CallerContext;
use isme_core::models::app::CTX_INFO_AUTHEN;
use isme_core::models::auth::LoginResponse;
use isme_core::repo::memory::{
    MemoryAppRegistryRepository, MemoryIdentityRepository, MemorySessionRepository,
};
use isme_core::service::{AppRegistryService, AuthService};
use serde_json::json;

use crate::{Error, Result};

pub fn encrypt_secret(plaintext: &str, aes_secret: &str, ctx_info: &str) -> Result<()> {
    println!("{}", cipher::encrypt(plaintext, aes_secret, ctx_info)?);
    Ok(())
}

pub fn decrypt_secret(ciphertext: &str, aes_secret: &str, ctx_info: &str) -> Result<()> {
    println!("{}", cipher::decrypt(ciphertext, aes_secret, ctx_info)?);
    Ok(())
}

pub fn inspect_token(token: &str, public_key: &str) -> Result<()> {
    let claims = jwt::verify_access(token, &public_key.replace("\\n", "\n"))?;
    let report = json!({
        "claims": claims,
        "expires_at": claims.expires_at().to_rfc3339(),
        "expired": claims.is_expired(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn step(name: &str, detail: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string(&json!({ "step": name, "result": detail }))?);
    Ok(())
}

/// Sign-up, app registration, handoff login, code exchange, refresh and
/// logout, each printed as one JSON line.
pub async fn demo() -> Result<()> {
    let config = AuthConfig::from_env()?;
    log::info!("running demo flow with {config:?}");

    let users = Arc::new(MemoryIdentityRepository::new());
    let sessions = Arc::new(MemorySessionRepository::new());
    let apps = Arc::new(MemoryAppRegistryRepository::new());
    let cache = Arc::new(TtlCache::new());

    let registry = AppRegistryService::new(&config, apps.clone());
    let auth = AuthService::new(config, users, sessions, apps, cache)?;

    let user_id = auth
        .sign_up("Demo User", "demo@example.com", "demo-password")
        .await?;
    step("sign_up", json!({ "user_id": user_id }))?;

    let app_secret = registry
        .register_app("demo", "Demo App", "https://demo.example.com/callback", CTX_INFO_AUTHEN)
        .await?
        .app_secret;
    step("register_app", json!({ "app_code": "demo" }))?;

    let redirect = auth
        .request_login("demo", &app_secret, CTX_INFO_AUTHEN)
        .await?
        .redirect_url;
    step("request_login", json!({ "redirect_url": redirect }))?;

    let session_id = redirect
        .split_once("session_id=")
        .map(|(_, code)| code.to_string())
        .ok_or_else(|| Error::Custom("redirect carries no session_id".into()))?;
    let ctx = CallerContext::with_client(Some("127.0.0.1".into()), Some("isme_cli".into()));
    let LoginResponse::Handoff {
        redirect_url,
        authorization_code,
    } = auth
        .login(&ctx, "demo@example.com", "demo-password", Some(&session_id))
        .await?
    else {
        return Err(Error::Custom("handoff login returned tokens".into()));
    };
    step("login", json!({ "redirect_url": redirect_url }))?;

    let bundle = auth.exchange_code(&authorization_code).await?;
    step("exchange_code", json!({ "expires_at": bundle.expires_at }))?;

    let verified = auth.verify_token(&bundle.access_token).await?;
    step("verify_token", json!({ "ok": verified.ok }))?;

    let rotated = auth.refresh_token(&ctx, &bundle.refresh_token).await?;
    step("refresh_token", json!({ "expires_at": rotated.expires_at }))?;

    let claims = auth
        .verify_token(&rotated.access_token)
        .await?
        .claims
        .ok_or_else(|| Error::Custom("rotated token has no session".into()))?;
    let caller = CallerContext::from_claims(&claims, ctx.client_ip.clone(), ctx.user_agent.clone());
    let me = auth.get_me(&caller).await?;
    step("get_me", serde_json::to_value(&me)?)?;

    auth.logout(&caller).await?;
    let after = auth.verify_token(&rotated.access_token).await?;
    step("logout", json!({ "ok_after_logout": after.ok }))?;

    Ok(())
}
