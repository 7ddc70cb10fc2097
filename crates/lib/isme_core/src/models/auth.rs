//! Authentication domain models.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::TokenError;
use crate::ids::new_id;

/// Account status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Terminated,
}

/// Domain user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// bcrypt hash; empty until a password has been set.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: UserStatus,
    pub is_admin: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Session status. `Active -> Inactive` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
}

/// One login event, bound to the token id of the access token currently
/// issued for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub token_id: String,
    /// SHA-256 hex digest of the current refresh token.
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Insert payload for a new session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub token_id: String,
    pub email: String,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// In-place rotation of an existing session row.
#[derive(Debug, Clone)]
pub struct RotateSession {
    pub session_id: String,
    pub token_id: String,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Claims embedded in both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token id, unique per issuance. Correlates an access token to a session.
    pub jti: String,
    /// User id.
    pub uid: String,
    pub email: String,
    /// Expiry (unix timestamp, seconds).
    pub exp: i64,
}

impl Claims {
    /// Fresh claims with a new token id, expiring `ttl_secs` from now.
    ///
    /// Fails when the expiry falls outside the representable date range.
    pub fn new(user_id: &str, email: &str, ttl_secs: i64) -> Result<Self, TokenError> {
        let exp = TimeDelta::try_seconds(ttl_secs)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| TokenError::Signing("token lifetime out of range".into()))?;
        Ok(Self {
            jti: new_id(),
            uid: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
        })
    }

    pub fn token_id(&self) -> &str {
        &self.jti
    }

    pub fn user_id(&self) -> &str {
        &self.uid
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Access token, refresh token and the access token's expiry (RFC 3339).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
}

/// Result of a successful login.
///
/// A login started from an external application's handoff never carries the
/// tokens themselves; the application redeems the authorization code instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Tokens(TokenBundle),
    Handoff {
        redirect_url: String,
        authorization_code: String,
    },
}

/// Answer to a token verification query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
}

impl VerifyTokenResponse {
    pub fn valid(claims: Claims) -> Self {
        Self {
            ok: true,
            claims: Some(claims),
        }
    }

    pub fn rejected() -> Self {
        Self {
            ok: false,
            claims: None,
        }
    }
}

/// Redirect to the shared login page carrying a handoff code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLoginResponse {
    pub redirect_url: String,
}

/// Profile of the calling user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_expiry_is_derived_from_exp() {
        let claims = Claims::new("u1", "a@b.com", 60).unwrap();
        assert!(!claims.is_expired());
        assert_eq!(claims.expires_at().timestamp(), claims.exp);

        let stale = Claims::new("u1", "a@b.com", -1).unwrap();
        assert!(stale.is_expired());
    }

    #[test]
    fn claims_reject_unrepresentable_expiry() {
        assert!(Claims::new("u1", "a@b.com", i64::MAX).is_err());
        assert!(Claims::new("u1", "a@b.com", i64::MIN).is_err());
    }

    #[test]
    fn claims_get_fresh_token_ids() {
        let a = Claims::new("u1", "a@b.com", 60).unwrap();
        let b = Claims::new("u1", "a@b.com", 60).unwrap();
        assert_ne!(a.token_id(), b.token_id());
        assert_eq!(a.user_id(), "u1");
    }

    #[test]
    fn login_response_serializes_without_mixing_shapes() {
        let handoff = LoginResponse::Handoff {
            redirect_url: "https://app.example.com/cb".into(),
            authorization_code: "code".into(),
        };
        let json = serde_json::to_value(&handoff).unwrap();
        assert!(json.get("access_token").is_none());
        assert_eq!(json["authorization_code"], "code");
    }

    #[test]
    fn rejected_verification_has_no_claims() {
        let json = serde_json::to_value(VerifyTokenResponse::rejected()).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": false }));
    }
}
