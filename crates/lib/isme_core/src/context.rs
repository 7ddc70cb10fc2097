//! Per-call caller identity and client metadata.

use crate::error::{AuthError, AuthResult};
use crate::models::auth::Claims;

/// Who is calling and from where. Every field is optional; operations that
/// need an identity check for it explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub token_id: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Unauthenticated caller with known client metadata.
    pub fn with_client(client_ip: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            client_ip,
            user_agent,
            ..Self::default()
        }
    }

    /// Authenticated caller whose access token produced `claims`.
    pub fn from_claims(
        claims: &Claims,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            user_id: Some(claims.uid.clone()),
            email: Some(claims.email.clone()),
            token_id: Some(claims.jti.clone()),
            client_ip,
            user_agent,
        }
    }

    pub fn require_user_id(&self) -> AuthResult<&str> {
        non_empty(self.user_id.as_deref()).ok_or_else(|| AuthError::unauthorized("missing user"))
    }

    pub fn require_token_id(&self) -> AuthResult<&str> {
        non_empty(self.token_id.as_deref()).ok_or_else(|| AuthError::unauthorized("missing token"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_identity() {
        let ctx = CallerContext::anonymous();
        assert!(matches!(ctx.require_user_id(), Err(AuthError::Unauthorized(_))));
        assert!(ctx.require_token_id().is_err());
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let ctx = CallerContext {
            user_id: Some(String::new()),
            ..CallerContext::default()
        };
        assert!(ctx.require_user_id().is_err());
    }

    #[test]
    fn from_claims_carries_identity() {
        let claims = Claims::new("u1", "a@b.com", 60).unwrap();
        let ctx = CallerContext::from_claims(&claims, Some("10.0.0.1".into()), None);
        assert_eq!(ctx.require_user_id().unwrap(), "u1");
        assert_eq!(ctx.require_token_id().unwrap(), claims.jti);
        assert_eq!(ctx.email.as_deref(), Some("a@b.com"));
        assert_eq!(ctx.client_ip.as_deref(), Some("10.0.0.1"));
    }
}
