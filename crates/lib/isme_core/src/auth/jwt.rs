//! JWT token generation and verification.
//!
//! Access tokens are RS256 (private key signs, public key verifies). Refresh
//! tokens are HS256 under a separate shared secret, so neither class can be
//! forged from the other's key material. Verification pins the algorithm and
//! leaves expiry to the caller via [`Claims::is_expired`].

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use super::TokenError;
use crate::models::auth::Claims;

const ACCESS_ALGORITHM: Algorithm = Algorithm::RS256;
const REFRESH_ALGORITHM: Algorithm = Algorithm::HS256;

/// Sign `claims` with `algorithm`.
fn sign(claims: &Claims, algorithm: Algorithm, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(algorithm), claims, key)
        .map_err(|e| TokenError::Signing(format!("jwt encode: {e}")))
}

/// Decode and check the signature. The header algorithm must equal
/// `algorithm` exactly; `exp` must be present but is not enforced.
fn verify(token: &str, algorithm: Algorithm, key: &DecodingKey) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp"]);
    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, ?algorithm, "token rejected");
            TokenError::InvalidToken
        })
}

fn rsa_encoding_key(private_key_pem: &str) -> Result<EncodingKey, TokenError> {
    EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| TokenError::Signing(format!("rsa private key: {e}")))
}

fn rsa_decoding_key(public_key_pem: &str) -> Result<DecodingKey, TokenError> {
    DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| TokenError::InvalidKey(format!("rsa public key: {e}")))
}

/// Issue an RS256 access token valid for `ttl_secs`.
pub fn issue_access(
    user_id: &str,
    email: &str,
    private_key_pem: &str,
    ttl_secs: i64,
) -> Result<(String, Claims), TokenError> {
    let key = rsa_encoding_key(private_key_pem)?;
    let claims = Claims::new(user_id, email, ttl_secs)?;
    Ok((sign(&claims, ACCESS_ALGORITHM, &key)?, claims))
}

/// Issue an HS256 refresh token valid for `ttl_secs`.
pub fn issue_refresh(
    user_id: &str,
    email: &str,
    shared_secret: &[u8],
    ttl_secs: i64,
) -> Result<(String, Claims), TokenError> {
    let claims = Claims::new(user_id, email, ttl_secs)?;
    let token = sign(
        &claims,
        REFRESH_ALGORITHM,
        &EncodingKey::from_secret(shared_secret),
    )?;
    Ok((token, claims))
}

/// Verify an access token against the RS256 public key.
pub fn verify_access(token: &str, public_key_pem: &str) -> Result<Claims, TokenError> {
    verify(token, ACCESS_ALGORITHM, &rsa_decoding_key(public_key_pem)?)
}

/// Verify a refresh token against the HS256 shared secret.
pub fn verify_refresh(token: &str, shared_secret: &[u8]) -> Result<Claims, TokenError> {
    verify(
        token,
        REFRESH_ALGORITHM,
        &DecodingKey::from_secret(shared_secret),
    )
}

/// Pre-parsed key material for both token classes.
///
/// Same semantics as the free functions, without re-parsing PEM on every
/// request.
#[derive(Clone)]
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(
        access_private_key_pem: &str,
        access_public_key_pem: &str,
        refresh_secret: &[u8],
    ) -> Result<Self, TokenError> {
        Ok(Self {
            access_encoding: rsa_encoding_key(access_private_key_pem)?,
            access_decoding: rsa_decoding_key(access_public_key_pem)?,
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
        })
    }

    pub fn issue_access(
        &self,
        user_id: &str,
        email: &str,
        ttl_secs: i64,
    ) -> Result<(String, Claims), TokenError> {
        let claims = Claims::new(user_id, email, ttl_secs)?;
        Ok((sign(&claims, ACCESS_ALGORITHM, &self.access_encoding)?, claims))
    }

    pub fn issue_refresh(
        &self,
        user_id: &str,
        email: &str,
        ttl_secs: i64,
    ) -> Result<(String, Claims), TokenError> {
        let claims = Claims::new(user_id, email, ttl_secs)?;
        Ok((sign(&claims, REFRESH_ALGORITHM, &self.refresh_encoding)?, claims))
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, ACCESS_ALGORITHM, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, REFRESH_ALGORITHM, &self.refresh_decoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/access_private.pem");
    const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/access_public.pem");
    const OTHER_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/other_private.pem");
    const OTHER_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/other_public.pem");
    const REFRESH_SECRET: &[u8] = b"refresh-secret-for-tests";

    #[test]
    fn access_token_verifies_with_matching_public_key() {
        let (token, claims) = issue_access("u1", "a@b.com", PRIVATE_PEM, 60).unwrap();
        let verified = verify_access(&token, PUBLIC_PEM).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.uid, "u1");
        assert!(!verified.is_expired());
    }

    #[test]
    fn pkcs8_private_key_is_accepted() {
        let (token, _) = issue_access("u1", "a@b.com", OTHER_PRIVATE_PEM, 60).unwrap();
        assert!(verify_access(&token, OTHER_PUBLIC_PEM).is_ok());
    }

    #[test]
    fn access_token_rejected_by_foreign_public_key() {
        let (token, _) = issue_access("u1", "a@b.com", PRIVATE_PEM, 60).unwrap();
        assert!(matches!(
            verify_access(&token, OTHER_PUBLIC_PEM),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn malformed_private_key_is_a_signing_error() {
        assert!(matches!(
            issue_access("u1", "a@b.com", "not a pem", 60),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn lifetime_past_date_range_is_a_signing_error() {
        assert!(matches!(
            issue_refresh("u1", "a@b.com", REFRESH_SECRET, i64::MAX),
            Err(TokenError::Signing(_))
        ));
        let keys = TokenKeys::new(PRIVATE_PEM, PUBLIC_PEM, REFRESH_SECRET).unwrap();
        assert!(matches!(
            keys.issue_access("u1", "a@b.com", i64::MAX / 1_000),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn expired_token_still_decodes_and_reports_expiry() {
        let (token, _) = issue_access("u1", "a@b.com", PRIVATE_PEM, -120).unwrap();
        let claims = verify_access(&token, PUBLIC_PEM).unwrap();
        assert!(claims.is_expired());
    }

    #[test]
    fn hs256_token_signed_with_public_key_is_rejected() {
        let claims = Claims::new("u1", "a@b.com", 60).unwrap();
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(PUBLIC_PEM.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_access(&forged, PUBLIC_PEM),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn unsigned_token_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = Claims::new("u1", "a@b.com", 60).unwrap();
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let token = format!("{header}.{body}.");
        assert!(verify_access(&token, PUBLIC_PEM).is_err());
        assert!(verify_refresh(&token, REFRESH_SECRET).is_err());
    }

    #[test]
    fn token_classes_are_not_interchangeable() {
        let (access, _) = issue_access("u1", "a@b.com", PRIVATE_PEM, 60).unwrap();
        let (refresh, _) = issue_refresh("u1", "a@b.com", REFRESH_SECRET, 60).unwrap();
        assert!(verify_refresh(&access, REFRESH_SECRET).is_err());
        assert!(verify_access(&refresh, PUBLIC_PEM).is_err());
    }

    #[test]
    fn refresh_token_requires_the_same_secret() {
        let (token, claims) = issue_refresh("u1", "a@b.com", REFRESH_SECRET, 60).unwrap();
        assert_eq!(verify_refresh(&token, REFRESH_SECRET).unwrap(), claims);
        assert!(verify_refresh(&token, b"another-secret").is_err());
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            verify_refresh("a.b.c", REFRESH_SECRET),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn token_keys_match_free_functions() {
        let keys = TokenKeys::new(PRIVATE_PEM, PUBLIC_PEM, REFRESH_SECRET).unwrap();
        let (access, claims) = keys.issue_access("u1", "a@b.com", 60).unwrap();
        assert_eq!(verify_access(&access, PUBLIC_PEM).unwrap(), claims);
        let (refresh, _) = keys.issue_refresh("u1", "a@b.com", 60).unwrap();
        assert!(verify_refresh(&refresh, REFRESH_SECRET).is_ok());
        assert!(keys.verify_access(&refresh).is_err());
    }

    #[test]
    fn token_keys_reject_bad_public_key() {
        assert!(matches!(
            TokenKeys::new(PRIVATE_PEM, "nope", REFRESH_SECRET),
            Err(TokenError::InvalidKey(_))
        ));
    }
}
