use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("JWT secret is not set")]
    MissingSecret,
    #[error("Invalid token format")]
    Malformed,
    #[error("Invalid signature encoding")]
    SignatureEncoding,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Invalid claims encoding")]
    ClaimsEncoding,
    #[error("Invalid claims format")]
    ClaimsFormat,
    #[error("Token expired")]
    Expired,
}

/// Verifies an HS256 token issued by the identity provider and returns the caller.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, JwtError> {
    if jwt_secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => (h, c, s),
        _ => return Err(JwtError::Malformed),
    };

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        JwtError::SignatureEncoding
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| JwtError::MissingSecret)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());
    mac.verify_slice(&signature).map_err(|_| {
        debug!("Token signature verification failed");
        JwtError::BadSignature
    })?;

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(JwtError::ClaimsEncoding)?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        JwtError::ClaimsFormat
    })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(JwtError::Expired);
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn accepts_token_signed_with_secret() {
        let user = TestUser::patient("Pat@Example.com");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.normalized_email().as_deref(), Some("pat@example.com"));
    }

    #[test]
    fn rejects_bad_tokens() {
        let user = TestUser::doctor("doc@example.com");

        assert_eq!(validate_token("a.b", SECRET).unwrap_err(), JwtError::Malformed);
        assert_eq!(
            validate_token(&JwtTestUtils::create_invalid_signature_token(&user), SECRET).unwrap_err(),
            JwtError::BadSignature
        );
        assert_eq!(
            validate_token(&JwtTestUtils::create_expired_token(&user, SECRET), SECRET).unwrap_err(),
            JwtError::Expired
        );
        assert_eq!(validate_token("x.y.z", "").unwrap_err(), JwtError::MissingSecret);
    }
}
