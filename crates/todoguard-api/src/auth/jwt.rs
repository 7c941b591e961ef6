//! JWT token generation and validation
//!
//! Access and refresh tokens are both HS256 JWTs carrying the user id, but
//! they are signed with different secrets and expire on different schedules.
//! A token minted for one kind never validates as the other.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use todoguard_core::AuthConfig;
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub id: Uuid,
    /// Random token ID; keeps tokens minted in the same second distinct
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

/// Which secret/expiry pair a token uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token lifetime in seconds
    pub access_expiration_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_expiration_secs: u64,
}

impl JwtConfig {
    pub fn from_auth_config(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.jwt_access_secret.clone(),
            refresh_secret: config.jwt_refresh_secret.clone(),
            access_expiration_secs: config.access_expiration_secs,
            refresh_expiration_secs: config.refresh_expiration_secs,
        }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.access_secret.as_bytes(),
            TokenKind::Refresh => self.refresh_secret.as_bytes(),
        }
    }

    fn expiration_secs(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_expiration_secs,
            TokenKind::Refresh => self.refresh_expiration_secs,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from_auth_config(&AuthConfig::default())
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_expiration_secs", &self.access_expiration_secs)
            .field("refresh_expiration_secs", &self.refresh_expiration_secs)
            .finish_non_exhaustive()
    }
}

/// Generate a signed token of the given kind for `user_id`
pub fn generate_token(
    config: &JwtConfig,
    kind: TokenKind,
    user_id: Uuid,
) -> Result<String, JwtError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let claims = Claims {
        id: user_id,
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + config.expiration_secs(kind),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret(kind)),
    )?;

    Ok(token)
}

/// Validate a token of the given kind and extract its claims
pub fn validate_token(config: &JwtConfig, kind: TokenKind, token: &str) -> Result<Claims, JwtError> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret(kind)),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_validate_token() {
        let config = JwtConfig::default();
        let user_id = Uuid::new_v4();

        let token = generate_token(&config, TokenKind::Access, user_id)
            .expect("Failed to generate token");
        let claims =
            validate_token(&config, TokenKind::Access, &token).expect("Failed to validate token");

        assert_eq!(claims.id, user_id);
        assert_eq!(claims.exp - claims.iat, config.access_expiration_secs);
    }

    #[test]
    fn test_access_and_refresh_secrets_are_not_interchangeable() {
        let config = JwtConfig::default();
        let user_id = Uuid::new_v4();

        let access = generate_token(&config, TokenKind::Access, user_id).unwrap();
        let refresh = generate_token(&config, TokenKind::Refresh, user_id).unwrap();

        assert!(matches!(
            validate_token(&config, TokenKind::Refresh, &access),
            Err(JwtError::InvalidSignature)
        ));
        assert!(matches!(
            validate_token(&config, TokenKind::Access, &refresh),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tokens_minted_together_differ() {
        let config = JwtConfig::default();
        let user_id = Uuid::new_v4();

        let a = generate_token(&config, TokenKind::Access, user_id).unwrap();
        let b = generate_token(&config, TokenKind::Access, user_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::default();
        let result = validate_token(&config, TokenKind::Access, "invalid.token.here");
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig::default();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = Claims {
            id: Uuid::new_v4(),
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )
        .unwrap();

        let result = validate_token(&config, TokenKind::Access, &token);
        assert!(matches!(result, Err(JwtError::ExpiredToken)));
    }
}
