//! Request and response bodies for the auth endpoints

use serde::{Deserialize, Serialize};
use todoguard_core::User;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    /// Letters and single spaces, at most 50 characters
    #[validate(
        length(min = 1, max = 50, message = "Name must not be greater than 50"),
        custom(function = "validate_name")
    )]
    #[schema(example = "Jane Doe")]
    pub name: String,

    #[validate(email(message = "email must be an email"))]
    #[schema(example = "jane@example.com")]
    pub email: String,

    /// Base64 RSA ciphertext of the password
    #[validate(custom(function = "validate_base64"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "email must be an email"))]
    #[schema(example = "jane@example.com")]
    pub email: String,

    /// Base64 RSA ciphertext of the password
    #[validate(custom(function = "validate_base64"))]
    pub password: String,
}

/// Access/refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signup/login response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    pub fn new(user: User, tokens: TokenPair) -> Self {
        Self {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

/// Plain message response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CSRF token issued to browser clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let letters_and_spaces = name.chars().all(|c| c.is_ascii_alphabetic() || c == ' ');
    if name.is_empty() || !letters_and_spaces || name.contains("  ") {
        let mut err = ValidationError::new("name_format");
        err.message = Some("Invalid name format".into());
        return Err(err);
    }
    Ok(())
}

fn validate_base64(value: &str) -> Result<(), ValidationError> {
    use base64::{engine::general_purpose::STANDARD, Engine};

    if value.trim().is_empty() || STANDARD.decode(value.trim()).is_err() {
        let mut err = ValidationError::new("base64");
        err.message = Some("password must be base64 encoded".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(name: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_name_rules() {
        assert!(signup("Jane Doe", "jane@example.com", "AAAA").validate().is_ok());
        assert!(signup("Jane  Doe", "jane@example.com", "AAAA").validate().is_err());
        assert!(signup("J4ne", "jane@example.com", "AAAA").validate().is_err());
        assert!(signup(&"a".repeat(51), "jane@example.com", "AAAA")
            .validate()
            .is_err());
    }

    #[test]
    fn test_email_and_password_rules() {
        assert!(signup("Jane", "not-an-email", "AAAA").validate().is_err());
        assert!(signup("Jane", "jane@example.com", "%%%").validate().is_err());
        assert!(signup("Jane", "jane@example.com", "").validate().is_err());
    }

    #[test]
    fn test_auth_response_shape() {
        let json = serde_json::to_value(TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        })
        .unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }
}
