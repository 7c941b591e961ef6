//! Password handshake: RSA decryption of the client blob, then Argon2id
//!
//! Clients never send plaintext passwords. They encrypt with the server's
//! RSA public key and base64 the result; [`PasswordCodec::decrypt`] recovers
//! the plaintext, which is then hashed for storage or verified against the
//! stored PHC string.
//!
//! Argon2id defaults:
//! - Memory: 64 MB
//! - Iterations: 3
//! - Parallelism: 4 threads
//! - Output: 32 bytes hash

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey};
use thiserror::Error;

/// Password handshake and hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("RSA private key is not configured")]
    MissingPrivateKey,

    #[error("Invalid RSA private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Failed to decrypt password")]
    DecryptionFailed,
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Decrypts client password blobs and hashes/verifies plaintexts
pub struct PasswordCodec {
    private_key: Option<RsaPrivateKey>,
    hashing: PasswordConfig,
}

impl PasswordCodec {
    /// Build from a PEM private key (PKCS#1 or PKCS#8).
    ///
    /// Literal `\n` sequences, as found in single-line env values, are
    /// turned into newlines first. An empty PEM yields a codec whose
    /// `decrypt` always fails.
    pub fn new(private_key_pem: &str, hashing: PasswordConfig) -> Result<Self, PasswordError> {
        let pem = private_key_pem.replace("\\n", "\n");
        let pem = pem.trim();

        let private_key = if pem.is_empty() {
            None
        } else {
            let key = RsaPrivateKey::from_pkcs1_pem(pem)
                .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
                .map_err(|e| PasswordError::InvalidPrivateKey(e.to_string()))?;
            Some(key)
        };

        Ok(Self {
            private_key,
            hashing,
        })
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Decrypt a base64 RSA ciphertext into the plaintext password.
    ///
    /// OAEP-SHA1 is tried first, then PKCS#1 v1.5.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, PasswordError> {
        let key = self
            .private_key
            .as_ref()
            .ok_or(PasswordError::MissingPrivateKey)?;

        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| PasswordError::DecryptionFailed)?;

        let plaintext = key
            .decrypt(Oaep::new::<sha1::Sha1>(), &bytes)
            .or_else(|_| key.decrypt(Pkcs1v15Encrypt, &bytes))
            .map_err(|_| PasswordError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| PasswordError::DecryptionFailed)
    }

    /// Hash a plaintext password into a PHC string
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_password_with_config(password, &self.hashing)
    }

    /// Check a plaintext against a stored hash
    pub fn verify(&self, hash: &str, password: &str) -> bool {
        verify_password(password, hash)
    }
}

/// Hash a password with custom configuration
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// A malformed stored hash verifies as false.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };

    // Parameters come from the PHC string itself
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Validate password strength
///
/// Requires at least 8 characters with upper and lower case letters, a
/// digit and a special character.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err("Password must contain at least one special character".to_string());
    }

    Ok(())
}
