//! Symmetric data cipher
//!
//! AES-256-CBC with PKCS#7 padding. The key is derived per message with
//! PBKDF2-HMAC-SHA256 (100,000 iterations) from the configured passphrase
//! and a fresh 16-byte salt. The hex output is laid out as
//! `salt (32 hex) || iv (32 hex) || ciphertext`.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Ciphertext is too short")]
    Truncated,

    #[error("Ciphertext is not valid hex")]
    InvalidHex,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Decrypted data is not valid UTF-8")]
    InvalidUtf8,
}

/// Passphrase-keyed AES-256-CBC helper
#[derive(Clone)]
pub struct DataCipher {
    passphrase: String,
}

impl DataCipher {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    /// Encrypt `data` into `salt || iv || ciphertext` hex
    pub fn encrypt(&self, data: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut iv);

        let key = self.derive_key(&salt);
        let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(data.as_bytes());

        let mut out = String::with_capacity((SALT_LEN + IV_LEN + ciphertext.len()) * 2);
        out.push_str(&hex::encode(salt));
        out.push_str(&hex::encode(iv));
        out.push_str(&hex::encode(ciphertext));
        out
    }

    /// Reverse of [`DataCipher::encrypt`]
    pub fn decrypt(&self, data: &str) -> Result<String, CipherError> {
        let prefix = (SALT_LEN + IV_LEN) * 2;
        if data.len() <= prefix || !data.is_ascii() {
            return Err(CipherError::Truncated);
        }

        let salt: [u8; SALT_LEN] = decode_fixed(&data[..SALT_LEN * 2])?;
        let iv: [u8; IV_LEN] = decode_fixed(&data[SALT_LEN * 2..prefix])?;
        let ciphertext = hex::decode(&data[prefix..]).map_err(|_| CipherError::InvalidHex)?;

        let key = self.derive_key(&salt);
        let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }

    fn derive_key(&self, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
        key
    }
}

fn decode_fixed<const N: usize>(hex_str: &str) -> Result<[u8; N], CipherError> {
    let mut buf = [0u8; N];
    hex::decode_to_slice(hex_str, &mut buf).map_err(|_| CipherError::InvalidHex)?;
    Ok(buf)
}
