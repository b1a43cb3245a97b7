//! Token Cipher
//!
//! Reversible encryption of third-party OAuth tokens for storage at rest.
//!
//! The key is derived once with PBKDF2-HMAC-SHA256 (10000 iterations, 32-byte
//! output) from a passphrase and a base64 salt. Tokens are encrypted with
//! AES-256-CBC/PKCS#7 under a fixed base64 IV and emitted as base64.
//!
//! # Known weakness
//!
//! The IV is a process-wide constant, so identical plaintexts always produce
//! identical ciphertexts. Stored ciphertext depends on this exact scheme;
//! switching to per-record IVs requires migrating existing rows.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::pbkdf2;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::num::NonZeroU32;

use crate::error::{CipherError, CredentialsResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Encrypted form of a token pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedTokenPair {
    pub encrypted_token: String,
    pub encrypted_refresh_token: Option<String>,
}

/// Plaintext token pair.
#[derive(Clone)]
pub struct TokenPair {
    pub token: SecretString,
    pub refresh_token: Option<SecretString>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Deterministic token cipher.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

impl TokenCipher {
    /// Derive the key from `passphrase` and the base64 `salt`; `iv` is base64 too.
    pub fn new(passphrase: &SecretString, salt: &str, iv: &str) -> CredentialsResult<Self> {
        let salt = STANDARD
            .decode(salt)
            .map_err(|e| CipherError::InvalidKeyMaterial {
                message: format!("salt is not valid base64: {e}"),
            })?;
        let iv_bytes = STANDARD
            .decode(iv)
            .map_err(|e| CipherError::InvalidKeyMaterial {
                message: format!("IV is not valid base64: {e}"),
            })?;
        let iv: [u8; IV_LEN] =
            iv_bytes
                .try_into()
                .map_err(|bytes: Vec<u8>| CipherError::InvalidKeyMaterial {
                    message: format!("IV must be {IV_LEN} bytes, got {}", bytes.len()),
                })?;

        let iterations = NonZeroU32::new(PBKDF2_ITERATIONS).ok_or_else(|| {
            CipherError::InvalidKeyMaterial {
                message: "iteration count must be non-zero".to_string(),
            }
        })?;

        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            passphrase.expose_secret().as_bytes(),
            &mut key,
        );

        Ok(Self { key, iv })
    }

    /// Encrypt a token and, if present and non-empty, its refresh token.
    pub fn encrypt(
        &self,
        token: &str,
        refresh_token: Option<&str>,
    ) -> CredentialsResult<EncryptedTokenPair> {
        let encrypted_token = self.encrypt_value(token)?;
        let encrypted_refresh_token = match refresh_token {
            Some(value) if !value.is_empty() => Some(self.encrypt_value(value)?),
            _ => None,
        };

        Ok(EncryptedTokenPair {
            encrypted_token,
            encrypted_refresh_token,
        })
    }

    /// Inverse of [`TokenCipher::encrypt`].
    pub fn decrypt(
        &self,
        encrypted_token: &str,
        encrypted_refresh_token: Option<&str>,
    ) -> CredentialsResult<TokenPair> {
        let token = SecretString::new(self.decrypt_value(encrypted_token)?);
        let refresh_token = match encrypted_refresh_token {
            Some(value) if !value.is_empty() => {
                Some(SecretString::new(self.decrypt_value(value)?))
            }
            _ => None,
        };

        Ok(TokenPair {
            token,
            refresh_token,
        })
    }

    /// Encrypt a single value to base64.
    pub fn encrypt_value(&self, plaintext: &str) -> CredentialsResult<String> {
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.iv).map_err(|e| {
            CipherError::InvalidKeyMaterial {
                message: e.to_string(),
            }
        })?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt a single base64 value.
    pub fn decrypt_value(&self, ciphertext: &str) -> CredentialsResult<String> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|e| CipherError::InvalidCiphertext {
                message: format!("not valid base64: {e}"),
            })?;
        let cipher = Aes256CbcDec::new_from_slices(&self.key, &self.iv).map_err(|e| {
            CipherError::InvalidKeyMaterial {
                message: e.to_string(),
            }
        })?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .map_err(|_| CipherError::InvalidCiphertext {
                message: "bad padding or wrong key".to_string(),
            })?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8.into())
    }
}
