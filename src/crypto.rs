//! Encryption of stored database passwords.

use crate::error::{AgentError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha2::Sha256;

const SALT: &[u8] = b"sqlagent_salt_v1";
const ROUNDS: u32 = 100_000;
const NONCE_LEN: usize = 12;

/// AES-256-GCM keyed from a passphrase with PBKDF2-HMAC-SHA256.
///
/// Tokens are URL-safe base64 of `nonce || ciphertext`. Each encryption uses
/// a fresh random nonce, so the same password never encrypts to the same token.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(AgentError::Config("Encryption key must not be empty".to_string()));
        }
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), SALT, ROUNDS, &mut key);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AgentError::Credential(format!("Invalid key length: {}", e)))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| AgentError::Credential("Encryption failed".to_string()))?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(token))
    }

    pub fn decrypt(&self, token: &str) -> Result<String> {
        let raw = URL_SAFE
            .decode(token.trim())
            .map_err(|e| AgentError::Credential(format!("Malformed credential token: {}", e)))?;
        if raw.len() <= NONCE_LEN {
            return Err(AgentError::Credential("Credential token too short".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                AgentError::Credential("Decryption failed (wrong key or corrupted token)".to_string())
            })?;
        String::from_utf8(plaintext)
            .map_err(|_| AgentError::Credential("Decrypted password is not valid UTF-8".to_string()))
    }
}
