//! AES-256-GCM sealing with Argon2 key derivation

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cryptographic errors
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

/// AES-256 key size in bytes
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes
const NONCE_SIZE: usize = 12;

/// Salt size for key derivation
const SALT_SIZE: usize = 16;

/// Key protecting the store file
pub struct StoreKey {
    key: SecretBox<[u8; KEY_SIZE]>,
}

impl StoreKey {
    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(self.key.expose_secret().as_slice())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }
}

/// Ciphertext plus the nonce it was sealed with, both base64
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedData {
    pub nonce: String,
    pub ciphertext: String,
}

/// Derive the store key from a passphrase and salt
pub fn derive_key(passphrase: &SecretString, salt: &[u8]) -> Result<StoreKey, CryptoError> {
    let mut key = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(StoreKey {
        key: SecretBox::new(Box::new(key)),
    })
}

/// Generate a random salt for key derivation
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Encrypt a plaintext under a fresh random nonce
pub fn seal(plaintext: &[u8], key: &StoreKey) -> Result<SealedData, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = key
        .cipher()?
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(SealedData {
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Decrypt sealed data; a wrong key and tampered data fail the same way
pub fn open(sealed: &SealedData, key: &StoreKey) -> Result<Vec<u8>, CryptoError> {
    let nonce_bytes = STANDARD
        .decode(&sealed.nonce)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid nonce: {}", e)))?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed(format!(
            "Invalid nonce length: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }

    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid ciphertext: {}", e)))?;

    key.cipher()?
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| {
            CryptoError::DecryptionFailed("wrong storage key or corrupted data".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let salt = generate_salt();
        let key = derive_key(&SecretString::from("storage-key"), &salt).unwrap();

        let sealed = seal(b"{\"users\":{}}", &key).unwrap();
        assert_eq!(open(&sealed, &key).unwrap(), b"{\"users\":{}}");
    }

    #[test]
    fn test_wrong_key_fails() {
        let salt = generate_salt();
        let key1 = derive_key(&SecretString::from("first"), &salt).unwrap();
        let key2 = derive_key(&SecretString::from("second"), &salt).unwrap();

        let sealed = seal(b"payload", &key1).unwrap();
        assert!(matches!(
            open(&sealed, &key2),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = derive_key(&SecretString::from("k"), &generate_salt()).unwrap();
        let a = seal(b"same", &key).unwrap();
        let b = seal(b"same", &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_truncated_nonce_rejected() {
        let key = derive_key(&SecretString::from("k"), &generate_salt()).unwrap();
        let mut sealed = seal(b"data", &key).unwrap();
        sealed.nonce = STANDARD.encode([0u8; 4]);
        assert!(open(&sealed, &key).is_err());
    }
}
