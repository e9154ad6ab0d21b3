//! At-rest encryption for the portal store
//!
//! AES-256-GCM with a key derived from the storage passphrase by Argon2id.

mod cipher;

pub use cipher::{derive_key, generate_salt, open, seal, CryptoError, SealedData, StoreKey};
