//! Statehouse - access control and content back office for a roleplay
//! government portal
//!
//! Roles are named permission bundles that new members join by redeeming an
//! access code. A single governor account, created once with a bootstrap
//! secret, passes every permission check. Portal content (ministries, news,
//! amendments, leadership) is public to read and gated by those permissions
//! to change.

pub mod auth;
pub mod config;
pub mod content;
pub mod crypto;
pub mod storage;
pub mod web;

use thiserror::Error;

/// Core error types for Statehouse
#[derive(Error, Debug)]
pub enum StatehouseError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Access error: {0}")]
    Access(#[from] auth::AccessError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias used by the binary and integration points
pub type Result<T, E = StatehouseError> = std::result::Result<T, E>;
