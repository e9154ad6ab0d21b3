//! Storage backends for portal records
//!
//! Uniqueness rules (usernames, access codes, the single governor) are
//! enforced here, atomically against the persisted state, so that every
//! service instance and process sharing a store observes the same winner.

mod file;

pub use file::FileStorage;

use crate::auth::{Role, RoleUpdate, User};
use crate::content::{ContentBody, ContentEntry, ContentKind};
use async_trait::async_trait;
use thiserror::Error;

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("A governor account already exists")]
    GovernorExists,

    #[error("Access code already in use")]
    AccessCodeTaken,

    #[error("No role has this access code")]
    InvalidAccessCode,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Role is still held by {0} user(s)")]
    RoleInUse(usize),

    #[error("{kind} not found: {id}")]
    ContentNotFound { kind: ContentKind, id: String },

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(#[from] crate::crypto::CryptoError),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Trait for portal storage backends
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ==================== Users ====================

    /// Insert a new user
    ///
    /// Fails with `UsernameTaken` for a duplicate username, with
    /// `GovernorExists` when inserting a second governor and with
    /// `RoleNotFound` when the held role does not exist.
    async fn insert_user(&self, user: &User) -> Result<(), StorageError>;

    /// Create a user holding the role whose current access code is exactly `code`
    ///
    /// Resolving the code and inserting the user is one atomic step: a code
    /// rotated or a role deleted concurrently fails with `InvalidAccessCode`
    /// instead of admitting a user to a stale code or a missing role.
    async fn insert_user_with_code(
        &self,
        username: &str,
        code: &str,
        password_hash: Option<String>,
    ) -> Result<(User, Role), StorageError>;

    /// Get a user by ID
    async fn get_user(&self, id: &str) -> Result<Option<User>, StorageError>;

    /// Get a user by username
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// List all users
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;

    /// Delete a user by ID
    async fn delete_user(&self, id: &str) -> Result<(), StorageError>;

    /// Whether a governor account exists
    async fn governor_exists(&self) -> Result<bool, StorageError>;

    // ==================== Roles ====================

    /// Insert a new role; fails with `AccessCodeTaken` on a code collision
    async fn insert_role(&self, role: &Role) -> Result<(), StorageError>;

    /// Get a role by ID
    async fn get_role(&self, id: &str) -> Result<Option<Role>, StorageError>;

    /// Find the role whose current access code is exactly `code`
    async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, StorageError>;

    /// List all roles
    async fn list_roles(&self) -> Result<Vec<Role>, StorageError>;

    /// Apply a partial update and return the updated role
    async fn update_role(&self, id: &str, update: &RoleUpdate) -> Result<Role, StorageError>;

    /// Swap in a new access code; fails with `AccessCodeTaken` on collision
    async fn replace_access_code(&self, id: &str, code: &str) -> Result<Role, StorageError>;

    /// Delete a role; fails with `RoleInUse` while users still hold it
    async fn delete_role(&self, id: &str) -> Result<(), StorageError>;

    // ==================== Content ====================

    /// Insert a content entry
    async fn insert_content(&self, entry: &ContentEntry) -> Result<(), StorageError>;

    /// Get a content entry of the given kind
    async fn get_content(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> Result<Option<ContentEntry>, StorageError>;

    /// List every entry of one kind
    async fn list_content(&self, kind: ContentKind) -> Result<Vec<ContentEntry>, StorageError>;

    /// Replace the body of an existing entry and return it
    async fn update_content(
        &self,
        id: &str,
        body: &ContentBody,
    ) -> Result<ContentEntry, StorageError>;

    /// Delete a content entry of the given kind
    async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), StorageError>;

    // ==================== Maintenance ====================

    /// Check if the storage backend is available and healthy
    async fn health_check(&self) -> Result<(), StorageError>;

    /// Re-read persisted state, picking up changes made by other processes
    async fn reload(&self) -> Result<(), StorageError>;
}
