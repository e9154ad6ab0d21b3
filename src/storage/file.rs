//! Encrypted file-based storage backend
//!
//! Persists the whole state as one AES-256-GCM sealed JSON document. Every
//! mutation is a read-modify-write of that document under an exclusive
//! advisory lock on a sibling `.lock` file, so processes sharing the file
//! check uniqueness against the same state. Reads re-read the document and
//! only decrypt it when its revision moved.

use super::{StorageBackend, StorageError};
use crate::auth::{Role, RoleRef, RoleUpdate, User};
use crate::content::{ContentBody, ContentEntry, ContentKind};
use crate::crypto::{derive_key, generate_salt, open, seal, SealedData, StoreKey};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use fs4::fs_std::FileExt;
use parking_lot::RwLock;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

/// File-based storage with AES-256-GCM encryption
pub struct FileStorage {
    /// Path to the storage file
    path: PathBuf,
    /// Path of the advisory lock file guarding read-modify-write cycles
    lock_path: PathBuf,
    /// Key derived from the storage passphrase
    key: StoreKey,
    /// Salt used for key derivation (stored in file)
    salt: Vec<u8>,
    /// Last state read from or written to disk
    cache: RwLock<Snapshot>,
    /// Serializes this instance's writers before they contend for the file lock
    persist: Mutex<()>,
}

#[derive(Default)]
struct Snapshot {
    revision: u64,
    state: StoreState,
}

/// Everything the store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    /// Users by ID
    #[serde(default)]
    users: HashMap<String, User>,
    /// Roles by ID
    #[serde(default)]
    roles: HashMap<String, Role>,
    /// Content entries by ID
    #[serde(default)]
    content: HashMap<String, ContentEntry>,

    // Secondary indexes (not serialized, rebuilt on load)
    /// Index: username -> user ID
    #[serde(skip)]
    username_index: HashMap<String, String>,
    /// Index: access code -> role ID
    #[serde(skip)]
    access_code_index: HashMap<String, String>,
    /// ID of the governor account, if any
    #[serde(skip)]
    governor_id: Option<String>,
}

impl StoreState {
    /// Rebuild all secondary indexes from primary data
    fn rebuild_indexes(&mut self) {
        self.username_index = self
            .users
            .values()
            .map(|u| (u.username.clone(), u.id.clone()))
            .collect();

        self.access_code_index = self
            .roles
            .values()
            .map(|r| (r.access_code.clone(), r.id.clone()))
            .collect();

        self.governor_id = self
            .users
            .values()
            .find(|u| u.is_governor())
            .map(|u| u.id.clone());
    }

    fn holders_of(&self, role_id: &str) -> usize {
        self.users
            .values()
            .filter(|u| matches!(&u.role, RoleRef::Standard { role_id: r } if r == role_id))
            .count()
    }

    fn role_by_code(&self, code: &str) -> Option<&Role> {
        self.access_code_index
            .get(code)
            .and_then(|id| self.roles.get(id))
    }

    /// Add a user after checking every uniqueness rule
    fn add_user(&mut self, user: &User) -> Result<(), StorageError> {
        if self.users.contains_key(&user.id) {
            return Err(StorageError::AlreadyExists(user.id.clone()));
        }
        if self.username_index.contains_key(&user.username) {
            return Err(StorageError::UsernameTaken(user.username.clone()));
        }
        match &user.role {
            RoleRef::Governor => {
                if self.governor_id.is_some() {
                    return Err(StorageError::GovernorExists);
                }
                self.governor_id = Some(user.id.clone());
            }
            RoleRef::Standard { role_id } => {
                if !self.roles.contains_key(role_id) {
                    return Err(StorageError::RoleNotFound(role_id.clone()));
                }
            }
        }

        self.username_index
            .insert(user.username.clone(), user.id.clone());
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

/// On-disk format for the storage file
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    /// Version for future migrations
    version: u32,
    /// Incremented by every successful write
    #[serde(default)]
    revision: u64,
    /// Base64 salt for key derivation
    salt: String,
    /// Sealed `StoreState`
    data: SealedData,
}

/// Exclusive advisory lock on the store, released on drop
struct StoreLock(std::fs::File);

impl StoreLock {
    async fn acquire(path: &Path) -> Result<Self, StorageError> {
        let path = path.to_path_buf();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("store lock task failed: {}", e)))??;

        Ok(Self(file))
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            tracing::warn!(error = %e, "Failed to release store lock");
        }
    }
}

impl FileStorage {
    /// Open the store at `path`, creating it if it does not exist
    pub async fn new(path: impl AsRef<Path>, passphrase: &SecretString) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let lock_path = path.with_extension("lock");
        let _lock = StoreLock::acquire(&lock_path).await?;

        if fs::try_exists(&path).await? {
            Self::load(path, lock_path, passphrase).await
        } else {
            Self::create(path, lock_path, passphrase).await
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn create(
        path: PathBuf,
        lock_path: PathBuf,
        passphrase: &SecretString,
    ) -> Result<Self, StorageError> {
        let salt = generate_salt();
        let key = derive_key(passphrase, &salt)?;

        let storage = Self {
            path,
            lock_path,
            key,
            salt,
            cache: RwLock::new(Snapshot::default()),
            persist: Mutex::new(()),
        };

        storage.write_file(0, &StoreState::default()).await?;
        tracing::info!(path = %storage.path.display(), "Created new store");

        Ok(storage)
    }

    async fn load(
        path: PathBuf,
        lock_path: PathBuf,
        passphrase: &SecretString,
    ) -> Result<Self, StorageError> {
        let file = Self::read_file(&path).await?;

        let salt = STANDARD
            .decode(&file.salt)
            .map_err(|e| StorageError::Serialization(format!("Invalid salt: {}", e)))?;
        let key = derive_key(passphrase, &salt)?;
        let state = Self::decode_state(&file, &key)?;

        tracing::debug!(
            path = %path.display(),
            revision = file.revision,
            users = state.users.len(),
            roles = state.roles.len(),
            content = state.content.len(),
            "Loaded store"
        );

        Ok(Self {
            path,
            lock_path,
            key,
            salt,
            cache: RwLock::new(Snapshot {
                revision: file.revision,
                state,
            }),
            persist: Mutex::new(()),
        })
    }

    async fn read_file(path: &Path) -> Result<StoreFile, StorageError> {
        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn decode_state(file: &StoreFile, key: &StoreKey) -> Result<StoreState, StorageError> {
        if file.version > FORMAT_VERSION {
            return Err(StorageError::Unavailable(format!(
                "store format version {} is newer than supported version {}",
                file.version, FORMAT_VERSION
            )));
        }

        let plaintext = open(&file.data, key)?;
        let mut state: StoreState = serde_json::from_slice(&plaintext)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        state.rebuild_indexes();
        Ok(state)
    }

    /// Seal `state` and atomically replace the storage file with it
    async fn write_file(&self, revision: u64, state: &StoreState) -> Result<(), StorageError> {
        let plaintext =
            serde_json::to_vec(state).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let file = StoreFile {
            version: FORMAT_VERSION,
            revision,
            salt: STANDARD.encode(&self.salt),
            data: seal(&plaintext, &self.key)?,
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Write atomically by writing to temp file first
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }

    /// Replace the cached snapshot unless it is already newer
    fn install(&self, revision: u64, state: StoreState) {
        let mut cache = self.cache.write();
        if revision >= cache.revision {
            *cache = Snapshot { revision, state };
        }
    }

    /// Pick up writes made through other handles on the same file
    async fn refresh(&self) -> Result<(), StorageError> {
        let file = Self::read_file(&self.path).await?;
        if file.revision == self.cache.read().revision {
            return Ok(());
        }

        let state = Self::decode_state(&file, &self.key)?;
        self.install(file.revision, state);
        Ok(())
    }

    /// Run `f` against the current on-disk state
    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T, StorageError> {
        self.refresh().await?;
        Ok(f(&self.cache.read().state))
    }

    /// Read-modify-write the on-disk state under the store lock
    ///
    /// `f` works on a copy; the copy becomes visible only once it is on disk.
    async fn mutate<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, StorageError> + Send,
        T: Send,
    {
        let _local = self.persist.lock().await;
        let _lock = StoreLock::acquire(&self.lock_path).await?;

        let file = Self::read_file(&self.path).await?;
        let current = Self::decode_state(&file, &self.key)?;

        let mut next = current.clone();
        let value = match f(&mut next) {
            Ok(value) => value,
            Err(e) => {
                self.install(file.revision, current);
                return Err(e);
            }
        };

        let revision = file.revision + 1;
        if let Err(e) = self.write_file(revision, &next).await {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist store");
            self.install(file.revision, current);
            return Err(e);
        }

        self.install(revision, next);
        Ok(value)
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    // ==================== Users ====================

    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        self.mutate(|state| state.add_user(user)).await
    }

    async fn insert_user_with_code(
        &self,
        username: &str,
        code: &str,
        password_hash: Option<String>,
    ) -> Result<(User, Role), StorageError> {
        self.mutate(|state| {
            let role = state
                .role_by_code(code)
                .cloned()
                .ok_or(StorageError::InvalidAccessCode)?;

            let user = User::new(
                username,
                RoleRef::Standard {
                    role_id: role.id.clone(),
                },
                password_hash,
            );
            state.add_user(&user)?;
            Ok((user, role))
        })
        .await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StorageError> {
        self.read(|state| state.users.get(id).cloned()).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        self.read(|state| {
            state
                .username_index
                .get(username)
                .and_then(|id| state.users.get(id))
                .cloned()
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let mut users: Vec<User> = self
            .read(|state| state.users.values().cloned().collect())
            .await?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn delete_user(&self, id: &str) -> Result<(), StorageError> {
        self.mutate(|state| {
            let user = state
                .users
                .remove(id)
                .ok_or_else(|| StorageError::UserNotFound(id.to_string()))?;

            state.username_index.remove(&user.username);
            if state.governor_id.as_deref() == Some(id) {
                state.governor_id = None;
            }
            Ok(())
        })
        .await
    }

    async fn governor_exists(&self) -> Result<bool, StorageError> {
        self.read(|state| state.governor_id.is_some()).await
    }

    // ==================== Roles ====================

    async fn insert_role(&self, role: &Role) -> Result<(), StorageError> {
        self.mutate(|state| {
            if state.roles.contains_key(&role.id) {
                return Err(StorageError::AlreadyExists(role.id.clone()));
            }
            if state.access_code_index.contains_key(&role.access_code) {
                return Err(StorageError::AccessCodeTaken);
            }

            state
                .access_code_index
                .insert(role.access_code.clone(), role.id.clone());
            state.roles.insert(role.id.clone(), role.clone());
            Ok(())
        })
        .await
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>, StorageError> {
        self.read(|state| state.roles.get(id).cloned()).await
    }

    async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, StorageError> {
        self.read(|state| state.role_by_code(code).cloned()).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StorageError> {
        let mut roles: Vec<Role> = self
            .read(|state| state.roles.values().cloned().collect())
            .await?;
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(roles)
    }

    async fn update_role(&self, id: &str, update: &RoleUpdate) -> Result<Role, StorageError> {
        self.mutate(|state| {
            let role = state
                .roles
                .get_mut(id)
                .ok_or_else(|| StorageError::RoleNotFound(id.to_string()))?;

            if let Some(name) = &update.name {
                role.name = name.clone();
            }
            if let Some(permissions) = update.permissions {
                role.permissions = permissions;
            }
            Ok(role.clone())
        })
        .await
    }

    async fn replace_access_code(&self, id: &str, code: &str) -> Result<Role, StorageError> {
        self.mutate(|state| {
            let role = state
                .roles
                .get_mut(id)
                .ok_or_else(|| StorageError::RoleNotFound(id.to_string()))?;

            if state.access_code_index.contains_key(code) {
                return Err(StorageError::AccessCodeTaken);
            }

            state.access_code_index.remove(&role.access_code);
            state
                .access_code_index
                .insert(code.to_string(), id.to_string());
            role.access_code = code.to_string();
            Ok(role.clone())
        })
        .await
    }

    async fn delete_role(&self, id: &str) -> Result<(), StorageError> {
        self.mutate(|state| {
            if !state.roles.contains_key(id) {
                return Err(StorageError::RoleNotFound(id.to_string()));
            }
            let holders = state.holders_of(id);
            if holders > 0 {
                return Err(StorageError::RoleInUse(holders));
            }

            if let Some(role) = state.roles.remove(id) {
                state.access_code_index.remove(&role.access_code);
            }
            Ok(())
        })
        .await
    }

    // ==================== Content ====================

    async fn insert_content(&self, entry: &ContentEntry) -> Result<(), StorageError> {
        self.mutate(|state| {
            if state.content.contains_key(&entry.id) {
                return Err(StorageError::AlreadyExists(entry.id.clone()));
            }
            state.content.insert(entry.id.clone(), entry.clone());
            Ok(())
        })
        .await
    }

    async fn get_content(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> Result<Option<ContentEntry>, StorageError> {
        self.read(|state| state.content.get(id).filter(|e| e.kind() == kind).cloned())
            .await
    }

    async fn list_content(&self, kind: ContentKind) -> Result<Vec<ContentEntry>, StorageError> {
        self.read(|state| {
            state
                .content
                .values()
                .filter(|e| e.kind() == kind)
                .cloned()
                .collect()
        })
        .await
    }

    async fn update_content(
        &self,
        id: &str,
        body: &ContentBody,
    ) -> Result<ContentEntry, StorageError> {
        self.mutate(|state| {
            let entry = state
                .content
                .get_mut(id)
                .filter(|e| e.kind() == body.kind())
                .ok_or_else(|| StorageError::ContentNotFound {
                    kind: body.kind(),
                    id: id.to_string(),
                })?;

            entry.body = body.clone();
            entry.updated_at = Utc::now();
            Ok(entry.clone())
        })
        .await
    }

    async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), StorageError> {
        self.mutate(|state| {
            if !state.content.get(id).is_some_and(|e| e.kind() == kind) {
                return Err(StorageError::ContentNotFound {
                    kind,
                    id: id.to_string(),
                });
            }
            state.content.remove(id);
            Ok(())
        })
        .await
    }

    // ==================== Maintenance ====================

    async fn health_check(&self) -> Result<(), StorageError> {
        if !fs::try_exists(&self.path).await? {
            return Err(StorageError::Unavailable(
                "Storage file does not exist".to_string(),
            ));
        }

        self.refresh().await
    }

    async fn reload(&self) -> Result<(), StorageError> {
        let file = Self::read_file(&self.path).await?;
        let state = Self::decode_state(&file, &self.key)?;
        *self.cache.write() = Snapshot {
            revision: file.revision,
            state,
        };
        Ok(())
    }
}
