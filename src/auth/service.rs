//! Access control service
//!
//! Owns every identity and role operation of the portal: governor bootstrap,
//! password login, access code redemption, token resolution, role and user
//! management, and the `authorize` predicate everything else is gated on.

use super::codes::generate_access_code;
use super::password::PasswordHasher;
use super::tokens::{TokenError, TokenIssuer};
use super::types::{Grant, Permission, Permissions, Principal, PublicRole, Role, RoleRef, RoleUpdate, User};
use crate::config::AuthConfig;
use crate::storage::{StorageBackend, StorageError};
use bcrypt::BcryptError;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Attempts at finding an unused access code before giving up
const MAX_CODE_ATTEMPTS: usize = 8;

/// Longest accepted username
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Access control errors
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Credential hashing failed: {0}")]
    Credential(#[from] BcryptError),
}

impl From<StorageError> for AccessError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UsernameTaken(name) => {
                AccessError::Conflict(format!("Username already exists: {}", name))
            }
            StorageError::GovernorExists => {
                AccessError::Conflict("A governor is already registered".to_string())
            }
            StorageError::InvalidAccessCode => {
                AccessError::Unauthorized("Invalid access code".to_string())
            }
            StorageError::RoleInUse(holders) => AccessError::Conflict(format!(
                "Role is still assigned to {} user(s)",
                holders
            )),
            StorageError::UserNotFound(id) => AccessError::NotFound(format!("User {}", id)),
            StorageError::RoleNotFound(id) => AccessError::NotFound(format!("Role {}", id)),
            StorageError::ContentNotFound { kind, id } => {
                AccessError::NotFound(format!("{} {}", kind, id))
            }
            other => AccessError::Storage(other),
        }
    }
}

/// Result type for access control operations
pub type AccessResult<T> = Result<T, AccessError>;

/// A freshly authenticated user and its bearer token
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
}

/// Access control service shared by the HTTP API and the CLI
pub struct AccessService {
    storage: Arc<dyn StorageBackend>,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
    governor_secret: Option<SecretString>,
    code_length: usize,
}

impl AccessService {
    /// Create a service with governor registration disabled
    pub fn new(storage: Arc<dyn StorageBackend>, tokens: TokenIssuer, hasher: PasswordHasher) -> Self {
        Self {
            storage,
            tokens,
            hasher,
            governor_secret: None,
            code_length: super::codes::DEFAULT_CODE_LENGTH,
        }
    }

    /// Build a service from the `[auth]` configuration section
    pub fn from_config(storage: Arc<dyn StorageBackend>, config: &AuthConfig) -> Self {
        let secret = match &config.token_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!("No token secret configured; sessions will not survive a restart");
                TokenIssuer::random_secret()
            }
        };

        Self::new(
            storage,
            TokenIssuer::new(&secret, config.token_ttl()),
            PasswordHasher::new(config.bcrypt_cost),
        )
        .with_governor_secret(config.governor_secret.clone())
        .with_code_length(config.access_code_length)
    }

    /// Set the secret required by `bootstrap_governor`
    pub fn with_governor_secret(mut self, secret: Option<SecretString>) -> Self {
        self.governor_secret = secret;
        self
    }

    /// Set the length of generated access codes
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    /// The backing store
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Lifetime of issued tokens
    pub fn token_ttl(&self) -> chrono::Duration {
        self.tokens.ttl()
    }

    // ==================== Authentication ====================

    /// Register the single governor account
    pub async fn bootstrap_governor(
        &self,
        username: &str,
        password: &str,
        governor_secret: &str,
    ) -> AccessResult<Session> {
        let expected = self.governor_secret.as_ref().ok_or_else(|| {
            AccessError::Unauthorized("Governor registration is disabled".to_string())
        })?;

        let matches: bool = expected
            .expose_secret()
            .as_bytes()
            .ct_eq(governor_secret.as_bytes())
            .into();
        if !matches {
            tracing::warn!(username = %username, "Governor registration with wrong secret");
            return Err(AccessError::Unauthorized(
                "Invalid governor secret".to_string(),
            ));
        }

        let username = validate_username(username)?;
        if password.is_empty() {
            return Err(AccessError::Invalid("Password must not be empty".to_string()));
        }

        if self.storage.governor_exists().await? {
            return Err(StorageError::GovernorExists.into());
        }

        let user = User::new(username, RoleRef::Governor, Some(self.hasher.hash(password)?));
        self.storage.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Governor registered");
        self.open_session(Principal::new(user, Grant::Governor))
    }

    /// Whether the governor account exists
    pub async fn governor_exists(&self) -> AccessResult<bool> {
        Ok(self.storage.governor_exists().await?)
    }

    /// Log in with username and password
    pub async fn login(&self, username: &str, password: &str) -> AccessResult<Session> {
        let invalid = || AccessError::Unauthorized("Invalid username or password".to_string());

        let Some(user) = self.storage.get_user_by_username(username.trim()).await? else {
            tracing::warn!(username = %username, "Login for unknown user");
            return Err(invalid());
        };

        let verified = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| self.hasher.verify(password, hash));
        if !verified {
            tracing::warn!(user_id = %user.id, username = %user.username, "Login with wrong password");
            return Err(invalid());
        }

        let principal = self.resolve(user).await?;
        tracing::info!(user_id = %principal.user.id, "User logged in");
        self.open_session(principal)
    }

    /// Create an account holding the role whose current access code is `code`
    ///
    /// The code stays valid; the new account can later log in with the same
    /// username and code.
    pub async fn redeem_access_code(&self, username: &str, code: &str) -> AccessResult<Session> {
        let username = validate_username(username)?;
        let hash = self.hasher.hash(code)?;

        let (user, role) = match self
            .storage
            .insert_user_with_code(&username, code, Some(hash))
            .await
        {
            Ok(created) => created,
            Err(StorageError::InvalidAccessCode) => {
                tracing::warn!(username = %username, "Redemption with unknown access code");
                return Err(AccessError::Unauthorized("Invalid access code".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            role_id = %role.id,
            "Access code redeemed"
        );
        self.open_session(Principal::new(user, Grant::Role(role)))
    }

    /// Resolve a bearer token to the current state of its user
    pub async fn authenticate(&self, token: &str) -> AccessResult<Principal> {
        let claims = self.tokens.verify(token).map_err(|e| match e {
            TokenError::Expired => AccessError::Unauthorized("Token expired".to_string()),
            _ => AccessError::Unauthorized("Invalid token".to_string()),
        })?;

        let user = self
            .storage
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| AccessError::Unauthorized("Account no longer exists".to_string()))?;

        self.resolve(user).await
    }

    /// Look up the grant of a user
    pub async fn resolve(&self, user: User) -> AccessResult<Principal> {
        let grant = match &user.role {
            RoleRef::Governor => Grant::Governor,
            RoleRef::Standard { role_id } => match self.storage.get_role(role_id).await? {
                Some(role) => Grant::Role(role),
                None => {
                    tracing::debug!(user_id = %user.id, role_id = %role_id, "User holds a missing role");
                    Grant::Unassigned
                }
            },
        };

        Ok(Principal::new(user, grant))
    }

    fn open_session(&self, principal: Principal) -> AccessResult<Session> {
        let token = self.tokens.issue(&principal.user)?;
        Ok(Session { token, principal })
    }

    // ==================== Authorization ====================

    /// Whether `user` currently holds `permission`
    pub async fn authorize(&self, user: &User, permission: Permission) -> AccessResult<bool> {
        Ok(self.resolve(user.clone()).await?.can(permission))
    }

    /// Like [`AccessService::authorize`], naming the permission as a string
    pub async fn authorize_named(&self, user: &User, permission: &str) -> AccessResult<bool> {
        let permission: Permission = permission
            .parse()
            .map_err(|e: super::types::UnknownPermission| AccessError::Invalid(e.to_string()))?;
        self.authorize(user, permission).await
    }

    // ==================== Role Management ====================

    /// Create a role with a fresh access code
    pub async fn create_role(
        &self,
        actor: &Principal,
        name: &str,
        permissions: Permissions,
    ) -> AccessResult<Role> {
        require(actor, Permission::ManageRoles)?;
        let name = validate_role_name(name)?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let role = Role::new(name.clone(), permissions, generate_access_code(self.code_length))
                .created_by(actor.user.id.clone());

            match self.storage.insert_role(&role).await {
                Ok(()) => {
                    tracing::info!(
                        role_id = %role.id,
                        name = %role.name,
                        created_by = %actor.user.id,
                        "Role created"
                    );
                    return Ok(role);
                }
                Err(StorageError::AccessCodeTaken) => {
                    tracing::warn!(attempt, "Access code collision while creating role");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AccessError::Storage(StorageError::AccessCodeTaken))
    }

    /// Replace a role's access code; the old code stops working immediately
    pub async fn regenerate_code(&self, actor: &Principal, role_id: &str) -> AccessResult<Role> {
        require(actor, Permission::ManageRoles)?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_access_code(self.code_length);
            match self.storage.replace_access_code(role_id, &code).await {
                Ok(role) => {
                    tracing::info!(role_id = %role.id, by = %actor.user.id, "Access code regenerated");
                    return Ok(role);
                }
                Err(StorageError::AccessCodeTaken) => {
                    tracing::warn!(attempt, role_id = %role_id, "Access code collision while regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AccessError::Storage(StorageError::AccessCodeTaken))
    }

    /// Rename a role and/or replace its permissions
    pub async fn update_role(
        &self,
        actor: &Principal,
        role_id: &str,
        update: RoleUpdate,
    ) -> AccessResult<Role> {
        require(actor, Permission::ManageRoles)?;

        let update = RoleUpdate {
            name: update.name.as_deref().map(validate_role_name).transpose()?,
            permissions: update.permissions,
        };
        let role = self.storage.update_role(role_id, &update).await?;

        tracing::info!(role_id = %role.id, by = %actor.user.id, "Role updated");
        Ok(role)
    }

    /// Delete a role nobody holds
    pub async fn delete_role(&self, actor: &Principal, role_id: &str) -> AccessResult<()> {
        require(actor, Permission::ManageRoles)?;

        self.storage.delete_role(role_id).await?;
        tracing::info!(role_id = %role_id, by = %actor.user.id, "Role deleted");
        Ok(())
    }

    /// All roles, including their access codes
    pub async fn list_roles(&self, actor: &Principal) -> AccessResult<Vec<Role>> {
        require(actor, Permission::ManageRoles)?;
        Ok(self.storage.list_roles().await?)
    }

    /// A single role, including its access code
    pub async fn get_role(&self, actor: &Principal, role_id: &str) -> AccessResult<Role> {
        require(actor, Permission::ManageRoles)?;
        self.storage
            .get_role(role_id)
            .await?
            .ok_or_else(|| StorageError::RoleNotFound(role_id.to_string()).into())
    }

    /// Roles without access codes, for unauthenticated callers
    pub async fn list_public_roles(&self) -> AccessResult<Vec<PublicRole>> {
        Ok(self
            .storage
            .list_roles()
            .await?
            .iter()
            .map(PublicRole::from)
            .collect())
    }

    // ==================== User Management ====================

    /// All accounts
    pub async fn list_users(&self, actor: &Principal) -> AccessResult<Vec<User>> {
        require(actor, Permission::ManageRoles)?;
        Ok(self.storage.list_users().await?)
    }

    /// Delete an account other than the governor and the caller's own
    pub async fn delete_user(&self, actor: &Principal, user_id: &str) -> AccessResult<()> {
        require(actor, Permission::ManageRoles)?;

        if actor.user.id == user_id {
            return Err(AccessError::Forbidden(
                "Cannot delete your own account".to_string(),
            ));
        }

        let user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("User {}", user_id)))?;

        if user.is_governor() {
            return Err(AccessError::Forbidden(
                "The governor account cannot be deleted".to_string(),
            ));
        }

        self.storage.delete_user(user_id).await?;
        tracing::info!(user_id = %user_id, username = %user.username, by = %actor.user.id, "User deleted");
        Ok(())
    }
}

/// Fail with `Forbidden` unless the principal holds `permission`
pub fn require(principal: &Principal, permission: Permission) -> AccessResult<()> {
    if principal.can(permission) {
        Ok(())
    } else {
        Err(AccessError::Forbidden(format!(
            "requires '{}' permission",
            permission
        )))
    }
}

fn validate_username(username: &str) -> AccessResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AccessError::Invalid("Username must not be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AccessError::Invalid(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    Ok(username.to_string())
}

fn validate_role_name(name: &str) -> AccessResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccessError::Invalid("Role name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codes::is_well_formed;
    use crate::storage::FileStorage;
    use chrono::Duration;
    use tempfile::TempDir;

    const SECRET: &str = "let-me-govern";

    async fn service() -> (AccessService, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("store.enc"), &SecretString::from("k"))
            .await
            .unwrap();
        let service = AccessService::new(
            Arc::new(storage),
            TokenIssuer::new(&SecretString::from("signing"), Duration::hours(24)),
            PasswordHasher::new(4),
        )
        .with_governor_secret(Some(SecretString::from(SECRET)));
        (service, dir)
    }

    async fn governor(service: &AccessService) -> Principal {
        service
            .bootstrap_governor("gov", "hunter2", SECRET)
            .await
            .unwrap()
            .principal
    }

    #[tokio::test]
    async fn test_bootstrap_and_login() {
        let (service, _dir) = service().await;
        assert!(!service.governor_exists().await.unwrap());

        let session = service
            .bootstrap_governor("  gov  ", "hunter2", SECRET)
            .await
            .unwrap();
        assert_eq!(session.principal.user.username, "gov");
        assert!(session.principal.is_governor());
        assert!(service.governor_exists().await.unwrap());

        let login = service.login("gov", "hunter2").await.unwrap();
        assert!(login.principal.is_governor());

        let again = service.bootstrap_governor("gov2", "pw", SECRET).await;
        assert!(matches!(again, Err(AccessError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_wrong_secret() {
        let (service, _dir) = service().await;

        let result = service.bootstrap_governor("gov", "hunter2", "guess").await;
        assert!(matches!(result, Err(AccessError::Unauthorized(_))));
        assert!(!service.governor_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_disabled_without_secret() {
        let (service, _dir) = service().await;
        let service = service.with_governor_secret(None);

        let result = service.bootstrap_governor("gov", "hunter2", "").await;
        assert!(matches!(result, Err(AccessError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (service, _dir) = service().await;
        governor(&service).await;

        assert!(matches!(
            service.login("gov", "wrong").await,
            Err(AccessError::Unauthorized(_))
        ));
        assert!(matches!(
            service.login("nobody", "hunter2").await,
            Err(AccessError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_redeem_and_login_with_code() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;

        let role = service
            .create_role(&gov, "Editor", Permissions::none().with(Permission::ManageNews))
            .await
            .unwrap();
        assert!(is_well_formed(&role.access_code));
        assert_eq!(role.created_by.as_deref(), Some(gov.user.id.as_str()));

        let session = service
            .redeem_access_code("alice", &role.access_code)
            .await
            .unwrap();
        assert!(session.principal.can(Permission::ManageNews));
        assert!(!session.principal.can(Permission::ManageRoles));

        let login = service.login("alice", &role.access_code).await.unwrap();
        assert_eq!(login.principal.user.id, session.principal.user.id);

        let taken = service.redeem_access_code("alice", &role.access_code).await;
        assert!(matches!(taken, Err(AccessError::Conflict(_))));

        service
            .redeem_access_code("bob", &role.access_code)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redeem_is_case_sensitive() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Editor", Permissions::none())
            .await
            .unwrap();

        let lowered = role.access_code.to_lowercase();
        let result = service.redeem_access_code("alice", &lowered).await;
        assert!(matches!(result, Err(AccessError::Unauthorized(_))));
        assert!(service
            .storage()
            .get_user_by_username("alice")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_username_validation() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Editor", Permissions::none())
            .await
            .unwrap();

        assert!(matches!(
            service.redeem_access_code("   ", &role.access_code).await,
            Err(AccessError::Invalid(_))
        ));
        let long = "x".repeat(MAX_USERNAME_LENGTH + 1);
        assert!(matches!(
            service.redeem_access_code(&long, &role.access_code).await,
            Err(AccessError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_management_requires_manage_roles() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Editor", Permissions::none().with(Permission::ManageNews))
            .await
            .unwrap();
        let alice = service
            .redeem_access_code("alice", &role.access_code)
            .await
            .unwrap()
            .principal;

        assert!(matches!(
            service.create_role(&alice, "Sneaky", Permissions::all()).await,
            Err(AccessError::Forbidden(_))
        ));
        assert!(matches!(
            service.regenerate_code(&alice, &role.id).await,
            Err(AccessError::Forbidden(_))
        ));
        assert!(matches!(
            service.list_users(&alice).await,
            Err(AccessError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_role(&alice, &role.id).await,
            Err(AccessError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_regenerate_code() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Press", Permissions::none())
            .await
            .unwrap();
        let holder = service
            .redeem_access_code("early", &role.access_code)
            .await
            .unwrap();

        let updated = service.regenerate_code(&gov, &role.id).await.unwrap();
        assert_ne!(updated.access_code, role.access_code);

        assert!(matches!(
            service.redeem_access_code("late", &role.access_code).await,
            Err(AccessError::Unauthorized(_))
        ));
        service
            .redeem_access_code("late", &updated.access_code)
            .await
            .unwrap();

        let still_there = service.authenticate(&holder.token).await.unwrap();
        assert_eq!(still_there.role_name(), "Press");

        assert!(matches!(
            service.regenerate_code(&gov, "missing").await,
            Err(AccessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_role_applies_to_holders() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Clerk", Permissions::none())
            .await
            .unwrap();
        let clerk = service
            .redeem_access_code("clerk", &role.access_code)
            .await
            .unwrap()
            .principal;
        assert!(!service
            .authorize(&clerk.user, Permission::ManageLegislation)
            .await
            .unwrap());

        let update = RoleUpdate {
            name: Some("Senior Clerk".to_string()),
            permissions: Some(Permissions::none().with(Permission::ManageLegislation)),
        };
        let updated = service.update_role(&gov, &role.id, update).await.unwrap();
        assert_eq!(updated.name, "Senior Clerk");
        assert_eq!(updated.access_code, role.access_code);

        assert!(service
            .authorize(&clerk.user, Permission::ManageLegislation)
            .await
            .unwrap());

        let blank = RoleUpdate {
            name: Some(" ".to_string()),
            permissions: None,
        };
        assert!(matches!(
            service.update_role(&gov, &role.id, blank).await,
            Err(AccessError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_role_with_holders() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Temp", Permissions::none())
            .await
            .unwrap();
        let holder = service
            .redeem_access_code("temp", &role.access_code)
            .await
            .unwrap()
            .principal;

        assert!(matches!(
            service.delete_role(&gov, &role.id).await,
            Err(AccessError::Conflict(_))
        ));

        service.delete_user(&gov, &holder.user.id).await.unwrap();
        service.delete_role(&gov, &role.id).await.unwrap();
        assert!(matches!(
            service.get_role(&gov, &role.id).await,
            Err(AccessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user_guards() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;

        assert!(matches!(
            service.delete_user(&gov, &gov.user.id).await,
            Err(AccessError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_user(&gov, "missing").await,
            Err(AccessError::NotFound(_))
        ));

        let role = service
            .create_role(&gov, "Admins", Permissions::none().with(Permission::ManageRoles))
            .await
            .unwrap();
        let admin = service
            .redeem_access_code("admin", &role.access_code)
            .await
            .unwrap()
            .principal;
        assert!(matches!(
            service.delete_user(&admin, &gov.user.id).await,
            Err(AccessError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_user_token_rejected() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Editor", Permissions::none())
            .await
            .unwrap();
        let session = service
            .redeem_access_code("alice", &role.access_code)
            .await
            .unwrap();

        service
            .delete_user(&gov, &session.principal.user.id)
            .await
            .unwrap();
        assert!(matches!(
            service.authenticate(&session.token).await,
            Err(AccessError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_named() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;

        assert!(service
            .authorize_named(&gov.user, "can_manage_leadership")
            .await
            .unwrap());
        assert!(matches!(
            service.authorize_named(&gov.user, "launch_missiles").await,
            Err(AccessError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_role_grants_nothing() {
        let (service, _dir) = service().await;
        let orphan = User::new(
            "orphan",
            RoleRef::Standard {
                role_id: "deleted-role".to_string(),
            },
            None,
        );

        let principal = service.resolve(orphan.clone()).await.unwrap();
        assert_eq!(principal.grant, Grant::Unassigned);
        for permission in Permission::ALL {
            assert!(!service.authorize(&orphan, permission).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_public_roles_hide_codes() {
        let (service, _dir) = service().await;
        let gov = governor(&service).await;
        let role = service
            .create_role(&gov, "Editor", Permissions::none())
            .await
            .unwrap();

        let public = service.list_public_roles().await.unwrap();
        assert_eq!(public.len(), 1);
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains(&role.access_code));
    }
}
