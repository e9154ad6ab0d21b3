//! Access control types for the Statehouse portal
//!
//! Provides:
//! - Permission enum naming each administrative capability
//! - Permissions flag bundle carried by a role
//! - Role and User records, with the governor modeled as a distinct role variant
//! - Principal: a user resolved against the store for one request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display name reported for the governor account
pub const GOVERNOR_ROLE_NAME: &str = "Governor";

/// Wire value of the governor role reference
pub const GOVERNOR_ROLE_ID: &str = "governor";

/// Administrative capabilities that a role can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create and edit ministries
    ManageMinistries,
    /// Create and edit news items
    ManageNews,
    /// Create and edit amendments
    ManageLegislation,
    /// Manage roles, access codes and user accounts
    ManageRoles,
    /// Create and edit leadership entries
    ManageLeadership,
    /// Remove content of any kind
    Delete,
}

impl Permission {
    /// Every permission, in declaration order
    pub const ALL: [Permission; 6] = [
        Permission::ManageMinistries,
        Permission::ManageNews,
        Permission::ManageLegislation,
        Permission::ManageRoles,
        Permission::ManageLeadership,
        Permission::Delete,
    ];

    /// Stable snake_case name of the permission
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageMinistries => "manage_ministries",
            Permission::ManageNews => "manage_news",
            Permission::ManageLegislation => "manage_legislation",
            Permission::ManageRoles => "manage_roles",
            Permission::ManageLeadership => "manage_leadership",
            Permission::Delete => "delete",
        }
    }

    /// Parse multiple permissions from a comma-separated string
    pub fn parse_many(s: &str) -> Result<Vec<Permission>, UnknownPermission> {
        let mut permissions = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let permission: Permission = part.parse()?;
            if !permissions.contains(&permission) {
                permissions.push(permission);
            }
        }
        Ok(permissions)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a permission name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    /// Accepts `manage_news` as well as the legacy `can_manage_news` spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let name = normalized.strip_prefix("can_").unwrap_or(&normalized);
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Flag bundle granted by a role
///
/// Missing flags deserialize as `false`. Each flag is also accepted under its
/// `can_` prefixed name; when both spellings are sent the plain one wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PermissionFlags")]
pub struct Permissions {
    pub manage_ministries: bool,
    pub manage_news: bool,
    pub manage_legislation: bool,
    pub manage_roles: bool,
    pub manage_leadership: bool,
    pub delete: bool,
}

/// Wire form of [`Permissions`] with both spellings of every flag
#[derive(Deserialize)]
struct PermissionFlags {
    manage_ministries: Option<bool>,
    can_manage_ministries: Option<bool>,
    manage_news: Option<bool>,
    can_manage_news: Option<bool>,
    manage_legislation: Option<bool>,
    can_manage_legislation: Option<bool>,
    manage_roles: Option<bool>,
    can_manage_roles: Option<bool>,
    manage_leadership: Option<bool>,
    can_manage_leadership: Option<bool>,
    delete: Option<bool>,
    can_delete: Option<bool>,
}

impl From<PermissionFlags> for Permissions {
    fn from(flags: PermissionFlags) -> Self {
        let pick = |plain: Option<bool>, legacy: Option<bool>| plain.or(legacy).unwrap_or(false);
        Self {
            manage_ministries: pick(flags.manage_ministries, flags.can_manage_ministries),
            manage_news: pick(flags.manage_news, flags.can_manage_news),
            manage_legislation: pick(flags.manage_legislation, flags.can_manage_legislation),
            manage_roles: pick(flags.manage_roles, flags.can_manage_roles),
            manage_leadership: pick(flags.manage_leadership, flags.can_manage_leadership),
            delete: pick(flags.delete, flags.can_delete),
        }
    }
}

impl Permissions {
    /// No capabilities at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Every capability (what the governor effectively holds)
    pub fn all() -> Self {
        Self::from_iter(Permission::ALL)
    }

    /// Check whether a single flag is set
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ManageMinistries => self.manage_ministries,
            Permission::ManageNews => self.manage_news,
            Permission::ManageLegislation => self.manage_legislation,
            Permission::ManageRoles => self.manage_roles,
            Permission::ManageLeadership => self.manage_leadership,
            Permission::Delete => self.delete,
        }
    }

    /// Set a single flag
    pub fn set(&mut self, permission: Permission, granted: bool) {
        let flag = match permission {
            Permission::ManageMinistries => &mut self.manage_ministries,
            Permission::ManageNews => &mut self.manage_news,
            Permission::ManageLegislation => &mut self.manage_legislation,
            Permission::ManageRoles => &mut self.manage_roles,
            Permission::ManageLeadership => &mut self.manage_leadership,
            Permission::Delete => &mut self.delete,
        };
        *flag = granted;
    }

    /// Builder-style variant of [`Permissions::set`]
    pub fn with(mut self, permission: Permission) -> Self {
        self.set(permission, true);
        self
    }

    /// Iterate over the granted permissions
    pub fn granted(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL.into_iter().filter(|p| self.allows(*p))
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Permissions::none(), |acc, p| acc.with(p))
    }
}

/// A named permission bundle plus the code that admits new holders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique identifier
    pub id: String,
    /// Display name (e.g., "Press Office")
    pub name: String,
    /// Capabilities granted to holders
    pub permissions: Permissions,
    /// Current invitation code; unique across all roles
    pub access_code: String,
    /// When this role was created
    pub created_at: DateTime<Utc>,
    /// User that created the role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Role {
    /// Create a new role with a generated ID
    pub fn new(
        name: impl Into<String>,
        permissions: Permissions,
        access_code: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            permissions,
            access_code: access_code.into(),
            created_at: Utc::now(),
            created_by: None,
        }
    }

    /// Record the creating user
    pub fn created_by(mut self, user_id: impl Into<String>) -> Self {
        self.created_by = Some(user_id.into());
        self
    }

    /// Check if this role grants a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.allows(permission)
    }
}

/// Role listing safe for unauthenticated callers (no access code)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicRole {
    pub id: String,
    pub name: String,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

impl From<&Role> for PublicRole {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id.clone(),
            name: role.name.clone(),
            permissions: role.permissions,
            created_at: role.created_at,
        }
    }
}

/// Partial update of a role; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

/// Which role a user holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleRef {
    /// The single super-user; bypasses every permission check
    Governor,
    /// A regular role record
    Standard { role_id: String },
}

impl RoleRef {
    /// Wire identifier: `"governor"` or the role ID
    pub fn id(&self) -> &str {
        match self {
            RoleRef::Governor => GOVERNOR_ROLE_ID,
            RoleRef::Standard { role_id } => role_id,
        }
    }

    pub fn is_governor(&self) -> bool {
        matches!(self, RoleRef::Governor)
    }
}

/// A portal account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: String,
    /// Unique login name
    pub username: String,
    /// Bcrypt hash of the login secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Held role
    pub role: RoleRef,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a generated ID
    pub fn new(username: impl Into<String>, role: RoleRef, password_hash: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }

    pub fn is_governor(&self) -> bool {
        self.role.is_governor()
    }
}

/// Account listing without the credential hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role.id().to_string(),
            created_at: user.created_at,
        }
    }
}

/// What a user is allowed to do, resolved from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Governor: every check passes
    Governor,
    /// Holder of an existing role
    Role(Role),
    /// The referenced role no longer exists; nothing is granted
    Unassigned,
}

/// An authenticated user together with its resolved grant
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub grant: Grant,
}

impl Principal {
    pub fn new(user: User, grant: Grant) -> Self {
        Self { user, grant }
    }

    /// Governor passes every check; everyone else needs the role flag
    pub fn can(&self, permission: Permission) -> bool {
        match &self.grant {
            Grant::Governor => true,
            Grant::Role(role) => role.has_permission(permission),
            Grant::Unassigned => false,
        }
    }

    /// Effective flags (all set for the governor)
    pub fn permissions(&self) -> Permissions {
        match &self.grant {
            Grant::Governor => Permissions::all(),
            Grant::Role(role) => role.permissions,
            Grant::Unassigned => Permissions::none(),
        }
    }

    /// Human-readable role name
    pub fn role_name(&self) -> &str {
        match &self.grant {
            Grant::Governor => GOVERNOR_ROLE_NAME,
            Grant::Role(role) => &role.name,
            Grant::Unassigned => "",
        }
    }

    pub fn is_governor(&self) -> bool {
        matches!(self.grant, Grant::Governor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_parsing() {
        assert_eq!("manage_news".parse::<Permission>(), Ok(Permission::ManageNews));
        assert_eq!("CAN_DELETE".parse::<Permission>(), Ok(Permission::Delete));
        assert!("manage_everything".parse::<Permission>().is_err());
    }

    #[test]
    fn test_permission_parse_many() {
        let perms = Permission::parse_many("manage_news, delete,,manage_news").unwrap();
        assert_eq!(perms, vec![Permission::ManageNews, Permission::Delete]);

        let err = Permission::parse_many("manage_news,launch").unwrap_err();
        assert_eq!(err.0, "launch");
    }

    #[test]
    fn test_permissions_wire_format() {
        let perms: Permissions = serde_json::from_str(r#"{"manage_news": true}"#).unwrap();
        assert!(perms.allows(Permission::ManageNews));
        assert!(!perms.allows(Permission::ManageRoles));

        let legacy: Permissions =
            serde_json::from_str(r#"{"can_manage_roles": true, "can_delete": true}"#).unwrap();
        assert_eq!(
            legacy.granted().collect::<Vec<_>>(),
            vec![Permission::ManageRoles, Permission::Delete]
        );
    }

    #[test]
    fn test_permissions_accept_both_spellings_together() {
        let perms: Permissions = serde_json::from_str(
            r#"{"manage_news": true, "can_manage_news": true, "can_delete": true}"#,
        )
        .unwrap();
        assert_eq!(
            perms.granted().collect::<Vec<_>>(),
            vec![Permission::ManageNews, Permission::Delete]
        );

        let conflicting: Permissions =
            serde_json::from_str(r#"{"can_manage_roles": true, "manage_roles": false}"#).unwrap();
        assert!(!conflicting.allows(Permission::ManageRoles));

        let json = serde_json::to_value(perms).unwrap();
        assert_eq!(json["manage_news"], true);
        assert!(json.get("can_manage_news").is_none());
    }

    #[test]
    fn test_role_ref_serialization() {
        let json = serde_json::to_string(&RoleRef::Governor).unwrap();
        assert_eq!(json, r#"{"kind":"governor"}"#);

        let standard = RoleRef::Standard {
            role_id: "r-1".to_string(),
        };
        let parsed: RoleRef =
            serde_json::from_str(&serde_json::to_string(&standard).unwrap()).unwrap();
        assert_eq!(parsed.id(), "r-1");
        assert!(!parsed.is_governor());
    }

    #[test]
    fn test_governor_principal_bypasses_flags() {
        let governor = Principal::new(
            User::new("gov", RoleRef::Governor, None),
            Grant::Governor,
        );
        for permission in Permission::ALL {
            assert!(governor.can(permission));
        }
        assert_eq!(governor.permissions(), Permissions::all());
        assert_eq!(governor.role_name(), GOVERNOR_ROLE_NAME);
    }

    #[test]
    fn test_standard_principal_uses_role_flags() {
        let role = Role::new("Editor", Permissions::none().with(Permission::ManageNews), "ABCDEFGH");
        let user = User::new(
            "alice",
            RoleRef::Standard {
                role_id: role.id.clone(),
            },
            None,
        );
        let principal = Principal::new(user, Grant::Role(role));

        assert!(principal.can(Permission::ManageNews));
        assert!(!principal.can(Permission::ManageRoles));
        assert!(!principal.is_governor());
    }

    #[test]
    fn test_unassigned_principal_has_nothing() {
        let user = User::new(
            "orphan",
            RoleRef::Standard {
                role_id: "gone".to_string(),
            },
            None,
        );
        let principal = Principal::new(user, Grant::Unassigned);
        assert!(Permission::ALL.iter().all(|p| !principal.can(*p)));
    }

    #[test]
    fn test_user_summary_hides_hash() {
        let user = User::new("bob", RoleRef::Governor, Some("$2b$04$hash".to_string()));
        let summary = UserSummary::from(&user);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("hash"));
        assert!(json.contains(r#""role":"governor""#));
    }
}
