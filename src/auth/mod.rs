//! Access control for the Statehouse portal
//!
//! Role-based access control with a single super-user:
//! - Roles are named, mutable permission bundles with a redeemable access code
//! - Users log in with a password or join by redeeming a role's access code
//! - The governor is created once with a bootstrap secret and passes every check

mod codes;
mod middleware;
mod password;
mod service;
mod tokens;
mod types;

pub use codes::{
    generate_access_code, is_well_formed, CODE_ALPHABET, DEFAULT_CODE_LENGTH, MIN_CODE_LENGTH,
};
pub use middleware::{authenticate, extract_bearer_token};
pub use password::{PasswordHasher, DEFAULT_COST};
pub use service::{
    require, AccessError, AccessResult, AccessService, Session, MAX_USERNAME_LENGTH,
};
pub use tokens::{Claims, TokenError, TokenIssuer};
pub use types::{
    Grant, Permission, Permissions, Principal, PublicRole, Role, RoleRef, RoleUpdate,
    UnknownPermission, User, UserSummary, GOVERNOR_ROLE_ID, GOVERNOR_ROLE_NAME,
};
