//! HTTP API for the Statehouse portal
//!
//! Provides JSON endpoints for:
//! - Login, access code registration and governor bootstrap
//! - Role, access code and user management
//! - Ministries, news, amendments and leadership content

mod api;
mod content;
mod error;
mod extract;
mod rate_limit;
mod server;

pub use api::{AuthResponse, UserView};
pub use error::ApiError;
pub use extract::{ClientIp, CurrentUser};
pub use rate_limit::{Attempt, LoginRateLimiter, RateLimitPolicy};
pub use server::{router, ApiServer, AppState};
