//! JSON API handlers for authentication, roles and users

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::IpAddr;

use crate::auth::{
    AccessError, AccessResult, Permissions, Principal, PublicRole, Role, RoleUpdate, Session,
    UserSummary,
};

use super::error::ApiError;
use super::extract::{ClientIp, CurrentUser};
use super::server::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============== Views ==============

/// The authenticated user as seen by clients
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    /// `"governor"` or the role ID
    pub role: String,
    pub role_name: String,
    /// Effective flags (all set for the governor)
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for UserView {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.user.id.clone(),
            username: principal.user.username.clone(),
            role: principal.user.role.id().to_string(),
            role_name: principal.role_name().to_string(),
            permissions: principal.permissions(),
            created_at: principal.user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// ============== Requests ==============

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub access_code: String,
}

#[derive(Debug, Deserialize)]
pub struct GovernorRequest {
    pub username: String,
    pub password: String,
    pub governor_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Permissions,
}

// ============== Authentication ==============

/// Run a credential attempt behind the per-IP rate limiter
async fn rate_limited(
    state: &AppState,
    ip: IpAddr,
    credentials: impl Future<Output = AccessResult<Session>>,
) -> ApiResult<AuthResponse> {
    let attempt = state.limiter.begin(ip).map_err(ApiError::rate_limited)?;

    match credentials.await {
        Ok(session) => {
            attempt.succeeded();
            Ok(Json(AuthResponse {
                user: UserView::from(&session.principal),
                token: session.token,
                token_type: "bearer",
                expires_in: state.access.token_ttl().num_seconds(),
            }))
        }
        Err(e) => {
            if matches!(e, AccessError::Unauthorized(_)) {
                attempt.failed();
            }
            Err(e.into())
        }
    }
}

/// Log in with username and password
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(req) = payload?;
    rate_limited(&state, ip, state.access.login(&req.username, &req.password)).await
}

/// Create an account by redeeming a role's access code
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(req) = payload?;
    rate_limited(
        &state,
        ip,
        state.access.redeem_access_code(&req.username, &req.access_code),
    )
    .await
}

/// Register the governor account
pub async fn register_governor(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<GovernorRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(req) = payload?;
    rate_limited(
        &state,
        ip,
        state
            .access
            .bootstrap_governor(&req.username, &req.password, &req.governor_secret),
    )
    .await
}

#[derive(Debug, Serialize)]
pub struct GovernorExistsResponse {
    pub exists: bool,
}

pub async fn governor_exists(State(state): State<AppState>) -> ApiResult<GovernorExistsResponse> {
    let exists = state.access.governor_exists().await?;
    Ok(Json(GovernorExistsResponse { exists }))
}

pub async fn me(CurrentUser(principal): CurrentUser) -> Json<UserView> {
    Json(UserView::from(&principal))
}

// ============== Roles ==============

pub async fn list_roles(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Vec<Role>> {
    Ok(Json(state.access.list_roles(&actor).await?))
}

/// Roles without access codes; no authentication required
pub async fn list_public_roles(State(state): State<AppState>) -> ApiResult<Vec<PublicRole>> {
    Ok(Json(state.access.list_public_roles().await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    payload: Result<Json<CreateRoleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let Json(req) = payload?;
    let role = state
        .access
        .create_role(&actor, &req.name, req.permissions)
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn get_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Role> {
    Ok(Json(state.access.get_role(&actor, &id).await?))
}

pub async fn update_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<RoleUpdate>, JsonRejection>,
) -> ApiResult<Role> {
    let Json(update) = payload?;
    Ok(Json(state.access.update_role(&actor, &id, update).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    state.access.delete_role(&actor, &id).await?;
    Ok(MessageResponse::new("Role deleted"))
}

pub async fn regenerate_code(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Role> {
    Ok(Json(state.access.regenerate_code(&actor, &id).await?))
}

// ============== Users ==============

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Vec<UserSummary>> {
    let users = state.access.list_users(&actor).await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    state.access.delete_user(&actor, &id).await?;
    Ok(MessageResponse::new("User deleted"))
}

// ============== Health ==============

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = match state.access.storage().health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
