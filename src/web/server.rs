//! API server implementation using Axum

use crate::auth::AccessService;
use crate::config::ServerConfig;
use crate::content::{ContentDesk, ContentKind};
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::rate_limit::LoginRateLimiter;
use super::{api, content};

/// How often stale rate limiter entries are dropped
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub access: Arc<AccessService>,
    pub desk: Arc<ContentDesk>,
    pub limiter: LoginRateLimiter,
}

impl AppState {
    /// Build state over one access service; the content desk shares its storage
    pub fn new(access: Arc<AccessService>) -> Self {
        let desk = Arc::new(ContentDesk::new(access.storage().clone()));
        Self {
            access,
            desk,
            limiter: LoginRateLimiter::default(),
        }
    }

    pub fn with_limiter(mut self, limiter: LoginRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }
}

impl FromRef<AppState> for Arc<AccessService> {
    fn from_ref(state: &AppState) -> Self {
        state.access.clone()
    }
}

impl FromRef<AppState> for Arc<ContentDesk> {
    fn from_ref(state: &AppState) -> Self {
        state.desk.clone()
    }
}

impl FromRef<AppState> for LoginRateLimiter {
    fn from_ref(state: &AppState) -> Self {
        state.limiter.clone()
    }
}

/// Build the router with all routes
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        // Authentication
        .route("/auth/login", post(api::login))
        .route("/auth/register", post(api::register))
        .route("/auth/register-governor", post(api::register_governor))
        .route("/auth/governor-exists", get(api::governor_exists))
        .route("/auth/check-governor", get(api::governor_exists))
        .route("/auth/me", get(api::me))
        // Roles
        .route("/roles", get(api::list_roles).post(api::create_role))
        .route("/roles/all", get(api::list_public_roles))
        .route(
            "/roles/{id}",
            get(api::get_role)
                .put(api::update_role)
                .delete(api::delete_role),
        )
        .route("/roles/{id}/regenerate-code", post(api::regenerate_code))
        // Users
        .route("/users", get(api::list_users))
        .route("/users/{id}", axum::routing::delete(api::delete_user))
        .route("/health", get(api::health));

    for kind in ContentKind::ALL {
        router = router.merge(content::routes(kind));
    }

    router.with_state(state)
}

/// HTTP server for the portal API
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ServerConfig, access: Arc<AccessService>) -> Self {
        Self {
            config,
            state: AppState::new(access),
        }
    }

    /// Build the router with tracing and optional CORS layers
    fn build_router(&self) -> Router {
        let router = router(self.state.clone()).layer(TraceLayer::new_for_http());

        if self.config.cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server until the process is stopped
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(&self.config.bind).await?;

        let limiter = self.state.limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });

        tracing::info!(bind = %self.config.bind, cors = self.config.cors, "Starting Statehouse API");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }

    /// Get the bind address
    pub fn bind_address(&self) -> &str {
        &self.config.bind
    }
}
