/// Application state and router builder
///
/// This module defines the shared application state and provides a
/// function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use choreboard_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = choreboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    routing::{delete, get, patch, post, put},
    Router,
};
use choreboard_shared::auth::middleware::jwt_auth_middleware;
use choreboard_shared::realtime::FamilyChannels;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Realtime channel registry (family id -> subscribers)
    pub channels: Arc<FamilyChannels>,

    /// Shared HTTP client for outbound identity provider calls
    pub http: reqwest::Client,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            channels: Arc::new(FamilyChannels::new()),
            http: reqwest::Client::new(),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// /
/// ├── /health                                      # Health check (public)
/// ├── /auth/                                       # Authentication (public)
/// │   ├── POST /register
/// │   ├── POST /login
/// │   ├── POST /refresh
/// │   └── POST /social
/// ├── /families                                    # (authenticated)
/// │   ├── POST   /                                 # Create family
/// │   ├── GET    /                                 # List my families
/// │   ├── POST   /join                             # Join by invite code
/// │   ├── GET    /:id                              # Get family
/// │   ├── POST   /:id/invite                       # Generate invite code
/// │   ├── PATCH  /:familyId/members/:memberId/role # Change member role
/// │   └── GET|POST /:familyId/tasks                # List/create tasks
/// ├── /tasks                                       # (authenticated)
/// │   ├── GET    /my                               # My assigned tasks
/// │   ├── GET|PUT|DELETE /:taskId                  # Task detail/update/delete
/// │   ├── PATCH  /:taskId/status                   # Set status
/// │   ├── GET|POST /:taskId/comments               # Comments
/// │   └── POST   /:taskId/reactions                # Toggle reaction
/// ├── /notifications                               # (authenticated)
/// │   ├── GET    /                                 # List (lazy overdue)
/// │   └── PATCH  /:id/read                         # Mark as read
/// └── /realtime                                    # WebSocket (token-authenticated)
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/social", post(routes::auth::social_login));

    // Family routes (require JWT authentication)
    let family_routes = Router::new()
        .route("/", post(routes::families::create_family))
        .route("/", get(routes::families::list_families))
        .route("/join", post(routes::families::join_family))
        .route("/:family_id", get(routes::families::get_family))
        .route("/:family_id/invite", post(routes::families::create_invite_code))
        .route(
            "/:family_id/members/:member_id/role",
            patch(routes::families::update_member_role),
        )
        .route("/:family_id/tasks", get(routes::tasks::list_family_tasks))
        .route("/:family_id/tasks", post(routes::tasks::create_task));

    // Task routes (require JWT authentication)
    let task_routes = Router::new()
        .route("/my", get(routes::tasks::my_tasks))
        .route("/:task_id", get(routes::tasks::get_task))
        .route("/:task_id", put(routes::tasks::update_task))
        .route("/:task_id", delete(routes::tasks::delete_task))
        .route("/:task_id/status", patch(routes::tasks::update_task_status))
        .route("/:task_id/comments", get(routes::tasks::list_comments))
        .route("/:task_id/comments", post(routes::tasks::create_comment))
        .route("/:task_id/reactions", post(routes::tasks::toggle_reaction));

    // Notification routes (require JWT authentication)
    let notification_routes = Router::new()
        .route("/", get(routes::notifications::list_notifications))
        .route("/:id/read", patch(routes::notifications::mark_as_read));

    // Shared JWT middleware validates the Bearer token and injects an
    // AuthContext; its errors are mapped into the API error payload shape.
    let protected = Router::new()
        .nest("/families", family_routes)
        .nest("/tasks", task_routes)
        .nest("/notifications", notification_routes)
        .layer(axum::middleware::from_fn({
            let secret = state.config.jwt.secret.clone();
            move |req: Request, next: Next| {
                let secret = secret.clone();
                async move {
                    jwt_auth_middleware(secret, req, next)
                        .await
                        .map_err(crate::error::ApiError::from)
                }
            }
        }));

    // WebSocket endpoint authenticates inside the upgrade handshake, since
    // browsers cannot set an Authorization header on WebSocket connections.
    let realtime_routes = Router::new().route("/realtime", get(routes::realtime::realtime_ws));

    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .merge(realtime_routes)
        .nest("/auth", auth_routes)
        .merge(protected)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::security::security_headers,
        ))
        .with_state(state)
}
