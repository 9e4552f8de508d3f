/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use vetconnect_api::{app::AppState, config::Config, email::LogMailer};
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, Arc::new(LogMailer))?;
/// let app = vetconnect_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    chat::ChatService,
    config::Config,
    email::Mailer,
    error::ApiError,
    middleware::{
        csrf::{csrf_layer, CSRF_HEADERS},
        rate_limit::{rate_limit_layer, RateLimit, RateLimiter},
        request_log::{request_log_layer, AuthenticatedUser, ClientIp},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use vetconnect_shared::{
    audit::{self, AuditAction, AuditEntry},
    auth::{
        authorization::require_role,
        middleware::{authenticate, extract_bearer, AuthContext},
    },
    models::user::UserRole,
};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Verification email delivery
    pub mailer: Arc<dyn Mailer>,

    /// Auth endpoint limiter
    pub rate_limiter: Arc<RateLimiter>,

    /// Booking assistant sessions
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Creates new application state
    ///
    /// # Errors
    ///
    /// Fails if `REDIS_URL` is set but cannot be parsed.
    pub fn new(db: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let limit = RateLimit::per_minute(config.rate_limit.auth_per_minute);
        let rate_limiter = match &config.rate_limit.redis_url {
            Some(url) => {
                tracing::info!("Using Redis rate limiter");
                RateLimiter::with_redis(limit, url)?
            }
            None => RateLimiter::in_memory(limit),
        };
        let chat = ChatService::from_config(&config.chat);

        Ok(Self {
            db,
            config: Arc::new(config),
            mailer,
            rate_limiter: Arc::new(rate_limiter),
            chat: Arc::new(chat),
        })
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health, /test-db                      (public)
/// └── /api
///     ├── POST /register, /login, /resend-verification   (rate limited)
///     ├── GET  /verify/:token, /csrf-token
///     ├── POST /chat, /chat/session/reset
///     ├── POST /logout, GET /me                          (JWT)
///     ├── /appointments                                  (JWT)
///     └── /admin/...                                     (JWT + admin)
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, tracing,
/// tracked-path access log, CSRF check, then per-route rate limiting and
/// authentication.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/test-db", get(routes::health::test_db));

    let limited_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/resend-verification", post(routes::auth::resend_verification))
        .layer(from_fn_with_state(state.clone(), rate_limit_layer));

    let public_routes = Router::new()
        .route("/verify/:token", get(routes::auth::verify_email))
        .route("/csrf-token", get(routes::auth::csrf_token))
        .route("/chat", post(routes::chat::chat))
        .route("/chat/session/reset", post(routes::chat::reset_session));

    let account_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route(
            "/appointments",
            get(routes::appointments::list_appointments).post(routes::appointments::create_appointment),
        )
        .route("/appointments/:id/cancel", patch(routes::appointments::cancel_appointment))
        .route(
            "/appointments/:id/reschedule",
            patch(routes::appointments::reschedule_appointment),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    // Layers run bottom to top: authentication, then the admin check
    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id", get(routes::admin::get_user))
        .route("/users/:id/status", patch(routes::admin::update_user_status))
        .route("/users/:id/role", patch(routes::admin::update_user_role))
        .route("/appointments", get(routes::admin::list_appointments))
        .route(
            "/appointments/:id/status",
            patch(routes::admin::update_appointment_status),
        )
        .route("/audit-logs", get(routes::admin::list_audit_logs))
        .route("/stats", get(routes::admin::stats))
        .layer(from_fn_with_state(state.clone(), require_admin_layer))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let api_routes = Router::new()
        .merge(limited_auth_routes)
        .merge(public_routes)
        .merge(account_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(from_fn(csrf_layer))
        .layer(from_fn(request_log_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.is_production()))
        .with_state(state)
}

/// CORS for the web client: its origin only, with cookies
fn cors_layer(config: &Config) -> CorsLayer {
    let origin = HeaderValue::from_str(&config.api.frontend_url)
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000"));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list(
            [header::AUTHORIZATION, header::CONTENT_TYPE]
                .into_iter()
                .chain(CSRF_HEADERS.into_iter().map(HeaderName::from_static)),
        ))
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, rejects blacklisted tokens and injects the
/// [`AuthContext`] into request extensions. The user id is also placed in
/// the response extensions for the access log.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;
    let auth = authenticate(&state.db, state.jwt_secret(), token).await?;
    let user_id = auth.user_id;

    req.extensions_mut().insert(auth);

    let mut response = next.run(req).await;
    response.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(response)
}

/// Admin role check, run after [`jwt_auth_layer`]
///
/// Denials are audited as `FORBIDDEN_ACCESS`.
async fn require_admin_layer(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("Access denied. No token provided.".to_string()))?;

    if let Err(denied) = require_role(&auth, UserRole::Admin) {
        audit::record(
            &state.db,
            AuditEntry::new(AuditAction::ForbiddenAccess)
                .actor(&auth)
                .detail(json!({
                    "method": req.method().as_str(),
                    "path": req.uri().path(),
                    "required_role": UserRole::Admin.as_str(),
                }))
                .ip(ip),
        )
        .await;

        return Err(denied.into());
    }

    Ok(next.run(req).await)
}
