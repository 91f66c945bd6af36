//! Zaman Web Server
//!
//! Axum-based REST API for the Zaman banking assistant.
//!
//! Security features:
//! - Bearer JWT authentication on every route except signup, login and health
//! - Restrictive CORS policy
//! - Input validation (pagination limits, upload size limits)
//! - Audit logging for API access
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use zaman_core::ai::{AIBackend, AIClient};
use zaman_core::db::Database;
use zaman_core::prompts::PromptLibrary;

mod handlers;
mod tokens;

pub use tokens::{AccessToken, Claims, TokenService, DEFAULT_TOKEN_TTL_MINUTES};

/// Maximum audio upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum JSON request body
pub const MAX_JSON_BODY: usize = 64 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

pub const SECRET_KEY_ENV: &str = "ZAMAN_SECRET_KEY";
pub const TOKEN_TTL_ENV: &str = "ZAMAN_TOKEN_TTL_MINUTES";
pub const ALLOWED_ORIGINS_ENV: &str = "ZAMAN_ALLOWED_ORIGINS";
pub const OPENING_BALANCE_ENV: &str = "ZAMAN_OPENING_BALANCE";

/// Signing secret used only with `--insecure-dev-secret`
pub const INSECURE_DEV_SECRET: &str = "zaman-insecure-dev-secret";

const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Routes reachable without a token
const PUBLIC_PATHS: [&str; 3] = ["/api/auth/signup", "/api/auth/login", "/api/health"];

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// HS256 signing secret for access tokens
    pub secret_key: String,
    /// Access token lifetime in minutes
    pub token_ttl_minutes: i64,
    /// Bank balance opened at signup
    pub opening_balance: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            secret_key: INSECURE_DEV_SECRET.to_string(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            opening_balance: 0.0,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the environment
    ///
    /// `ZAMAN_SECRET_KEY` is required unless `insecure_dev_secret` is set.
    pub fn from_env(insecure_dev_secret: bool) -> anyhow::Result<Self> {
        let secret_key = match std::env::var(SECRET_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => key,
            _ if insecure_dev_secret => {
                warn!("⚠️  Using the insecure development signing secret - do not expose to network!");
                INSECURE_DEV_SECRET.to_string()
            }
            _ => anyhow::bail!(
                "{} is not set. Set it, or pass --insecure-dev-secret for local development.",
                SECRET_KEY_ENV
            ),
        };

        let token_ttl_minutes = match std::env::var(TOKEN_TTL_ENV) {
            Ok(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| anyhow::anyhow!("{} must be a positive integer", TOKEN_TTL_ENV))?,
            Err(_) => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let allowed_origins = match std::env::var(ALLOWED_ORIGINS_ENV) {
            Ok(v) => parse_origins(&v),
            Err(_) => vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        };

        let opening_balance = match std::env::var(OPENING_BALANCE_ENV) {
            Ok(v) => v
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|b| b.is_finite() && *b >= 0.0)
                .ok_or_else(|| {
                    anyhow::anyhow!("{} must be a non-negative number", OPENING_BALANCE_ENV)
                })?,
            Err(_) => 0.0,
        };

        Ok(Self {
            allowed_origins,
            secret_key,
            token_ttl_minutes,
            opening_balance,
        })
    }
}

/// Split a comma-separated origin list
pub fn parse_origins(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub ai: Option<AIClient>,
    pub prompts: PromptLibrary,
    pub tokens: TokenService,
}

impl AppState {
    /// The AI client, or 503 when none is configured
    pub(crate) fn require_ai(&self) -> Result<&AIClient, AppError> {
        self.ai
            .as_ref()
            .ok_or_else(|| AppError::service_unavailable("AI service is not configured"))
    }
}

/// The authenticated user, placed in request extensions by `auth_middleware`
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Authentication middleware - validates the bearer token and resolves the user
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !path.starts_with("/api/") || PUBLIC_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        warn!(path = %path, "Unauthorized request - no bearer token");
        return AppError::unauthorized("Not authenticated").into_response();
    };

    let claims = match state.tokens.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(path = %path, error = %e, "Rejected access token");
            return AppError::unauthorized("Could not validate credentials").into_response();
        }
    };

    match state.db.get_user_by_username(&claims.sub) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser {
                id: user.id,
                username: user.username,
                email: user.email,
            });
            next.run(request).await
        }
        Ok(None) => AppError::not_found("User not found").into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// The user resolved by `auth_middleware`
pub(crate) fn current_user(request: &Request) -> Result<CurrentUser, AppError> {
    request
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))
}

/// Read and parse a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_JSON_BODY)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}

/// Create the application router
///
/// AI and prompts come from the environment.
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let ai = AIClient::from_env();
    match ai {
        Some(ref client) => info!(
            "AI backend configured: {} (model: {})",
            client.host(),
            client.model()
        ),
        None => info!("ℹ️  AI backend not configured (set OPENAI_COMPATIBLE_HOST to enable chat)"),
    }
    create_router_with_options(db, static_dir, config, ai, PromptLibrary::new())
}

/// Create the application router with explicit AI and prompt sources (for testing)
pub fn create_router_with_options(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    ai: Option<AIClient>,
    prompts: PromptLibrary,
) -> Router {
    let tokens = TokenService::new(
        &config.secret_key,
        chrono::Duration::minutes(config.token_ttl_minutes),
    );

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        ai,
        prompts,
        tokens,
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Auth
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/users/me", get(handlers::get_me))
        // Financial aims
        .route(
            "/financial-aims",
            get(handlers::list_aims).post(handlers::create_aim),
        )
        .route(
            "/financial-aims/:id",
            get(handlers::get_aim)
                .put(handlers::update_aim)
                .delete(handlers::delete_aim),
        )
        // Ledger
        .route(
            "/financial-transaction",
            get(handlers::list_financial_transactions)
                .post(handlers::create_financial_transaction),
        )
        .route(
            "/financial-transaction/:aim_id",
            get(handlers::list_aim_financial_transactions),
        )
        .route("/bank-account", get(handlers::get_bank_account))
        // Bank transactions
        .route("/transactions", get(handlers::list_transactions))
        .route(
            "/transactions/categories",
            get(handlers::list_transaction_categories),
        )
        .route(
            "/transactions/generate",
            post(handlers::generate_transactions),
        )
        .route("/transactions/:id", get(handlers::get_transaction))
        // Assistant
        .route("/chat", post(handlers::chat))
        .route("/chat/advice", get(handlers::finance_advice))
        .route(
            "/chat/sessions/:session_id",
            get(handlers::get_chat_session).delete(handlers::delete_chat_session),
        )
        .route(
            "/speech-to-text",
            post(handlers::speech_to_text)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + MAX_JSON_BODY)),
        )
        // Planning
        .route("/calculate-goal", post(handlers::calculate_goal))
        .route("/recommend-products", post(handlers::recommend_products))
        .route("/stress-relief-tips", get(handlers::stress_relief_tips))
        // Similarity
        .route(
            "/similarity/find-similar/:user_id",
            get(handlers::find_similar_users),
        )
        .route(
            "/similarity/compare/:user1_id/:user2_id",
            get(handlers::compare_users),
        )
        .route("/similarity/profile/:user_id", get(handlers::get_profile))
        // Audit log
        .route("/audit", get(handlers::list_audit_log));

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; media-src 'self' blob:; frame-ancestors 'none'",
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    check_ai_connection().await;

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "✅ AI backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "⚠️  AI backend configured but not responding: {} (model: {})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("ℹ️  AI backend not configured (set OPENAI_COMPATIBLE_HOST to enable chat)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::with_status(StatusCode::CONFLICT, msg)
    }

    pub fn bad_gateway(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_GATEWAY, msg)
    }

    pub fn service_unavailable(msg: &str) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    /// Map a core error, exposing only the user-facing kinds
    pub fn from_core(err: zaman_core::Error) -> Self {
        use zaman_core::Error;
        match err {
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::Conflict(msg) => Self::conflict(&msg),
            Error::InsufficientFunds(msg) | Error::InvalidData(msg) => Self::bad_request(&msg),
            Error::Auth(msg) => Self::unauthorized(&msg),
            Error::Ai(_) | Error::Http(_) => Self {
                internal: Some(err.into()),
                ..Self::bad_gateway("AI service error")
            },
            other => Self::from(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        let mut response = (self.status, body).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
