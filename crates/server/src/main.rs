mod error;
mod routes;
mod storage;
mod verifier;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post},
    Router,
};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use storage::Db;
use verifier::TokenVerifier;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub verifier: TokenVerifier,
    pub config: AppConfig,
}

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub webhook_secret: String,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Pick the token verification strategy from the environment. A JWKS URL
/// switches to local RS256 verification; otherwise remote introspection is
/// used and the IdP secret key is mandatory.
fn load_verifier() -> anyhow::Result<TokenVerifier> {
    if let Some(jwks_url) = env_opt("IDP_JWKS_URL") {
        let issuer = env_opt("IDP_ISSUER");
        tracing::info!("token verification: local JWKS ({jwks_url})");
        return Ok(TokenVerifier::jwks(jwks_url, issuer));
    }

    let Some(secret_key) = env_opt("IDP_SECRET_KEY") else {
        anyhow::bail!("IDP_SECRET_KEY must be set (or IDP_JWKS_URL for local verification)");
    };
    let api_base = env_opt("IDP_API_BASE").unwrap_or_else(|| "https://api.clerk.com/v1".into());
    tracing::info!("token verification: remote introspection ({api_base})");
    Ok(TokenVerifier::introspection(api_base, secret_key))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablier_server=info,tower_http=info".into()),
        )
        .init();

    // Data directory
    let data_dir = std::env::var("TABLIER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    // Initialize database
    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let verifier = load_verifier()?;

    let webhook_secret = std::env::var("IDP_WEBHOOK_SECRET").unwrap_or_default();
    if webhook_secret.is_empty() {
        tracing::warn!("IDP_WEBHOOK_SECRET not set — identity webhooks will be rejected");
    }

    let base_url = env_opt("BASE_URL").unwrap_or_else(|| "http://localhost:3000".into());

    let config = AppConfig {
        base_url: base_url.clone(),
        webhook_secret,
    };

    let uploads_dir = db.uploads_dir();
    std::fs::create_dir_all(&uploads_dir)?;

    let state = AppState {
        db,
        verifier,
        config,
    };

    // Build API routes
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Identity sync
        .route("/webhooks/identity", post(routes::webhook::receive))
        // Current user
        .route("/v1/me", get(routes::auth::me))
        // Restaurant settings
        .route(
            "/v1/restaurant/settings",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024)) // logo uploads
        // Dashboard
        .route("/v1/dashboard/stats", get(routes::stats::stats))
        // Menu
        .route(
            "/v1/dishes",
            get(routes::menu::list_dishes).post(routes::menu::create_dish),
        )
        .route("/v1/dishes/{id}", delete(routes::menu::delete_dish))
        // Staff
        .route("/v1/servers", get(routes::menu::list_servers));

    let app = Router::new()
        .nest("/api", api)
        // Uploaded logos
        .nest_service("/uploads", ServeDir::new(&uploads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    tracing::info!("starting server at {base_url}");

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
