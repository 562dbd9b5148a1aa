//! Mouth Metrics - Public professional profile pages

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mouth_metrics::{
    api::{self, AppState, Backends},
    config::Config,
    identity::{GoogleOAuth, GoogleOAuthClient, IdentityToolkitClient},
    services::LoginRateLimiter,
    users_api::HttpUserDirectory,
    views::ViewEngine,
};

/// Interval between rate limiter sweeps
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mouth_metrics=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mouth Metrics...");

    // Load configuration
    let config = Arc::new(Config::load_with_env(Path::new("config.yml"))?);
    tracing::info!("Configuration loaded");

    // Remote services
    let users = Arc::new(HttpUserDirectory::new(&config.users_api)?);
    let identity = Arc::new(IdentityToolkitClient::new(&config.identity)?);
    tracing::info!(users_api = %config.users_api.base_url, "Remote clients initialized");

    let google: Option<Arc<dyn GoogleOAuth>> = match &config.identity.google {
        Some(google) => {
            tracing::info!("Google sign-in enabled");
            let client = GoogleOAuthClient::new(google, config.identity.timeout_secs)?;
            Some(Arc::new(client) as Arc<dyn GoogleOAuth>)
        }
        None => None,
    };

    let rate_limiter = Arc::new(LoginRateLimiter::new());

    // Load templates
    let views = Arc::new(ViewEngine::new(config.server.templates_dir.as_deref())?);
    tracing::info!("Templates loaded");

    // Sweep stale rate limiter entries
    let sweeper = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            sweeper.cleanup().await;
        }
    });

    let state = AppState::new(
        config.clone(),
        Backends {
            users,
            identity,
            google,
            rate_limiter,
            views,
        },
    );
    tracing::info!("Services initialized");
    let app = api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
