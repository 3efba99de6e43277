use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use project_dashboard::{
    ai::GeminiClient,
    api::{create_router, AppState, RateLimiter},
    billing::StripeClient,
    config::Config,
    db,
    error::AppError,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,project_dashboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting project dashboard v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Configuration loaded");

    let db = db::connect(&config).await?;
    tracing::info!("Database ready: {}", config.database_url);

    let generator = Arc::new(GeminiClient::new(
        &config.gemini_api_base,
        config.gemini_api_key.clone(),
    ));
    let stripe = Arc::new(StripeClient::new(
        config.stripe_secret_key.clone(),
        &config.stripe_api_base,
    ));

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute, 60));
    tracing::info!(
        "Rate limiter configured ({} req/min per IP)",
        config.rate_limit_per_minute
    );

    let state = AppState {
        db,
        config: config.clone(),
        generator,
        stripe,
    };

    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                tracing::debug!("Rate limiter cache cleaned up");
            }
        });
    }

    let app = create_router(state, rate_limiter);

    let addr = config.server_address();
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Health check: http://{}/api/health", addr);
    tracing::info!("  /api/projects                        - projects (requires auth)");
    tracing::info!("  /api/projects/:id/tokens             - token packs (requires auth)");
    tracing::info!("  /api/projects/:id/assistants/:a/...  - AI and SQL assistants (requires auth)");
    tracing::info!("  /api/billing/...                     - subscriptions (requires auth)");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
