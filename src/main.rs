//! Pemuda Magelang - community content management

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pemuda_magelang::{
    api::{self, AppState},
    config::Config,
    db,
};

/// How often expired sessions, reset tokens and rate-limit windows are purged
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pemuda_magelang=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pemuda Magelang v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::build(pool, config)?;
    tracing::info!(theme = state.theme.active_theme(), "Services initialized");

    // Periodic cleanup (every 5 minutes)
    {
        let user_service = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                user_service.rate_limiter().cleanup().await;
                match user_service.cleanup_expired().await {
                    Ok((sessions, resets)) if sessions + resets > 0 => {
                        tracing::info!(sessions, resets, "Expired sessions and reset tokens purged");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Cleanup failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
