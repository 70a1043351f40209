use remco_cms::app::{app, AppState};
use remco_cms::services::Backends;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up BACKEND_MODE, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = remco_cms::config::config();
    tracing::info!(
        "Starting Remco CMS in {:?} mode with {:?} backend",
        config.environment,
        config.backend.mode
    );

    if remco_cms::is_production!() && config.security.jwt_secret.is_empty() {
        tracing::warn!("SECURITY_JWT_SECRET is not set; bearer tokens are forwarded unverified");
    }

    let backends = Backends::from_config(&config.backend)?;
    let app = app(AppState::new(backends, config));

    let bind_addr = format!("{}:{}", config.server.bind_host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("Remco CMS listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
