use anyhow::Context;

use atrium_cms::app::{app, AppState};
use atrium_cms::database::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = atrium_cms::config::config();
    tracing::info!("Starting atrium-cms in {:?} mode", config.environment);

    let pool = DatabaseManager::pool().await?;
    let state = AppState::new(pool);
    let router = app(state);

    // Allow tests or deployments to override the port via env.
    let port = std::env::var("ATRIUM_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("atrium-cms listening on http://{}", bind_addr);

    let result = axum::serve(listener, router).await;
    DatabaseManager::close().await;
    result.context("server exited")?;
    Ok(())
}
