use anyhow::Context;
use tracing_subscriber::EnvFilter;

use academy_api::api::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("academy_api=info,tower_http=info")),
        )
        .init();

    let config = academy_api::config::config().clone();
    tracing::info!("Starting Academy API in {:?} mode", config.environment);

    let port = config.server.port;
    let state = AppState::build(config).await?;
    api::bootstrap(state.store.as_ref())
        .await
        .context("creating collections")?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Academy API listening on http://{}", bind_addr);
    axum::serve(listener, api::app(state)).await.context("server")?;
    Ok(())
}
