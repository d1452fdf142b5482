use std::sync::Arc;

use anyhow::Context;
use snekomatic::app::assemble;
use snekomatic::config::{AppConfig, DEFAULT_LOG_FILTER};
use snekomatic::github::ReqwestTransport;
use snekomatic::server::build_router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(?config, "starting up");

    let state = assemble(&config, Arc::new(ReqwestTransport::default()))?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
