use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use vestnik_api::{build_router, AppState};
use vestnik_common::config::Config;
use vestnik_store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vestnik=info".parse()?))
        .init();

    let config = Config::api_from_env();
    config.log_redacted();

    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;

    let timezone = chrono_tz::Tz::from_str(&config.app_timezone)
        .map_err(|_| anyhow::anyhow!("invalid APP_TIMEZONE: {}", config.app_timezone))?;

    let state = AppState::new(store, timezone);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.health_port)).await?;
    tracing::info!(port = config.health_port, "vestnik-api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
