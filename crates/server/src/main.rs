use std::{net::SocketAddr, sync::Arc};

use server::{
    build_router,
    config::{load_settings, prepare_database_url},
    AppState,
};
use server_api::{events::log_events, ApiContext, EventBus, TokenIssuer};
use storage::Storage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let events = EventBus::new(EVENT_BUS_CAPACITY);
    tokio::spawn(log_events(events.subscribe()));

    if settings.uses_dev_secret() {
        warn!("JWT_SECRET is not set; signing tokens with the development secret");
    }

    let state = AppState {
        api: ApiContext::new(storage, Arc::new(events)),
        tokens: TokenIssuer::new(&settings.jwt_secret, settings.token_ttl_seconds),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, url = %settings.public_url(), "server is running");
    axum::serve(listener, app).await?;
    Ok(())
}
