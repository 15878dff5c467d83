use std::error::Error;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use venue_server::config::Config;
use venue_server::routes::create_routes;
use venue_server::services::{spawn_periodic_sweep, SeatingService};
use venue_server::store::{MemoryStore, PgStore, Store};
use venue_server::utils::SystemClock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("venue_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    match config.database_url.clone() {
        Some(url) => {
            let store = PgStore::connect(&url, config.database_max_connections).await?;
            tracing::info!("Successfully connected to database");

            store.migrate().await?;
            tracing::info!("Migrations run successfully");

            serve(store, config).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store (data is not persisted)");
            serve(MemoryStore::new(), config).await
        }
    }
}

async fn serve<S: Store>(store: S, config: Config) -> Result<(), Box<dyn Error>> {
    let service = SeatingService::new(store, Arc::new(SystemClock), config.hold_ttl());
    tracing::info!(
        hold_ttl_minutes = config.hold_ttl_minutes,
        "Seat holds expire after {} minutes",
        config.hold_ttl_minutes
    );

    let sweeper = config.sweep_interval().map(|every| {
        tracing::info!("Background sweep every {}s", every.as_secs());
        spawn_periodic_sweep(service.clone(), every)
    });

    let app = create_routes(service, &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
