//! courier-worker - persistent messaging-network worker.
//!
//! Keeps one authenticated session open to the messaging network, persists
//! the session across restarts, and accepts outbound sends over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use courier_connect::{ConnectConfig, ConnectionManager, SimClient};
use courier_core::{NetworkClient, SessionStore, StatusPublisher, TextPairingRenderer};
use courier_dispatch::{DispatchConfig, MessageDispatcher};
use courier_store::{FileStatusPublisher, FileStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod routes;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load()?;
    tracing::info!(?config, "courier-worker v{}", env!("CARGO_PKG_VERSION"));

    // The session store must be reachable at startup; a broken store means
    // the worker could never recover a session after a restart.
    let store = Arc::new(FileStore::new(&config.data_dir));
    store
        .probe()
        .await
        .context("session store is unreachable")?;
    let publisher = Arc::new(FileStatusPublisher::new(&config.data_dir));

    let (client, events) = SimClient::new();
    let manager = ConnectionManager::new(
        Arc::clone(&client) as Arc<dyn NetworkClient>,
        events,
        Arc::clone(&store) as Arc<dyn SessionStore>,
        publisher as Arc<dyn StatusPublisher>,
        Arc::new(TextPairingRenderer),
        ConnectConfig {
            backup_interval: config.backup_interval,
            backoff_initial: config.backoff_initial,
            backoff_max: config.backoff_max,
            max_reconnect_attempts: config.max_reconnect_attempts,
        },
    );
    let status = manager.status_watch();
    let record = manager.record_watch();
    tokio::spawn(manager.run());

    let dispatcher = Arc::new(MessageDispatcher::new(
        client as Arc<dyn NetworkClient>,
        status,
        DispatchConfig {
            domain_suffix: config.domain_suffix.clone(),
            min_delay: config.min_delay,
            max_delay: config.max_delay,
        },
    ));

    let app = routes::router(AppState { dispatcher, record });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("courier-worker listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
