//! Main entry point for the editlock server.
//!
//! Loads configuration, installs logging and metrics, selects the lock
//! store, then serves the lock API until Ctrl+C / SIGTERM.

use std::sync::Arc;

use editlock_core::{ExpirySweeper, LockManager, SystemClock};
use editlock_server::{
    model::{AppState, Configuration},
    startup,
};
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    editlock_server::metrics::init_metrics();

    let settings = configuration.lock_settings();
    settings.validate()?;
    info!(
        ttl_secs = settings.ttl.as_secs(),
        heartbeat_secs = settings.heartbeat_interval.as_secs(),
        status_poll_secs = settings.status_poll_interval.as_secs(),
        "Lock settings loaded"
    );

    let store = startup::init_lock_store(&configuration).await?;
    let lock_manager = LockManager::new(store.clone(), settings);

    let shutdown = startup::wait_for_shutdown_signal();

    let sweeper_handle = if configuration.sweeper_enabled() {
        let sweeper = Arc::new(ExpirySweeper::new(
            store,
            Arc::new(SystemClock),
            configuration.sweeper_interval(),
        ));
        Some(sweeper.start(shutdown.subscribe()))
    } else {
        info!("Lock expiry sweeper disabled");
        None
    };

    let address = configuration.server_address();
    let port = configuration.server_port();
    let app_state = Arc::new(AppState::new(lock_manager));
    let server = startup::lock_server(app_state, address.clone(), port)?;
    info!("Lock server listening on {}:{}", address, port);

    let server_handle = server.handle();
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = shutdown_rx.recv().await;
        server_handle.stop(true).await;
    });

    server.await?;
    shutdown.shutdown();

    if let Some(handle) = sweeper_handle
        && let Err(e) = handle.await
    {
        warn!(error = %e, "Lock expiry sweeper ended abnormally");
    }

    info!("Lock server stopped");
    Ok(())
}
