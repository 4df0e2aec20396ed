// src/main.rs
use deal_desk::adapter::ExpiryCoordinator;
use deal_desk::application::service::NotificationDispatcher;
use deal_desk::application::usecase::LifecycleEngine;
use deal_desk::config::Config;
use deal_desk::domain::errors::AppResult;
use deal_desk::domain::repository::RecordStore;
use deal_desk::infrastructure::{InMemoryStore, LogNotifier};

use std::sync::Arc;
use tokio::signal::ctrl_c;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting deal_desk v{}", env!("CARGO_PKG_VERSION"));

    // Open the record store
    let store = match &config.store.snapshot_path {
        Some(path) => {
            log::info!("Using store snapshot {}", path);
            InMemoryStore::open(path).await?
        }
        None => {
            log::warn!("STORE_SNAPSHOT_PATH not set, records are kept in memory only");
            InMemoryStore::new()
        }
    };
    let store = Arc::new(store);
    store.health_check().await?;

    // Notification delivery
    let (dispatcher, _dispatcher_task) = NotificationDispatcher::spawn(
        Arc::new(LogNotifier::new()),
        config.dispatch.queue_capacity,
    );

    // Lifecycle engine and expiry coordinator
    let engine = Arc::new(LifecycleEngine::new(
        store.clone(),
        store.clone(),
        dispatcher.clone(),
    ));
    let mut coordinator = ExpiryCoordinator::new(engine, store.clone(), config.expiry.clone());
    coordinator.start();

    // Wait for shutdown signal
    log::info!("Deal desk is running. Press Ctrl+C to stop.");
    ctrl_c().await?;

    // Shutdown
    log::info!("Shutting down...");
    coordinator.stop().await;
    dispatcher.flush().await;

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}
