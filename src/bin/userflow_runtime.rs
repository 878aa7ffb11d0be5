//! Runtime wiring: initial aggregation, live-sync task, shutdown handling.
//!
//! The object-store transport is pluggable behind the `ObjectStore` trait;
//! this binary runs over the in-process backend. An HTTP layer would consume
//! the `QueryHandle` this binary constructs.

use {
    std::sync::Arc,
    tokio::sync::{mpsc, watch, RwLock},
    userflow::{
        build_users, export_snapshot, Config, MemoryStore, ObjectStore, QueryHandle, SyncEngine,
        REFRESH_CHANNEL_CAPACITY,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!("Starting userflow");
    log::info!("   store endpoint: {}", config.store_endpoint);
    log::info!("   data bucket:    {}", config.data_bucket);
    log::info!("   result bucket:  {}", config.result_bucket);
    log::info!("   flush interval: {:?}", config.flush_interval);

    // Swap in a remote transport here; the engine only sees the trait.
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());

    // Initial full aggregation; a listing failure is fatal at startup.
    let aggregate = build_users(store.as_ref(), &config.data_bucket).await?;
    export_snapshot(
        store.as_ref(),
        &config.result_bucket,
        &config.snapshot_object,
        &aggregate,
    )
    .await?;
    let users = Arc::new(RwLock::new(aggregate));

    let events = store.subscribe(&config.data_bucket).await?;
    let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = SyncEngine::new(store.clone(), users.clone(), &config);
    let sync_task = tokio::spawn(engine.run(events, refresh_rx, shutdown_rx));

    // Handed to the request layer; kept alive here so force-refresh stays
    // wired even without one.
    let _query_handle = QueryHandle::new(users, refresh_tx);

    tokio::signal::ctrl_c().await?;
    log::info!("SIGINT received, shutting down");
    let _ = shutdown_tx.send(true);
    sync_task.await?;

    Ok(())
}
