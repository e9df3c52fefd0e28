//! mailindex server binary
//!
//! Wires the shared singletons (config, store registry, cache, job queue and
//! store, categorization worker) and keeps the process alive until `Ctrl+C`,
//! running the worker's drain loop and a periodic expired-file sweep.

use mailindex::file_acl::{FileAccessControl, FileAclConfig};
use mailindex::jobs::{CategorizationWorker, JobQueue, JobStore};
use mailindex::prelude::*;
use mailindex::store::StoreRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.ensure_dirs().await?;

    info!(storage_path = %config.storage_path.display(), "mailindex server starting");

    let registry = Arc::new(StoreRegistry::new(&config.storage_path));
    let cache = Arc::new(Cache::default());
    let job_backing_store = registry.get_legacy().await?;
    let job_store = Arc::new(JobStore::new(job_backing_store));
    let queue = Arc::new(JobQueue::new());

    let worker = CategorizationWorker::new(
        queue.clone(),
        job_store.clone(),
        registry.clone(),
        cache.clone(),
        EngineConfig::default(),
    );
    worker.start().await;
    info!("categorization worker started");

    let sweep_registry = registry.clone();
    let sweep_handle = tokio::spawn(async move { run_sweep_loop(sweep_registry).await });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    worker.stop();
    worker.wait_for_shutdown().await;
    sweep_handle.abort();
    registry.cleanup().await;

    info!("mailindex server stopped");
    Ok(())
}

/// Periodically expires files across every user with a store on disk.
async fn run_sweep_loop(registry: Arc<StoreRegistry>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let users = match registry.list().await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "sweep: failed to list users");
                continue;
            }
        };
        for user_id in users {
            let store = match registry.get(&user_id).await {
                Ok(store) => store,
                Err(e) => {
                    warn!(error = %e, user_id = %user_id, "sweep: failed to open store");
                    continue;
                }
            };
            let acl = FileAccessControl::new(store, FileAclConfig::default());
            match acl.cleanup_expired_files().await {
                Ok(count) if count > 0 => info!(user_id = %user_id, count, "sweep: expired files removed"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, user_id = %user_id, "sweep: cleanup failed"),
            }
        }
    }
}
