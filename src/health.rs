//! Process introspection: cached-store count, cache hit/miss stats, and the
//! job queue depth. Consumed by the server's health endpoint and the CLI's
//! status subcommand.

use crate::cache::CacheStats;
use crate::jobs::JobQueue;
use crate::store::StoreRegistry;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub cached_stores: usize,
    pub queued_jobs: usize,
    pub cache_stats: CacheStatsReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
}

impl From<CacheStats> for CacheStatsReport {
    fn from(stats: CacheStats) -> Self {
        Self { keys: stats.keys, hits: stats.hits, misses: stats.misses }
    }
}

pub struct HealthMonitor {
    registry: Arc<StoreRegistry>,
    cache: Arc<crate::cache::Cache>,
    queue: Arc<JobQueue>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<StoreRegistry>, cache: Arc<crate::cache::Cache>, queue: Arc<JobQueue>) -> Self {
        Self { registry, cache, queue }
    }

    pub async fn report(&self) -> HealthReport {
        HealthReport {
            cached_stores: self.registry.cached_count().await,
            queued_jobs: self.queue.length().await,
            cache_stats: self.cache.stats().await.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_reflects_current_registry_and_queue_state() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(StoreRegistry::new(dir.path()));
        registry.get("u1").await.unwrap();
        let cache = Arc::new(crate::cache::Cache::default());
        let queue = Arc::new(JobQueue::new());
        queue.add_job("j1", "u1").await;

        let monitor = HealthMonitor::new(registry, cache, queue);
        let report = monitor.report().await;
        assert_eq!(report.cached_stores, 1);
        assert_eq!(report.queued_jobs, 1);
    }
}
