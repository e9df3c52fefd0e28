//! `CategorizationWorker` (spec §4.I): a cooperative, single-threaded loop
//! that dequeues jobs, re-enters the engine, and persists status
//! transitions. No retry on the worker — retries are a policy decision of
//! the caller.

use crate::engine::{CategorizationEngine, CategorizeOptions, EngineConfig};
use crate::jobs::{JobQueue, JobStore};
use crate::store::jobs::JobStatus;
use crate::cache::Cache;
use crate::store::StoreRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct CategorizationWorker {
    queue: Arc<JobQueue>,
    job_store: Arc<JobStore>,
    registry: Arc<StoreRegistry>,
    cache: Arc<Cache>,
    engine_config: EngineConfig,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CategorizationWorker {
    pub fn new(
        queue: Arc<JobQueue>,
        job_store: Arc<JobStore>,
        registry: Arc<StoreRegistry>,
        cache: Arc<Cache>,
        engine_config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            job_store,
            registry,
            cache,
            engine_config,
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        })
    }

    /// Spawns the drain loop as a background task. Restarting after `stop()`
    /// resumes processing from the next `PENDING` item; any job already
    /// `IN_PROGRESS` when the worker stopped is left alone.
    pub async fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        let worker = self.clone();
        let handle = tokio::spawn(async move { worker.drain_loop().await });
        *self.handle.lock().await = Some(handle);
    }

    async fn drain_loop(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            let Some((job_id, user_id)) = self.queue.dequeue().await else {
                break;
            };
            self.process_one(&job_id, &user_id).await;
        }
    }

    async fn process_one(&self, job_id: &str, user_id: &str) {
        let Ok(Some(job)) = self.job_store.get(job_id, user_id).await else {
            return;
        };

        if !self.job_store.transition(job_id, user_id, JobStatus::InProgress, None, None).await.unwrap_or(false) {
            return;
        }

        let opts = CategorizeOptions {
            force_refresh: job.request_params.get("forceRefresh").and_then(|v| v.as_bool()).unwrap_or(false),
            year: job.request_params.get("year").and_then(|v| v.as_i64()).map(|y| y as i32),
        };

        let outcome = match self.registry.get(user_id).await {
            Ok(store) => {
                let engine = CategorizationEngine::new(store, self.cache.clone(), self.engine_config.clone());
                engine.categorize_emails(opts, user_id).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(summary) => {
                let results = serde_json::json!({
                    "processed": summary.processed,
                    "categories": summary.categories,
                });
                let _ = self
                    .job_store
                    .transition(job_id, user_id, JobStatus::Completed, Some(results), None)
                    .await;
            }
            Err(e) => {
                let _ = self
                    .job_store
                    .transition(job_id, user_id, JobStatus::Failed, None, Some(e.to_string()))
                    .await;
            }
        }
    }

    /// Signals cooperative shutdown: no in-flight job is killed, the next
    /// dequeue observes the stop signal and exits.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.queue.shutdown();
    }

    /// Blocks until the current job's status transition is persisted and the
    /// drain loop has exited.
    pub async fn wait_for_shutdown(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::jobs::Job;
    use crate::store::EmailIndex;

    #[tokio::test]
    async fn worker_drains_a_single_job_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(StoreRegistry::new(dir.path()));
        let store = registry.get("u1").await.unwrap();

        let mut email = EmailIndex::new_minimal("e1", Some("u1".to_string()));
        email.subject = "hello".to_string();
        email.date = chrono::Utc::now().timestamp_millis();
        email.year = 2024;
        store.upsert_email_index(&email, None).await.unwrap();

        let job_backing_store = Arc::new(crate::store::Store::open_in_memory().await.unwrap());
        let job_store = Arc::new(JobStore::new(job_backing_store));
        let job = Job::new("j1", "categorization", "u1", serde_json::json!({"year": 2024}));
        job_store.insert(&job).await.unwrap();

        let queue = Arc::new(JobQueue::new());
        let cache = Arc::new(Cache::default());
        let worker = CategorizationWorker::new(queue.clone(), job_store.clone(), registry, cache, EngineConfig::default());

        worker.start().await;
        queue.add_job("j1", "u1").await;

        for _ in 0..200 {
            if let Some(fetched) = job_store.get("j1", "u1").await.unwrap() {
                if fetched.status == JobStatus::Completed {
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        worker.stop();
        worker.wait_for_shutdown().await;

        let fetched = job_store.get("j1", "u1").await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
    }
}
