//! `JobStore` (spec §4.G): a process-wide singleton over a single shared
//! Store. Every read takes `user_id` so a lookup can never cross tenants.

use crate::error::Result;
use crate::store::jobs::{CleanupJobExtra, Job, JobStatus};
use crate::store::Store;
use std::sync::Arc;

pub struct JobStore {
    store: Arc<Store>,
}

impl JobStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn insert(&self, job: &Job) -> Result<()> {
        self.store.insert_job(job).await
    }

    pub async fn get(&self, job_id: &str, user_id: &str) -> Result<Option<Job>> {
        self.store.get_job(job_id, user_id).await
    }

    pub async fn transition(
        &self,
        job_id: &str,
        user_id: &str,
        next: JobStatus,
        results: Option<serde_json::Value>,
        error_details: Option<String>,
    ) -> Result<bool> {
        self.store.transition_job(job_id, user_id, next, results, error_details).await
    }

    pub async fn update_progress(&self, job_id: &str, user_id: &str, progress: i64) -> Result<()> {
        self.store.update_job_progress(job_id, user_id, progress).await
    }

    pub async fn insert_cleanup_extra(&self, extra: &CleanupJobExtra) -> Result<()> {
        self.store.insert_cleanup_job_extra(extra).await
    }

    pub async fn update_cleanup_progress(&self, extra: &CleanupJobExtra) -> Result<()> {
        self.store.update_cleanup_job_progress(extra).await
    }

    /// Deletes rows with `created_at` older than `now - max_age_days` (0 means
    /// "all"). Returns the number of rows deleted.
    pub async fn cleanup_old_jobs(&self, max_age_days: i64, user_id: Option<&str>) -> Result<i64> {
        self.store.cleanup_old_jobs(max_age_days, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transition_rejects_cross_user_lookup() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let job_store = JobStore::new(store);
        let job = Job::new("j1", "categorization", "u1", serde_json::json!({}));
        job_store.insert(&job).await.unwrap();

        assert!(job_store.get("j1", "u2").await.unwrap().is_none());
        assert!(!job_store.transition("j1", "u2", JobStatus::InProgress, None, None).await.unwrap());
    }
}
