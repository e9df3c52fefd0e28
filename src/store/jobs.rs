//! Durable job records (spec §3 `Job`/`CleanupJob`, §4.G) backing the
//! process-wide `JobStore` singleton in [`crate::jobs::job_store`].

use super::{Param, Row, Store};
use crate::error::{MailIndexError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Monotonic status machine: `PENDING < IN_PROGRESS < {COMPLETED|FAILED|CANCELLED}`.
    /// No backward transitions, and no re-entering a terminal state.
    pub fn allows_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub request_params: serde_json::Value,
    pub progress: i64,
    pub results: Option<serde_json::Value>,
    pub error_details: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
    pub user_id: String,
}

impl Job {
    pub fn new(job_id: impl Into<String>, job_type: impl Into<String>, user_id: impl Into<String>, request_params: serde_json::Value) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            status: JobStatus::Pending,
            request_params,
            progress: 0,
            results: None,
            error_details: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            user_id: user_id.into(),
        }
    }
}

/// `CleanupJob`'s side-table fields (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupJobExtra {
    pub job_id: String,
    pub policy_id: Option<String>,
    pub triggered_by: String,
    pub priority: String,
    pub batch_size: i64,
    pub target_emails: Option<i64>,
    pub emails_analyzed: i64,
    pub emails_cleaned: i64,
    pub storage_freed: i64,
    pub errors_encountered: i64,
    pub current_batch: i64,
    pub total_batches: i64,
}

fn row_to_job(row: Row) -> Result<Job> {
    use sqlx::Row as _;
    let r = &row.0;
    let status_str: String = r.try_get("status").map_err(super::map_store_err)?;
    let status = JobStatus::parse(&status_str)
        .ok_or_else(|| MailIndexError::StoreError(format!("unknown job status {status_str}")))?;
    let request_params_str: String = r.try_get("request_params").unwrap_or_default();
    let results_str: Option<String> = r.try_get("results").unwrap_or(None);
    Ok(Job {
        job_id: r.try_get("job_id").map_err(super::map_store_err)?,
        job_type: r.try_get("job_type").map_err(super::map_store_err)?,
        status,
        request_params: serde_json::from_str(&request_params_str).unwrap_or(serde_json::json!({})),
        progress: r.try_get("progress").unwrap_or(0),
        results: results_str.and_then(|s| serde_json::from_str(&s).ok()),
        error_details: r.try_get("error_details").unwrap_or(None),
        created_at: r.try_get("created_at").map_err(super::map_store_err)?,
        started_at: r.try_get("started_at").unwrap_or(None),
        completed_at: r.try_get("completed_at").unwrap_or(None),
        updated_at: r.try_get("updated_at").map_err(super::map_store_err)?,
        user_id: r.try_get("user_id").map_err(super::map_store_err)?,
    })
}

impl Store {
    pub async fn insert_job(&self, job: &Job) -> Result<()> {
        let params: Vec<Param> = vec![
            job.job_id.clone().into(),
            job.job_type.clone().into(),
            job.status.as_str().into(),
            serde_json::to_string(&job.request_params).unwrap_or_default().into(),
            job.progress.into(),
            job.results.as_ref().map(|v| serde_json::to_string(v).unwrap_or_default()).into(),
            job.error_details.clone().into(),
            job.created_at.into(),
            job.started_at.into(),
            job.completed_at.into(),
            job.updated_at.into(),
            job.user_id.clone().into(),
        ];
        self.execute(
            "INSERT OR REPLACE INTO job_statuses (job_id, job_type, status, request_params, progress, results, error_details, created_at, started_at, completed_at, updated_at, user_id) VALUES (?,?,?,?,?,?,?,?,?,?,?,?)",
            &params,
        )
        .await?;
        Ok(())
    }

    /// `user_id` is required to prevent cross-tenant leakage through job lookups.
    pub async fn get_job(&self, job_id: &str, user_id: &str) -> Result<Option<Job>> {
        let row = self
            .query_optional(
                "SELECT * FROM job_statuses WHERE job_id = ? AND user_id = ?",
                &[job_id.into(), user_id.into()],
            )
            .await?;
        row.map(row_to_job).transpose()
    }

    /// Compare-and-set status transition. Returns `false` (no write performed)
    /// if the current status does not permit the requested transition.
    pub async fn transition_job(
        &self,
        job_id: &str,
        user_id: &str,
        next: JobStatus,
        results: Option<serde_json::Value>,
        error_details: Option<String>,
    ) -> Result<bool> {
        let Some(job) = self.get_job(job_id, user_id).await? else {
            return Ok(false);
        };
        if !job.status.allows_transition_to(next) {
            return Ok(false);
        }
        let now = chrono::Utc::now().timestamp_millis();
        let started_at = if next == JobStatus::InProgress { Some(now) } else { job.started_at };
        let completed_at = if next.is_terminal() { Some(now) } else { job.completed_at };

        let changes = self
            .execute(
                "UPDATE job_statuses SET status = ?, started_at = ?, completed_at = ?, results = ?, error_details = ?, updated_at = ? WHERE job_id = ? AND user_id = ?",
                &[
                    next.as_str().into(),
                    started_at.into(),
                    completed_at.into(),
                    results.as_ref().map(|v| serde_json::to_string(v).unwrap_or_default()).into(),
                    error_details.into(),
                    now.into(),
                    job_id.into(),
                    user_id.into(),
                ],
            )
            .await?;
        Ok(changes.changes > 0)
    }

    pub async fn update_job_progress(&self, job_id: &str, user_id: &str, progress: i64) -> Result<()> {
        self.execute(
            "UPDATE job_statuses SET progress = ?, updated_at = ? WHERE job_id = ? AND user_id = ?",
            &[
                progress.into(),
                chrono::Utc::now().timestamp_millis().into(),
                job_id.into(),
                user_id.into(),
            ],
        )
        .await?;
        Ok(())
    }

    /// Deletes jobs older than `max_age_days` (0 means "all"). Scoped by user
    /// when given. Returns the number of rows deleted.
    pub async fn cleanup_old_jobs(&self, max_age_days: i64, user_id: Option<&str>) -> Result<i64> {
        let cutoff = if max_age_days <= 0 {
            i64::MAX
        } else {
            chrono::Utc::now().timestamp_millis() - max_age_days * 86_400_000
        };
        let (sql, params): (&str, Vec<Param>) = match user_id {
            Some(uid) => (
                "DELETE FROM job_statuses WHERE created_at <= ? AND user_id = ?",
                vec![cutoff.into(), uid.into()],
            ),
            None => (
                "DELETE FROM job_statuses WHERE created_at <= ?",
                vec![cutoff.into()],
            ),
        };
        let changes = self.execute(sql, &params).await?;
        Ok(changes.changes)
    }

    pub async fn insert_cleanup_job_extra(&self, extra: &CleanupJobExtra) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO cleanup_jobs (job_id, policy_id, triggered_by, priority, batch_size, target_emails, emails_analyzed, emails_cleaned, storage_freed, errors_encountered, current_batch, total_batches) VALUES (?,?,?,?,?,?,?,?,?,?,?,?)",
            &[
                extra.job_id.clone().into(),
                extra.policy_id.clone().into(),
                extra.triggered_by.clone().into(),
                extra.priority.clone().into(),
                extra.batch_size.into(),
                extra.target_emails.into(),
                extra.emails_analyzed.into(),
                extra.emails_cleaned.into(),
                extra.storage_freed.into(),
                extra.errors_encountered.into(),
                extra.current_batch.into(),
                extra.total_batches.into(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn update_cleanup_job_progress(&self, extra: &CleanupJobExtra) -> Result<()> {
        self.execute(
            "UPDATE cleanup_jobs SET emails_analyzed = ?, emails_cleaned = ?, storage_freed = ?, errors_encountered = ?, current_batch = ?, total_batches = ? WHERE job_id = ?",
            &[
                extra.emails_analyzed.into(),
                extra.emails_cleaned.into(),
                extra.storage_freed.into(),
                extra.errors_encountered.into(),
                extra.current_batch.into(),
                extra.total_batches.into(),
                extra.job_id.clone().into(),
            ],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let store = Store::open_in_memory().await.unwrap();
        let job = Job::new("j1", "categorization", "u1", serde_json::json!({"year": 2024}));
        store.insert_job(&job).await.unwrap();

        let fetched = store.get_job("j1", "u1").await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Pending);
        assert_eq!(fetched.job_type, "categorization");
    }

    #[tokio::test]
    async fn get_job_is_scoped_by_user() {
        let store = Store::open_in_memory().await.unwrap();
        let job = Job::new("j1", "categorization", "u1", serde_json::json!({}));
        store.insert_job(&job).await.unwrap();

        assert!(store.get_job("j1", "u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_transitions_are_monotonic() {
        let store = Store::open_in_memory().await.unwrap();
        let job = Job::new("j1", "categorization", "u1", serde_json::json!({}));
        store.insert_job(&job).await.unwrap();

        assert!(store.transition_job("j1", "u1", JobStatus::InProgress, None, None).await.unwrap());
        assert!(store.transition_job("j1", "u1", JobStatus::Completed, Some(serde_json::json!({"processed": 1})), None).await.unwrap());

        // Terminal: further transitions are refused.
        assert!(!store.transition_job("j1", "u1", JobStatus::InProgress, None, None).await.unwrap());

        let fetched = store.get_job("j1", "u1").await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
        assert!(fetched.completed_at.is_some());
    }

    #[tokio::test]
    async fn cleanup_old_jobs_respects_age_and_user_scope() {
        let store = Store::open_in_memory().await.unwrap();
        let mut old_job = Job::new("old", "categorization", "u1", serde_json::json!({}));
        old_job.created_at = 0;
        store.insert_job(&old_job).await.unwrap();
        let recent_job = Job::new("new", "categorization", "u1", serde_json::json!({}));
        store.insert_job(&recent_job).await.unwrap();

        let deleted = store.cleanup_old_jobs(1, Some("u1")).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_job("old", "u1").await.unwrap().is_none());
        assert!(store.get_job("new", "u1").await.unwrap().is_some());
    }
}
