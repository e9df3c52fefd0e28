//! `AccessPattern` tables (spec §3): raw access events, per-search activity,
//! and the denormalized `email_access_summary` read by cleanup's
//! `no_access_days` / `access_score_max` predicates.

use super::{Row, Store};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct EmailAccessSummary {
    pub user_id: String,
    pub email_id: String,
    pub access_count: i64,
    pub last_accessed_at: Option<i64>,
    pub access_score: f64,
}

impl Store {
    pub async fn record_email_access(&self, user_id: &str, email_id: &str, at: i64) -> Result<()> {
        self.execute(
            "INSERT INTO email_access_log (id, user_id, email_id, accessed_at) VALUES (?,?,?,?)",
            &[uuid::Uuid::new_v4().to_string().into(), user_id.into(), email_id.into(), at.into()],
        )
        .await?;
        self.upsert_access_summary(user_id, email_id, at).await
    }

    /// Recency-weighted: halves the contribution of prior accesses in favor of
    /// the new one, so repeated recent access stays close to 1.0.
    async fn upsert_access_summary(&self, user_id: &str, email_id: &str, at: i64) -> Result<()> {
        let existing = self.get_access_summary(user_id, email_id).await?;
        let (count, score) = match existing {
            Some(s) => (s.access_count + 1, (s.access_score * 0.5 + 0.5).min(1.0)),
            None => (1, 1.0),
        };
        self.execute(
            "INSERT OR REPLACE INTO email_access_summary (user_id, email_id, access_count, last_accessed_at, access_score) VALUES (?,?,?,?,?)",
            &[user_id.into(), email_id.into(), count.into(), at.into(), score.into()],
        )
        .await?;
        Ok(())
    }

    pub async fn get_access_summary(&self, user_id: &str, email_id: &str) -> Result<Option<EmailAccessSummary>> {
        let row = self
            .query_optional(
                "SELECT * FROM email_access_summary WHERE user_id = ? AND email_id = ?",
                &[user_id.into(), email_id.into()],
            )
            .await?;
        Ok(row.map(row_to_summary))
    }

    pub async fn record_search_activity(
        &self,
        user_id: &str,
        query: &str,
        email_ids: &[String],
        interacted_ids: &[String],
        at: i64,
    ) -> Result<()> {
        self.execute(
            "INSERT INTO search_activity (id, user_id, query, email_ids, interacted_ids, created_at) VALUES (?,?,?,?,?,?)",
            &[
                uuid::Uuid::new_v4().to_string().into(),
                user_id.into(),
                query.into(),
                serde_json::to_string(email_ids).unwrap_or_default().into(),
                serde_json::to_string(interacted_ids).unwrap_or_default().into(),
                at.into(),
            ],
        )
        .await?;
        Ok(())
    }
}

fn row_to_summary(row: Row) -> EmailAccessSummary {
    use sqlx::Row as _;
    let r = &row.0;
    EmailAccessSummary {
        user_id: r.try_get("user_id").unwrap_or_default(),
        email_id: r.try_get("email_id").unwrap_or_default(),
        access_count: r.try_get("access_count").unwrap_or_default(),
        last_accessed_at: r.try_get("last_accessed_at").unwrap_or(None),
        access_score: r.try_get("access_score").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_access_builds_a_summary() {
        let store = Store::open_in_memory().await.unwrap();
        store.record_email_access("u1", "e1", 1000).await.unwrap();
        store.record_email_access("u1", "e1", 2000).await.unwrap();

        let summary = store.get_access_summary("u1", "e1").await.unwrap().unwrap();
        assert_eq!(summary.access_count, 2);
        assert_eq!(summary.last_accessed_at, Some(2000));
    }

    #[tokio::test]
    async fn unaccessed_email_has_no_summary_row() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.get_access_summary("u1", "never").await.unwrap().is_none());
    }
}
