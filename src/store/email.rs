//! `EmailIndex` rows and the `searchEmails`/`getEmailsForCleanup`/upsert/delete
//! surface of the Store (spec §3, §4.A).

use super::{Param, Row, Store};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailIndex {
    pub id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    /// Epoch milliseconds.
    pub date: i64,
    pub year: i32,
    pub size: i64,
    pub has_attachments: bool,
    pub labels: Vec<String>,
    pub snippet: String,
    pub archived: bool,
    pub archive_date: Option<i64>,
    pub archive_location: Option<String>,
    pub category: Option<String>,
    pub user_id: Option<String>,

    pub importance_score: Option<i64>,
    pub importance_level: Option<String>,
    pub importance_matched_rules: Option<Vec<String>>,
    pub importance_confidence: Option<f64>,

    pub age_category: Option<String>,
    pub size_category: Option<String>,
    pub recency_score: Option<f64>,
    pub size_penalty: Option<f64>,

    pub gmail_category: Option<String>,
    pub spam_score: Option<f64>,
    pub promotional_score: Option<f64>,
    pub social_score: Option<f64>,
    pub spam_indicators: Option<Vec<String>>,
    pub promotional_indicators: Option<Vec<String>>,
    pub social_indicators: Option<Vec<String>>,

    pub analysis_timestamp: Option<i64>,
    pub analysis_version: Option<String>,
}

impl EmailIndex {
    pub fn new_minimal(id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
            subject: String::new(),
            sender: String::new(),
            recipients: Vec::new(),
            date: 0,
            year: 0,
            size: 0,
            has_attachments: false,
            labels: Vec::new(),
            snippet: String::new(),
            archived: false,
            archive_date: None,
            archive_location: None,
            category: None,
            user_id,
            importance_score: None,
            importance_level: None,
            importance_matched_rules: None,
            importance_confidence: None,
            age_category: None,
            size_category: None,
            recency_score: None,
            size_penalty: None,
            gmail_category: None,
            spam_score: None,
            promotional_score: None,
            social_score: None,
            spam_indicators: None,
            promotional_indicators: None,
            social_indicators: None,
            analysis_timestamp: None,
            analysis_version: None,
        }
    }
}

fn get_str(row: &sqlx::sqlite::SqliteRow, col: &str) -> String {
    use sqlx::Row as _;
    row.try_get::<String, _>(col).unwrap_or_default()
}
fn get_opt_str(row: &sqlx::sqlite::SqliteRow, col: &str) -> Option<String> {
    use sqlx::Row as _;
    row.try_get::<Option<String>, _>(col).ok().flatten()
}
fn get_i64(row: &sqlx::sqlite::SqliteRow, col: &str) -> i64 {
    use sqlx::Row as _;
    row.try_get::<i64, _>(col).unwrap_or_default()
}
fn get_opt_i64(row: &sqlx::sqlite::SqliteRow, col: &str) -> Option<i64> {
    use sqlx::Row as _;
    row.try_get::<Option<i64>, _>(col).ok().flatten()
}
fn get_opt_f64(row: &sqlx::sqlite::SqliteRow, col: &str) -> Option<f64> {
    use sqlx::Row as _;
    row.try_get::<Option<f64>, _>(col).ok().flatten()
}
fn get_bool(row: &sqlx::sqlite::SqliteRow, col: &str) -> bool {
    use sqlx::Row as _;
    row.try_get::<i64, _>(col).unwrap_or(0) != 0
}
fn get_json_list(row: &sqlx::sqlite::SqliteRow, col: &str) -> Vec<String> {
    serde_json::from_str(&get_str(row, col)).unwrap_or_default()
}
fn get_opt_json_list(row: &sqlx::sqlite::SqliteRow, col: &str) -> Option<Vec<String>> {
    get_opt_str(row, col).and_then(|s| serde_json::from_str(&s).ok())
}

impl From<Row> for EmailIndex {
    fn from(row: Row) -> Self {
        let r = &row.0;
        EmailIndex {
            id: get_str(r, "id"),
            thread_id: get_opt_str(r, "thread_id"),
            subject: get_str(r, "subject"),
            sender: get_str(r, "sender"),
            recipients: get_json_list(r, "recipients"),
            date: get_i64(r, "date"),
            year: get_i64(r, "year") as i32,
            size: get_i64(r, "size"),
            has_attachments: get_bool(r, "has_attachments"),
            labels: get_json_list(r, "labels"),
            snippet: get_str(r, "snippet"),
            archived: get_bool(r, "archived"),
            archive_date: get_opt_i64(r, "archive_date"),
            archive_location: get_opt_str(r, "archive_location"),
            category: get_opt_str(r, "category"),
            user_id: get_opt_str(r, "user_id"),
            importance_score: get_opt_i64(r, "importance_score"),
            importance_level: get_opt_str(r, "importance_level"),
            importance_matched_rules: get_opt_json_list(r, "importance_matched_rules"),
            importance_confidence: get_opt_f64(r, "importance_confidence"),
            age_category: get_opt_str(r, "age_category"),
            size_category: get_opt_str(r, "size_category"),
            recency_score: get_opt_f64(r, "recency_score"),
            size_penalty: get_opt_f64(r, "size_penalty"),
            gmail_category: get_opt_str(r, "gmail_category"),
            spam_score: get_opt_f64(r, "spam_score"),
            promotional_score: get_opt_f64(r, "promotional_score"),
            social_score: get_opt_f64(r, "social_score"),
            spam_indicators: get_opt_json_list(r, "spam_indicators"),
            promotional_indicators: get_opt_json_list(r, "promotional_indicators"),
            social_indicators: get_opt_json_list(r, "social_indicators"),
            analysis_timestamp: get_opt_i64(r, "analysis_timestamp"),
            analysis_version: get_opt_str(r, "analysis_version"),
        }
    }
}

/// Criteria for `searchEmails`. `None` fields are omitted from the predicate.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub category: Option<String>,
    pub category_in: Option<Vec<String>>,
    pub ids: Option<Vec<String>>,
    pub year: Option<i32>,
    /// Inclusive start, exclusive end (`2023..=2023` means just 2023).
    pub year_range: Option<(i32, i32)>,
    pub size_min: Option<i64>,
    pub size_max: Option<i64>,
    pub archived: Option<bool>,
    pub sender_like: Option<String>,
    pub labels: Option<Vec<String>>,
    pub has_attachments: Option<bool>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Extra predicates used only by `getEmailsForCleanup`.
#[derive(Debug, Clone, Default)]
pub struct CleanupCriteria {
    pub base: SearchCriteria,
    pub age_days_min: Option<i64>,
    /// Expands to the prefix set `{low,medium,high}` up to and including this level.
    pub importance_level_max: Option<String>,
    pub spam_score_min: Option<f64>,
    pub promotional_score_min: Option<f64>,
    pub access_score_max: Option<f64>,
    pub no_access_days: Option<i64>,
}

pub struct SearchResult {
    pub emails: Vec<EmailIndex>,
    pub total: i64,
}

fn escape_label_for_like(label: &str) -> String {
    label.replace('"', "\\\"")
}

fn importance_level_prefix_set(max: &str) -> &'static [&'static str] {
    match max {
        "low" => &["low"],
        "medium" => &["low", "medium"],
        "high" => &["low", "medium", "high"],
        _ => &["low", "medium", "high"],
    }
}

fn build_search_predicates(criteria: &SearchCriteria) -> (Vec<String>, Vec<Param>) {
    let mut predicates = vec!["1=1".to_string()];
    let mut params: Vec<Param> = Vec::new();

    if let Some(category) = &criteria.category {
        predicates.push("category = ?".to_string());
        params.push(category.clone().into());
    }
    if let Some(cats) = &criteria.category_in {
        if !cats.is_empty() {
            let placeholders = vec!["?"; cats.len()].join(",");
            predicates.push(format!("category IN ({placeholders})"));
            for c in cats {
                params.push(c.clone().into());
            }
        }
    }
    if let Some(ids) = &criteria.ids {
        if !ids.is_empty() {
            let placeholders = vec!["?"; ids.len()].join(",");
            predicates.push(format!("id IN ({placeholders})"));
            for id in ids {
                params.push(id.clone().into());
            }
        }
    }
    if let Some(year) = criteria.year {
        predicates.push("year = ?".to_string());
        params.push((year as i64).into());
    }
    if let Some((start, end)) = criteria.year_range {
        predicates.push("year >= ? AND year < ?".to_string());
        params.push((start as i64).into());
        params.push((end as i64).into());
    }
    if let Some(min) = criteria.size_min {
        predicates.push("size >= ?".to_string());
        params.push(min.into());
    }
    if let Some(max) = criteria.size_max {
        predicates.push("size <= ?".to_string());
        params.push(max.into());
    }
    if let Some(archived) = criteria.archived {
        predicates.push("archived = ?".to_string());
        params.push((archived as i64).into());
    }
    if let Some(sender) = &criteria.sender_like {
        predicates.push("sender LIKE ?".to_string());
        params.push(format!("%{sender}%").into());
    }
    if let Some(labels) = &criteria.labels {
        for label in labels {
            predicates.push("JSON_EXTRACT(labels, '$') LIKE ?".to_string());
            params.push(format!("%\"{}\"%", escape_label_for_like(label)).into());
        }
    }
    if let Some(has_attachments) = criteria.has_attachments {
        predicates.push("has_attachments = ?".to_string());
        params.push((has_attachments as i64).into());
    }
    if let Some(user_id) = &criteria.user_id {
        predicates.push("user_id = ?".to_string());
        params.push(user_id.clone().into());
    }

    (predicates, params)
}

impl Store {
    /// `INSERT OR REPLACE` of all 33 columns. `user_id` resolution order:
    /// caller-supplied value, then the row's own `user_id`, then the Store's owner.
    pub async fn upsert_email_index(
        &self,
        email: &EmailIndex,
        caller_user_id: Option<&str>,
    ) -> Result<()> {
        let resolved_user_id = caller_user_id
            .map(|s| s.to_string())
            .or_else(|| email.user_id.clone())
            .or_else(|| self.owner_user_id.clone());

        let params = email_upsert_params(email, resolved_user_id);
        self.execute(UPSERT_EMAIL_SQL, &params).await?;
        Ok(())
    }

    pub async fn bulk_upsert_email_index(
        &self,
        emails: &[EmailIndex],
        caller_user_id: Option<&str>,
    ) -> Result<()> {
        let batches: Vec<Vec<Param>> = emails
            .iter()
            .map(|email| {
                let resolved_user_id = caller_user_id
                    .map(|s| s.to_string())
                    .or_else(|| email.user_id.clone())
                    .or_else(|| self.owner_user_id.clone());
                email_upsert_params(email, resolved_user_id)
            })
            .collect();
        if batches.is_empty() {
            return Ok(());
        }
        self.execute_batch(UPSERT_EMAIL_SQL, &batches).await?;
        Ok(())
    }

    pub async fn search_emails(&self, criteria: &SearchCriteria) -> Result<SearchResult> {
        let (predicates, mut params) = build_search_predicates(criteria);
        let mut sql = format!(
            "SELECT *, COUNT(*) OVER() AS total FROM email_index WHERE {}",
            predicates.join(" AND ")
        );
        sql.push_str(" ORDER BY date DESC");
        if let Some(limit) = criteria.limit {
            sql.push_str(" LIMIT ?");
            params.push(limit.into());
            if let Some(offset) = criteria.offset {
                sql.push_str(" OFFSET ?");
                params.push(offset.into());
            }
        }

        let rows = self.query_all(&sql, &params).await?;
        let total = rows
            .first()
            .map(|r| {
                use sqlx::Row as _;
                r.0.try_get::<i64, _>("total").unwrap_or(0)
            })
            .unwrap_or(0);
        let emails = rows.into_iter().map(EmailIndex::from).collect();
        Ok(SearchResult { emails, total })
    }

    /// Same query surface as `search_emails` plus cleanup-specific predicates.
    /// Always forces `archived = 0`. Ordered least-important / oldest first.
    pub async fn get_emails_for_cleanup(
        &self,
        criteria: &CleanupCriteria,
        limit: Option<i64>,
        user_id: Option<&str>,
    ) -> Result<Vec<EmailIndex>> {
        let mut base = criteria.base.clone();
        base.archived = Some(false);
        if let Some(uid) = user_id {
            base.user_id = Some(uid.to_string());
        }
        let (mut predicates, mut params) = build_search_predicates(&base);

        if let Some(age_days_min) = criteria.age_days_min {
            predicates.push("date <= ?".to_string());
            let now_ms = chrono::Utc::now().timestamp_millis();
            params.push((now_ms - age_days_min * 86_400_000).into());
        }
        if let Some(max_level) = &criteria.importance_level_max {
            let levels = importance_level_prefix_set(max_level);
            let placeholders = vec!["?"; levels.len()].join(",");
            predicates.push(format!(
                "(importance_level IN ({placeholders}) OR importance_level IS NULL)"
            ));
            for l in levels {
                params.push((*l).into());
            }
        }
        if let Some(min) = criteria.spam_score_min {
            predicates.push("COALESCE(spam_score, 0) >= ?".to_string());
            params.push(min.into());
        }
        if let Some(min) = criteria.promotional_score_min {
            predicates.push("COALESCE(promotional_score, 0) >= ?".to_string());
            params.push(min.into());
        }
        if let Some(max) = criteria.access_score_max {
            predicates.push(
                "(NOT EXISTS (SELECT 1 FROM email_access_summary s WHERE s.email_id = email_index.id AND s.user_id = email_index.user_id) OR (SELECT s.access_score FROM email_access_summary s WHERE s.email_id = email_index.id AND s.user_id = email_index.user_id) <= ?)"
                    .to_string(),
            );
            params.push(max.into());
        }
        if let Some(no_access_days) = criteria.no_access_days {
            let now_ms = chrono::Utc::now().timestamp_millis();
            let cutoff = now_ms - no_access_days * 86_400_000;
            predicates.push(
                "(NOT EXISTS (SELECT 1 FROM email_access_summary s WHERE s.email_id = email_index.id AND s.user_id = email_index.user_id) OR (SELECT s.last_accessed_at FROM email_access_summary s WHERE s.email_id = email_index.id AND s.user_id = email_index.user_id) <= ? OR (SELECT s.last_accessed_at FROM email_access_summary s WHERE s.email_id = email_index.id AND s.user_id = email_index.user_id) IS NULL)"
                    .to_string(),
            );
            params.push(cutoff.into());
        }

        let mut sql = format!(
            "SELECT * FROM email_index WHERE {}",
            predicates.join(" AND ")
        );
        sql.push_str(" ORDER BY COALESCE(importance_score, 0) ASC, date ASC");
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(limit.into());
        }

        let rows = self.query_all(&sql, &params).await?;
        Ok(rows.into_iter().map(EmailIndex::from).collect())
    }

    /// Sets `archived=1, archive_location='trash', archive_date=now`. Returns the
    /// actual number of rows changed, not the request length.
    pub async fn mark_emails_as_deleted(
        &self,
        ids: &[String],
        user_id: Option<&str>,
    ) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut sql = format!(
            "UPDATE email_index SET archived = 1, archive_location = 'trash', archive_date = ? WHERE id IN ({placeholders})"
        );
        let mut params: Vec<Param> = vec![chrono::Utc::now().timestamp_millis().into()];
        for id in ids {
            params.push(id.clone().into());
        }
        if let Some(uid) = user_id {
            sql.push_str(" AND user_id = ?");
            params.push(uid.into());
        }
        let changes = self.execute(&sql, &params).await?;
        Ok(changes.changes)
    }

    /// Physically removes rows. Returns the actual number of rows changed —
    /// callers that need the request length must compute it themselves.
    pub async fn delete_email_ids(&self, ids: &[String], user_id: Option<&str>) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut sql = format!("DELETE FROM email_index WHERE id IN ({placeholders})");
        let mut params: Vec<Param> = ids.iter().map(|i| i.clone().into()).collect();
        if let Some(uid) = user_id {
            sql.push_str(" AND user_id = ?");
            params.push(uid.into());
        }
        let changes = self.execute(&sql, &params).await?;
        Ok(changes.changes)
    }

    /// Clears archive state after a successful restore.
    pub async fn restore_emails_archive_state(
        &self,
        ids: &[String],
        user_id: Option<&str>,
    ) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut sql = format!(
            "UPDATE email_index SET archived = 0, archive_date = NULL, archive_location = NULL WHERE id IN ({placeholders})"
        );
        let mut params: Vec<Param> = ids.iter().map(|i| i.clone().into()).collect();
        if let Some(uid) = user_id {
            sql.push_str(" AND user_id = ?");
            params.push(uid.into());
        }
        let changes = self.execute(&sql, &params).await?;
        Ok(changes.changes)
    }

    /// Gmail-method archive: `archived=1, archive_location='ARCHIVED'`.
    pub async fn archive_emails_gmail(
        &self,
        ids: &[String],
        user_id: Option<&str>,
    ) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut sql = format!(
            "UPDATE email_index SET archived = 1, archive_location = 'ARCHIVED', archive_date = ? WHERE id IN ({placeholders})"
        );
        let mut params: Vec<Param> = vec![chrono::Utc::now().timestamp_millis().into()];
        for id in ids {
            params.push(id.clone().into());
        }
        if let Some(uid) = user_id {
            sql.push_str(" AND user_id = ?");
            params.push(uid.into());
        }
        let changes = self.execute(&sql, &params).await?;
        Ok(changes.changes)
    }

    /// Export-method archive: `archived=1, archive_location=<path>`.
    pub async fn archive_emails_export(
        &self,
        ids: &[String],
        location: &str,
        user_id: Option<&str>,
    ) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut sql = format!(
            "UPDATE email_index SET archived = 1, archive_location = ?, archive_date = ? WHERE id IN ({placeholders})"
        );
        let mut params: Vec<Param> = vec![
            location.to_string().into(),
            chrono::Utc::now().timestamp_millis().into(),
        ];
        for id in ids {
            params.push(id.clone().into());
        }
        if let Some(uid) = user_id {
            sql.push_str(" AND user_id = ?");
            params.push(uid.into());
        }
        let changes = self.execute(&sql, &params).await?;
        Ok(changes.changes)
    }

    /// Persists the analysis fields the categorization engine computed. Folds
    /// `gmail_category == "other"` to `"primary"` (the column constraint does not
    /// accept `other`).
    pub async fn persist_analysis(&self, email: &EmailIndex, user_id: Option<&str>) -> Result<()> {
        let mut patched = email.clone();
        if patched.gmail_category.as_deref() == Some("other") {
            patched.gmail_category = Some("primary".to_string());
        }
        self.upsert_email_index(&patched, user_id).await
    }
}

const UPSERT_EMAIL_SQL: &str = r#"
INSERT OR REPLACE INTO email_index (
    id, thread_id, subject, sender, recipients, date, year, size, has_attachments,
    labels, snippet, archived, archive_date, archive_location, category, user_id,
    importance_score, importance_level, importance_matched_rules, importance_confidence,
    age_category, size_category, recency_score, size_penalty,
    gmail_category, spam_score, promotional_score, social_score,
    spam_indicators, promotional_indicators, social_indicators,
    analysis_timestamp, analysis_version
) VALUES (
    ?, ?, ?, ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?,
    ?, ?, ?, ?,
    ?, ?, ?, ?,
    ?, ?, ?,
    ?, ?
)
"#;

fn email_upsert_params(email: &EmailIndex, resolved_user_id: Option<String>) -> Vec<Param> {
    vec![
        email.id.clone().into(),
        email.thread_id.clone().into(),
        email.subject.clone().into(),
        email.sender.clone().into(),
        serde_json::to_string(&email.recipients).unwrap_or_default().into(),
        email.date.into(),
        (email.year as i64).into(),
        email.size.into(),
        email.has_attachments.into(),
        serde_json::to_string(&email.labels).unwrap_or_default().into(),
        email.snippet.clone().into(),
        email.archived.into(),
        email.archive_date.into(),
        email.archive_location.clone().into(),
        email.category.clone().into(),
        resolved_user_id.into(),
        email.importance_score.into(),
        email.importance_level.clone().into(),
        email
            .importance_matched_rules
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .into(),
        email.importance_confidence.into(),
        email.age_category.clone().into(),
        email.size_category.clone().into(),
        email.recency_score.into(),
        email.size_penalty.into(),
        email.gmail_category.clone().into(),
        email.spam_score.into(),
        email.promotional_score.into(),
        email.social_score.into(),
        email
            .spam_indicators
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .into(),
        email
            .promotional_indicators
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .into(),
        email
            .social_indicators
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .into(),
        email.analysis_timestamp.into(),
        email.analysis_version.clone().into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, user_id: &str) -> EmailIndex {
        let mut e = EmailIndex::new_minimal(id, Some(user_id.to_string()));
        e.subject = "hello".to_string();
        e.sender = "a@b.com".to_string();
        e.date = 1_700_000_000_000;
        e.year = 2023;
        e
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let email = sample("e1", "u1");
        store.upsert_email_index(&email, None).await.unwrap();
        store.upsert_email_index(&email, None).await.unwrap();
        let result = store
            .search_emails(&SearchCriteria {
                user_id: Some("u1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.emails.len(), 1);
    }

    #[tokio::test]
    async fn search_is_scoped_by_user() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_email_index(&sample("e-u1", "u1"), None).await.unwrap();
        store.upsert_email_index(&sample("e-u2", "u2"), None).await.unwrap();

        let u1 = store
            .search_emails(&SearchCriteria {
                user_id: Some("u1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(u1.emails.len(), 1);
        assert_eq!(u1.emails[0].id, "e-u1");
    }

    #[tokio::test]
    async fn label_filter_matches_json_array_membership() {
        let store = Store::open_in_memory().await.unwrap();
        let mut e = sample("e1", "u1");
        e.labels = vec!["INBOX".to_string(), "IMPORTANT".to_string()];
        store.upsert_email_index(&e, None).await.unwrap();

        let result = store
            .search_emails(&SearchCriteria {
                labels: Some(vec!["IMPORTANT".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.emails.len(), 1);

        let none = store
            .search_emails(&SearchCriteria {
                labels: Some(vec!["SPAM".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(none.emails.len(), 0);
    }

    #[tokio::test]
    async fn mark_as_deleted_then_delete_returns_actual_changes() {
        let store = Store::open_in_memory().await.unwrap();
        store.upsert_email_index(&sample("e1", "u1"), None).await.unwrap();
        store.upsert_email_index(&sample("e2", "u1"), None).await.unwrap();

        let changed = store
            .mark_emails_as_deleted(&["e1".to_string(), "missing".to_string()], Some("u1"))
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let deleted = store
            .delete_email_ids(&["e1".to_string(), "e2".to_string()], Some("u1"))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
    }

    #[tokio::test]
    async fn cleanup_excludes_archived_and_orders_by_importance_then_date() {
        let store = Store::open_in_memory().await.unwrap();
        let mut important = sample("high", "u1");
        important.importance_score = Some(90);
        let mut unimportant = sample("low", "u1");
        unimportant.importance_score = Some(1);
        unimportant.date = 1_600_000_000_000;
        store.upsert_email_index(&important, None).await.unwrap();
        store.upsert_email_index(&unimportant, None).await.unwrap();

        let results = store
            .get_emails_for_cleanup(&CleanupCriteria::default(), None, Some("u1"))
            .await
            .unwrap();
        assert_eq!(results[0].id, "low");
        assert_eq!(results[1].id, "high");
    }
}
