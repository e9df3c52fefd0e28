//! `ArchiveRule` / `ArchiveRecord` / `SavedSearch` rows (spec §3) — owned
//! blobs with `criteria`/`action` JSON, read and written by the top-level
//! `SearchEngine` and `BulkMutator`.

use super::{Row, Store};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRule {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub criteria: serde_json::Value,
    pub action: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: String,
    pub user_id: String,
    pub email_id: String,
    pub method: String,
    pub location: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub criteria: serde_json::Value,
    pub created_at: i64,
}

fn row_to_archive_rule(row: Row) -> ArchiveRule {
    use sqlx::Row as _;
    let r = &row.0;
    let criteria_str: String = r.try_get("criteria").unwrap_or_default();
    ArchiveRule {
        id: r.try_get("id").unwrap_or_default(),
        user_id: r.try_get("user_id").unwrap_or_default(),
        name: r.try_get("name").unwrap_or_default(),
        criteria: serde_json::from_str(&criteria_str).unwrap_or(serde_json::json!({})),
        action: r.try_get("action").unwrap_or_default(),
        created_at: r.try_get("created_at").unwrap_or_default(),
    }
}

fn row_to_saved_search(row: Row) -> SavedSearch {
    use sqlx::Row as _;
    let r = &row.0;
    let criteria_str: String = r.try_get("criteria").unwrap_or_default();
    SavedSearch {
        id: r.try_get("id").unwrap_or_default(),
        user_id: r.try_get("user_id").unwrap_or_default(),
        name: r.try_get("name").unwrap_or_default(),
        criteria: serde_json::from_str(&criteria_str).unwrap_or(serde_json::json!({})),
        created_at: r.try_get("created_at").unwrap_or_default(),
    }
}

impl Store {
    pub async fn insert_archive_rule(&self, rule: &ArchiveRule) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO archive_rules (id, user_id, name, criteria, action, created_at) VALUES (?,?,?,?,?,?)",
            &[
                rule.id.clone().into(),
                rule.user_id.clone().into(),
                rule.name.clone().into(),
                serde_json::to_string(&rule.criteria).unwrap_or_default().into(),
                rule.action.clone().into(),
                rule.created_at.into(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn list_archive_rules(&self, user_id: &str) -> Result<Vec<ArchiveRule>> {
        let rows = self
            .query_all(
                "SELECT * FROM archive_rules WHERE user_id = ? ORDER BY created_at DESC",
                &[user_id.into()],
            )
            .await?;
        Ok(rows.into_iter().map(row_to_archive_rule).collect())
    }

    pub async fn insert_archive_record(&self, record: &ArchiveRecord) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO archive_records (id, user_id, email_id, method, location, created_at) VALUES (?,?,?,?,?,?)",
            &[
                record.id.clone().into(),
                record.user_id.clone().into(),
                record.email_id.clone().into(),
                record.method.clone().into(),
                record.location.clone().into(),
                record.created_at.into(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn insert_saved_search(&self, search: &SavedSearch) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO saved_searches (id, user_id, name, criteria, created_at) VALUES (?,?,?,?,?)",
            &[
                search.id.clone().into(),
                search.user_id.clone().into(),
                search.name.clone().into(),
                serde_json::to_string(&search.criteria).unwrap_or_default().into(),
                search.created_at.into(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn list_saved_searches(&self, user_id: &str) -> Result<Vec<SavedSearch>> {
        let rows = self
            .query_all(
                "SELECT * FROM saved_searches WHERE user_id = ? ORDER BY created_at DESC",
                &[user_id.into()],
            )
            .await?;
        Ok(rows.into_iter().map(row_to_saved_search).collect())
    }
}
