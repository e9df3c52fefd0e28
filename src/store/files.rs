//! File metadata, per-file ACLs, and the audit log (spec §3, backing §4.L
//! `FileAccessControl`).

use super::{Param, Row, Store};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub file_path: String,
    pub original_filename: String,
    pub file_type: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub checksum_sha256: Option<String>,
    pub encryption_status: String,
    pub compression_status: String,
    pub user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub accessed_at: Option<i64>,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionType {
    Read,
    Write,
    Delete,
    Share,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Read => "read",
            PermissionType::Write => "write",
            PermissionType::Delete => "delete",
            PermissionType::Share => "share",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(PermissionType::Read),
            "write" => Some(PermissionType::Write),
            "delete" => Some(PermissionType::Delete),
            "share" => Some(PermissionType::Share),
            _ => None,
        }
    }

    pub const ALL: [PermissionType; 4] = [
        PermissionType::Read,
        PermissionType::Write,
        PermissionType::Delete,
        PermissionType::Share,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAccessPermission {
    pub file_id: String,
    pub user_id: String,
    pub permission_type: PermissionType,
    pub granted_by: String,
    pub granted_at: i64,
    pub expires_at: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub created_at: i64,
}

fn row_to_file_metadata(row: Row) -> FileMetadata {
    use sqlx::Row as _;
    let r = &row.0;
    FileMetadata {
        id: r.try_get("id").unwrap_or_default(),
        file_path: r.try_get("file_path").unwrap_or_default(),
        original_filename: r.try_get("original_filename").unwrap_or_default(),
        file_type: r.try_get("file_type").unwrap_or_default(),
        size_bytes: r.try_get("size_bytes").unwrap_or_default(),
        mime_type: r.try_get("mime_type").unwrap_or(None),
        checksum_sha256: r.try_get("checksum_sha256").unwrap_or(None),
        encryption_status: r.try_get("encryption_status").unwrap_or_default(),
        compression_status: r.try_get("compression_status").unwrap_or_default(),
        user_id: r.try_get("user_id").unwrap_or_default(),
        created_at: r.try_get("created_at").unwrap_or_default(),
        updated_at: r.try_get("updated_at").unwrap_or_default(),
        accessed_at: r.try_get("accessed_at").unwrap_or(None),
        expires_at: r.try_get("expires_at").unwrap_or(None),
    }
}

fn row_to_permission(row: Row) -> FileAccessPermission {
    use sqlx::Row as _;
    let r = &row.0;
    let perm_str: String = r.try_get("permission_type").unwrap_or_default();
    FileAccessPermission {
        file_id: r.try_get("file_id").unwrap_or_default(),
        user_id: r.try_get("user_id").unwrap_or_default(),
        permission_type: PermissionType::parse(&perm_str).unwrap_or(PermissionType::Read),
        granted_by: r.try_get("granted_by").unwrap_or_default(),
        granted_at: r.try_get("granted_at").unwrap_or_default(),
        expires_at: r.try_get("expires_at").unwrap_or(None),
        is_active: r.try_get::<i64, _>("is_active").unwrap_or(0) != 0,
    }
}

impl Store {
    pub async fn insert_file_metadata(&self, meta: &FileMetadata) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO file_metadata (id, file_path, original_filename, file_type, size_bytes, mime_type, checksum_sha256, encryption_status, compression_status, user_id, created_at, updated_at, accessed_at, expires_at) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
            &[
                meta.id.clone().into(),
                meta.file_path.clone().into(),
                meta.original_filename.clone().into(),
                meta.file_type.clone().into(),
                meta.size_bytes.into(),
                meta.mime_type.clone().into(),
                meta.checksum_sha256.clone().into(),
                meta.encryption_status.clone().into(),
                meta.compression_status.clone().into(),
                meta.user_id.clone().into(),
                meta.created_at.into(),
                meta.updated_at.into(),
                meta.accessed_at.into(),
                meta.expires_at.into(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_file_metadata(&self, file_id: &str) -> Result<Option<FileMetadata>> {
        let row = self
            .query_optional("SELECT * FROM file_metadata WHERE id = ?", &[file_id.into()])
            .await?;
        Ok(row.map(row_to_file_metadata))
    }

    pub async fn touch_file_accessed(&self, file_id: &str, at: i64) -> Result<()> {
        self.execute(
            "UPDATE file_metadata SET accessed_at = ? WHERE id = ?",
            &[at.into(), file_id.into()],
        )
        .await?;
        Ok(())
    }

    pub async fn delete_file_metadata(&self, file_id: &str) -> Result<i64> {
        let changes = self
            .execute("DELETE FROM file_metadata WHERE id = ?", &[file_id.into()])
            .await?;
        Ok(changes.changes)
    }

    pub async fn list_expired_files(&self, now: i64) -> Result<Vec<FileMetadata>> {
        let rows = self
            .query_all(
                "SELECT * FROM file_metadata WHERE expires_at IS NOT NULL AND expires_at <= ?",
                &[now.into()],
            )
            .await?;
        Ok(rows.into_iter().map(row_to_file_metadata).collect())
    }

    pub async fn grant_file_permission(&self, perm: &FileAccessPermission) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO file_access_permissions (file_id, user_id, permission_type, granted_by, granted_at, expires_at, is_active) VALUES (?,?,?,?,?,?,?)",
            &[
                perm.file_id.clone().into(),
                perm.user_id.clone().into(),
                perm.permission_type.as_str().into(),
                perm.granted_by.clone().into(),
                perm.granted_at.into(),
                perm.expires_at.into(),
                perm.is_active.into(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_active_permission(
        &self,
        file_id: &str,
        user_id: &str,
        permission_type: PermissionType,
        now: i64,
    ) -> Result<Option<FileAccessPermission>> {
        let row = self
            .query_optional(
                "SELECT * FROM file_access_permissions WHERE file_id = ? AND user_id = ? AND permission_type = ? AND is_active = 1 AND (expires_at IS NULL OR expires_at > ?)",
                &[file_id.into(), user_id.into(), permission_type.as_str().into(), now.into()],
            )
            .await?;
        Ok(row.map(row_to_permission))
    }

    pub async fn revoke_file_permission(
        &self,
        file_id: &str,
        user_id: &str,
        permission_type: PermissionType,
    ) -> Result<()> {
        self.execute(
            "UPDATE file_access_permissions SET is_active = 0 WHERE file_id = ? AND user_id = ? AND permission_type = ?",
            &[file_id.into(), user_id.into(), permission_type.as_str().into()],
        )
        .await?;
        Ok(())
    }

    pub async fn insert_audit_log(&self, entry: &AuditLogEntry) -> Result<()> {
        self.execute(
            "INSERT INTO audit_log (id, user_id, action, resource_type, resource_id, details, success, error_message, ip_address, user_agent, session_id, created_at) VALUES (?,?,?,?,?,?,?,?,?,?,?,?)",
            &[
                entry.id.clone().into(),
                entry.user_id.clone().into(),
                entry.action.clone().into(),
                entry.resource_type.clone().into(),
                entry.resource_id.clone().into(),
                entry.details.as_ref().map(|v| serde_json::to_string(v).unwrap_or_default()).into(),
                entry.success.into(),
                entry.error_message.clone().into(),
                entry.ip_address.clone().into(),
                entry.user_agent.clone().into(),
                entry.session_id.clone().into(),
                entry.created_at.into(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn list_audit_log(&self, user_id: &str, limit: i64) -> Result<Vec<AuditLogEntry>> {
        let rows = self
            .query_all(
                "SELECT * FROM audit_log WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
                &[user_id.into(), limit.into()],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                use sqlx::Row as _;
                let r = &row.0;
                let details_str: Option<String> = r.try_get("details").unwrap_or(None);
                AuditLogEntry {
                    id: r.try_get("id").unwrap_or_default(),
                    user_id: r.try_get("user_id").unwrap_or(None),
                    action: r.try_get("action").unwrap_or_default(),
                    resource_type: r.try_get("resource_type").unwrap_or_default(),
                    resource_id: r.try_get("resource_id").unwrap_or(None),
                    details: details_str.and_then(|s| serde_json::from_str(&s).ok()),
                    success: r.try_get::<i64, _>("success").unwrap_or(0) != 0,
                    error_message: r.try_get("error_message").unwrap_or(None),
                    ip_address: r.try_get("ip_address").unwrap_or(None),
                    user_agent: r.try_get("user_agent").unwrap_or(None),
                    session_id: r.try_get("session_id").unwrap_or(None),
                    created_at: r.try_get("created_at").unwrap_or_default(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(id: &str, user_id: &str) -> FileMetadata {
        FileMetadata {
            id: id.to_string(),
            file_path: format!("/data/archive/user_{user_id}/export.json"),
            original_filename: "export.json".to_string(),
            file_type: "email_export".to_string(),
            size_bytes: 1024,
            mime_type: Some("application/json".to_string()),
            checksum_sha256: None,
            encryption_status: "none".to_string(),
            compression_status: "none".to_string(),
            user_id: user_id.to_string(),
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
            accessed_at: None,
            expires_at: Some(1_700_000_100_000),
        }
    }

    #[tokio::test]
    async fn insert_then_get_file_metadata() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_file_metadata(&sample_file("f1", "u1")).await.unwrap();
        let fetched = store.get_file_metadata("f1").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "u1");
    }

    #[tokio::test]
    async fn permission_grant_and_lookup() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_file_metadata(&sample_file("f1", "owner")).await.unwrap();
        store
            .grant_file_permission(&FileAccessPermission {
                file_id: "f1".to_string(),
                user_id: "viewer".to_string(),
                permission_type: PermissionType::Read,
                granted_by: "owner".to_string(),
                granted_at: 0,
                expires_at: None,
                is_active: true,
            })
            .await
            .unwrap();

        let found = store
            .get_active_permission("f1", "viewer", PermissionType::Read, 100)
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = store
            .get_active_permission("f1", "viewer", PermissionType::Write, 100)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn list_expired_files_filters_by_expiry() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_file_metadata(&sample_file("f1", "u1")).await.unwrap();
        let expired = store.list_expired_files(1_700_000_200_000).await.unwrap();
        assert_eq!(expired.len(), 1);
        let not_yet = store.list_expired_files(0).await.unwrap();
        assert_eq!(not_yet.len(), 0);
    }
}
