//! `FileAccessControl` (spec §4.L): file metadata, per-user permissions, an
//! expiration sweep, and the append-only audit log every mutating path feeds.

use crate::error::{MailIndexError, Result};
use crate::store::files::{AuditLogEntry, FileAccessPermission, FileMetadata, PermissionType};
use crate::store::Store;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FileAclConfig {
    pub max_file_size_bytes: i64,
    pub allowed_file_types: Vec<String>,
    pub require_encryption: bool,
    pub default_file_expiration_days: i64,
    pub audit_enabled: bool,
}

impl Default for FileAclConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 100 * 1024 * 1024,
            allowed_file_types: vec![
                "email_export".to_string(),
                "archive_backup".to_string(),
                "search_result".to_string(),
                "attachment".to_string(),
                "log_file".to_string(),
            ],
            require_encryption: false,
            default_file_expiration_days: 30,
            audit_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateFileRequest {
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
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct FileAccessCheck {
    pub allowed: bool,
    pub reason: Option<String>,
    pub file_metadata: Option<FileMetadata>,
    pub effective_permissions: Vec<String>,
}

pub struct FileAccessControl {
    store: Arc<Store>,
    config: FileAclConfig,
}

impl FileAccessControl {
    pub fn new(store: Arc<Store>, config: FileAclConfig) -> Self {
        Self { store, config }
    }

    pub async fn create_file_metadata(&self, request: CreateFileRequest) -> Result<FileMetadata> {
        if request.size_bytes > self.config.max_file_size_bytes {
            return Err(MailIndexError::ValidationFailed(format!(
                "file size {} exceeds max {}",
                request.size_bytes, self.config.max_file_size_bytes
            )));
        }
        if !self.config.allowed_file_types.contains(&request.file_type) {
            return Err(MailIndexError::ValidationFailed(format!(
                "file type {} is not allowed",
                request.file_type
            )));
        }
        if self.config.require_encryption && request.encryption_status == "none" {
            return Err(MailIndexError::ValidationFailed("encryption is required".to_string()));
        }

        let now = chrono::Utc::now().timestamp_millis();
        let expires_at = request
            .expires_at
            .or(Some(now + self.config.default_file_expiration_days * 86_400_000));

        let meta = FileMetadata {
            id: request.id.clone(),
            file_path: request.file_path,
            original_filename: request.original_filename,
            file_type: request.file_type,
            size_bytes: request.size_bytes,
            mime_type: request.mime_type,
            checksum_sha256: request.checksum_sha256,
            encryption_status: request.encryption_status,
            compression_status: request.compression_status,
            user_id: request.user_id.clone(),
            created_at: now,
            updated_at: now,
            accessed_at: None,
            expires_at,
        };
        self.store.insert_file_metadata(&meta).await?;

        for permission_type in PermissionType::ALL {
            self.store
                .grant_file_permission(&FileAccessPermission {
                    file_id: meta.id.clone(),
                    user_id: request.user_id.clone(),
                    permission_type,
                    granted_by: request.user_id.clone(),
                    granted_at: now,
                    expires_at: None,
                    is_active: true,
                })
                .await?;
        }

        self.audit(
            Some(&request.user_id),
            "file_create",
            "file",
            Some(&meta.id),
            None,
            true,
            None,
        )
        .await;

        Ok(meta)
    }

    pub async fn check_file_access(
        &self,
        file_id: &str,
        user_id: &str,
        permission_type: PermissionType,
    ) -> Result<FileAccessCheck> {
        let now = chrono::Utc::now().timestamp_millis();

        let Some(meta) = self.store.get_file_metadata(file_id).await? else {
            return Ok(FileAccessCheck { allowed: false, reason: Some("file not found".to_string()), ..Default::default() });
        };

        if let Some(expires_at) = meta.expires_at {
            if expires_at <= now {
                return Ok(FileAccessCheck {
                    allowed: false,
                    reason: Some("File has expired".to_string()),
                    file_metadata: Some(meta),
                    ..Default::default()
                });
            }
        }

        if meta.user_id == user_id {
            self.store.touch_file_accessed(file_id, now).await?;
            return Ok(FileAccessCheck {
                allowed: true,
                reason: None,
                file_metadata: Some(meta),
                effective_permissions: vec!["read".to_string(), "write".to_string(), "delete".to_string(), "share".to_string()],
            });
        }

        let permission = self.store.get_active_permission(file_id, user_id, permission_type, now).await?;
        match permission {
            Some(_) => {
                if permission_type == PermissionType::Read {
                    self.store.touch_file_accessed(file_id, now).await?;
                }
                Ok(FileAccessCheck {
                    allowed: true,
                    reason: None,
                    file_metadata: Some(meta),
                    effective_permissions: vec![permission_type.as_str().to_string()],
                })
            }
            None => Ok(FileAccessCheck {
                allowed: false,
                reason: Some("no active permission".to_string()),
                file_metadata: Some(meta),
                effective_permissions: vec![],
            }),
        }
    }

    /// Deletes every file whose `expires_at` has passed. Missing physical
    /// files are tolerated; metadata deletion cascades to permissions.
    pub async fn cleanup_expired_files(&self) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        let expired = self.store.list_expired_files(now).await?;

        let mut count = 0;
        for file in &expired {
            if Path::new(&file.file_path).exists() {
                let _ = tokio::fs::remove_file(&file.file_path).await;
            }
            self.store.delete_file_metadata(&file.id).await?;
            count += 1;
        }

        if count > 0 {
            self.audit(None, "file_delete", "file", None, Some(serde_json::json!({"expired_count": count})), true, None)
                .await;
        }
        Ok(count)
    }

    /// Fire-and-forget from callers' perspective; a no-op when disabled.
    pub async fn audit(
        &self,
        user_id: Option<&str>,
        action: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        details: Option<serde_json::Value>,
        success: bool,
        error_message: Option<&str>,
    ) {
        if !self.config.audit_enabled {
            return;
        }
        let entry = AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.map(String::from),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.map(String::from),
            details,
            success,
            error_message: error_message.map(String::from),
            ip_address: None,
            user_agent: None,
            session_id: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.store.insert_audit_log(&entry).await {
            tracing::warn!(error = %e, "failed to write audit log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, user_id: &str, size: i64) -> CreateFileRequest {
        CreateFileRequest {
            id: id.to_string(),
            file_path: format!("/tmp/{id}.json"),
            original_filename: format!("{id}.json"),
            file_type: "email_export".to_string(),
            size_bytes: size,
            mime_type: Some("application/json".to_string()),
            checksum_sha256: None,
            encryption_status: "none".to_string(),
            compression_status: "none".to_string(),
            user_id: user_id.to_string(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn owner_gets_all_four_permissions_on_create() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let acl = FileAccessControl::new(store, FileAclConfig::default());
        acl.create_file_metadata(request("f1", "u1", 1024)).await.unwrap();

        let check = acl.check_file_access("f1", "u1", PermissionType::Delete).await.unwrap();
        assert!(check.allowed);
        assert_eq!(check.effective_permissions.len(), 4);
    }

    #[tokio::test]
    async fn non_owner_without_permission_is_denied() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let acl = FileAccessControl::new(store, FileAclConfig::default());
        acl.create_file_metadata(request("f1", "u1", 1024)).await.unwrap();

        let check = acl.check_file_access("f1", "u2", PermissionType::Read).await.unwrap();
        assert!(!check.allowed);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let config = FileAclConfig { max_file_size_bytes: 100, ..FileAclConfig::default() };
        let acl = FileAccessControl::new(store, config);
        let result = acl.create_file_metadata(request("f1", "u1", 1000)).await;
        assert!(matches!(result, Err(MailIndexError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn cleanup_expired_files_removes_metadata() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let acl = FileAccessControl::new(store.clone(), FileAclConfig::default());
        let mut req = request("f1", "u1", 1024);
        req.expires_at = Some(1);
        acl.create_file_metadata(req).await.unwrap();

        let count = acl.cleanup_expired_files().await.unwrap();
        assert_eq!(count, 1);
        assert!(store.get_file_metadata("f1").await.unwrap().is_none());
    }
}
