//! `BulkMutator` (spec §4.J): `deleteEmails` / `restoreEmails` / `archiveEmails`
//! plus policy-driven `batchDeleteForCleanup`. All mutation goes through the
//! remote client in batches of at most [`MAX_BATCH_SIZE`] ids with a forced
//! inter-batch delay.

use crate::error::Result;
use crate::export::ExportFormatter;
use crate::file_acl::{CreateFileRequest, FileAccessControl};
use crate::remote::RemoteMailClient;
use crate::store::email::{CleanupCriteria, SearchCriteria};
use crate::store::search::ArchiveRecord;
use crate::store::{EmailIndex, Store};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub criteria: SearchCriteria,
    /// Excludes `archived = 1` rows. Defaults to true.
    pub skip_archived: bool,
    pub dry_run: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self { criteria: SearchCriteria::default(), skip_archived: true, dry_run: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub email_ids: Vec<String>,
    pub restore_labels: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ArchiveMethod {
    Gmail,
    Export,
}

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub criteria: SearchCriteria,
    pub method: ArchiveMethod,
    pub export_base_path: String,
    pub export_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CleanupActionType {
    Delete,
    Archive,
}

#[derive(Debug, Clone)]
pub struct CleanupSafety {
    pub preserve_important: bool,
    pub max_emails_per_run: Option<usize>,
    pub max_failures: usize,
}

impl Default for CleanupSafety {
    fn default() -> Self {
        Self { preserve_important: true, max_emails_per_run: None, max_failures: 3 }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    pub action: CleanupActionType,
    pub safety: CleanupSafety,
}

#[derive(Debug, Clone, Default)]
pub struct BatchDeleteOptions {
    pub dry_run: bool,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MutationResult {
    pub deleted: usize,
    pub archived: usize,
    pub restored: usize,
    pub failed: usize,
    pub storage_freed: i64,
    pub errors: Vec<String>,
}

pub struct BulkMutator {
    store: Arc<Store>,
    remote: Arc<dyn RemoteMailClient>,
    file_acl: Arc<FileAccessControl>,
    export_formatter: Arc<dyn ExportFormatter>,
    batch_delay: Duration,
}

impl BulkMutator {
    pub fn new(
        store: Arc<Store>,
        remote: Arc<dyn RemoteMailClient>,
        file_acl: Arc<FileAccessControl>,
        export_formatter: Arc<dyn ExportFormatter>,
    ) -> Self {
        Self { store, remote, file_acl, export_formatter, batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS) }
    }

    async fn delay_between_batches(&self, force_delay: bool) {
        if force_delay && !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }
    }

    pub async fn delete_emails(
        &self,
        mut options: DeleteOptions,
        user_id: &str,
        force_delay: bool,
    ) -> Result<MutationResult> {
        options.criteria.user_id = Some(user_id.to_string());
        if options.skip_archived {
            options.criteria.archived = Some(false);
        }
        // Exclude high-priority rows unless the caller explicitly asked for them.
        let explicit_high = options.criteria.category.as_deref() == Some("high")
            || options.criteria.category_in.as_ref().is_some_and(|cats| cats.iter().any(|c| c == "high"));
        if !explicit_high {
            if let Some(existing) = options.criteria.category_in.take() {
                options.criteria.category_in = Some(existing.into_iter().filter(|c| c != "high").collect());
            } else if options.criteria.category.is_none() {
                options.criteria.category_in = Some(vec!["low".to_string(), "medium".to_string()]);
            }
        }

        let candidates = self.store.search_emails(&options.criteria).await?.emails;
        let ids: Vec<String> = candidates.iter().map(|e| e.id.clone()).collect();

        if options.dry_run {
            return Ok(MutationResult {
                deleted: ids.len(),
                errors: vec![format!("DRY RUN: would delete {} emails", ids.len())],
                ..Default::default()
            });
        }

        let mut result = MutationResult::default();
        let mut batch_count = 0usize;
        let mut failed_batches = 0usize;
        for (i, batch) in ids.chunks(MAX_BATCH_SIZE).enumerate() {
            if i > 0 {
                self.delay_between_batches(force_delay).await;
            }
            batch_count += 1;
            let batch_ids = batch.to_vec();
            match self
                .remote
                .batch_modify(&batch_ids, &["TRASH".to_string()], &["INBOX".to_string(), "UNREAD".to_string()])
                .await
            {
                Ok(_) => {
                    let changed = self.store.mark_emails_as_deleted(&batch_ids, Some(user_id)).await?;
                    result.deleted += changed as usize;
                }
                Err(e) => {
                    failed_batches += 1;
                    result.errors.push(format!("Batch {} failed: {e}", i + 1));
                }
            }
        }
        crate::metrics::track_bulk_mutation("delete", batch_count, failed_batches).await;
        Ok(result)
    }

    pub async fn restore_emails(&self, options: RestoreOptions, user_id: &str) -> Result<MutationResult> {
        let candidates = self
            .store
            .search_emails(&SearchCriteria {
                ids: Some(options.email_ids.clone()),
                user_id: Some(user_id.to_string()),
                archived: Some(true),
                ..Default::default()
            })
            .await?
            .emails;

        if candidates.is_empty() {
            return Ok(MutationResult {
                restored: 0,
                errors: vec!["No archived emails owned by this user matched the requested ids".to_string()],
                ..Default::default()
            });
        }

        let ids: Vec<String> = candidates.iter().map(|e| e.id.clone()).collect();
        let mut add_labels = vec!["INBOX".to_string()];
        add_labels.extend(options.restore_labels.iter().cloned());

        let outcome = match self.remote.batch_modify(&ids, &add_labels, &["TRASH".to_string()]).await {
            Ok(_) => {
                let changed = self.store.restore_emails_archive_state(&ids, Some(user_id)).await?;
                crate::metrics::track_bulk_mutation("restore", 1, 0).await;
                MutationResult { restored: changed as usize, ..Default::default() }
            }
            Err(e) => {
                crate::metrics::track_bulk_mutation("restore", 1, 1).await;
                MutationResult { restored: 0, errors: vec![e.to_string()], ..Default::default() }
            }
        };
        Ok(outcome)
    }

    pub async fn archive_emails(&self, mut options: ArchiveOptions, user_id: &str) -> Result<MutationResult> {
        options.criteria.user_id = Some(user_id.to_string());
        let candidates = self.store.search_emails(&options.criteria).await?.emails;
        let ids: Vec<String> = candidates.iter().map(|e| e.id.clone()).collect();
        if ids.is_empty() {
            return Ok(MutationResult::default());
        }

        match options.method {
            ArchiveMethod::Gmail => {
                match self.remote.batch_modify(&ids, &["ARCHIVED".to_string()], &["INBOX".to_string()]).await {
                    Ok(_) => {
                        let changed = self.store.archive_emails_gmail(&ids, Some(user_id)).await?;
                        crate::metrics::track_bulk_mutation("archive_gmail", 1, 0).await;
                        Ok(MutationResult { archived: changed as usize, ..Default::default() })
                    }
                    Err(e) => {
                        crate::metrics::track_bulk_mutation("archive_gmail", 1, 1).await;
                        Ok(MutationResult { archived: 0, errors: vec![e.to_string()], ..Default::default() })
                    }
                }
            }
            ArchiveMethod::Export => {
                let user_dir = format!("{}/user_{}", options.export_base_path, user_id);
                tokio::fs::create_dir_all(&user_dir).await?;

                let now = chrono::Utc::now().timestamp_millis();
                let extension = self.export_formatter.file_extension();
                let filename = format!("{now}-{}-user_{user_id}.{extension}", options.export_label);
                let path = format!("{user_dir}/{filename}");

                let bytes = self.export_formatter.format_emails(&candidates);
                tokio::fs::write(&path, &bytes).await?;

                let file_id = uuid::Uuid::new_v4().to_string();
                self.file_acl
                    .create_file_metadata(CreateFileRequest {
                        id: file_id.clone(),
                        file_path: path.clone(),
                        original_filename: filename,
                        file_type: "email_export".to_string(),
                        size_bytes: bytes.len() as i64,
                        mime_type: None,
                        checksum_sha256: None,
                        encryption_status: "none".to_string(),
                        compression_status: "none".to_string(),
                        user_id: user_id.to_string(),
                        expires_at: None,
                    })
                    .await?;

                self.store
                    .insert_archive_record(&ArchiveRecord {
                        id: uuid::Uuid::new_v4().to_string(),
                        user_id: user_id.to_string(),
                        email_id: ids.join(","),
                        method: "export".to_string(),
                        location: path.clone(),
                        created_at: now,
                    })
                    .await?;

                let changed = self.store.archive_emails_export(&ids, &path, Some(user_id)).await?;
                crate::metrics::track_bulk_mutation("archive_export", 1, 0).await;
                Ok(MutationResult { archived: changed as usize, ..Default::default() })
            }
        }
    }

    pub async fn batch_delete_for_cleanup(
        &self,
        emails: Vec<EmailIndex>,
        policy: &CleanupPolicy,
        options: BatchDeleteOptions,
        user_id: &str,
    ) -> Result<MutationResult> {
        let mut filtered: Vec<EmailIndex> = Vec::new();
        for email in emails {
            if policy.safety.preserve_important && email.category.as_deref() == Some("high") {
                continue;
            }
            filtered.push(email);
        }
        if let Some(max) = policy.safety.max_emails_per_run {
            if filtered.len() > max {
                filtered.truncate(max);
            }
        }

        let mut result = MutationResult::default();
        if filtered.is_empty() {
            return Ok(result);
        }

        if options.dry_run {
            result.deleted = filtered.len();
            result.errors.push(format!("DRY RUN: would process {} emails", filtered.len()));
            return Ok(result);
        }

        let batch_size = options.batch_size.unwrap_or(MAX_BATCH_SIZE).min(MAX_BATCH_SIZE);
        let ids: Vec<String> = filtered.iter().map(|e| e.id.clone()).collect();
        let storage: Vec<i64> = filtered.iter().map(|e| e.size).collect();

        let mut batch_count = 0usize;
        let mut failed_batches = 0usize;
        for (batch_no, (id_chunk, size_chunk)) in ids.chunks(batch_size).zip(storage.chunks(batch_size)).enumerate() {
            if result.failed >= policy.safety.max_failures {
                break;
            }
            batch_count += 1;

            let outcome: Result<i64> = match policy.action {
                CleanupActionType::Delete => match self
                    .remote
                    .batch_modify(id_chunk, &["TRASH".to_string()], &["INBOX".to_string(), "UNREAD".to_string()])
                    .await
                {
                    Ok(_) => self.store.mark_emails_as_deleted(id_chunk, Some(user_id)).await,
                    Err(e) => Err(e),
                },
                CleanupActionType::Archive => self.store.archive_emails_gmail(id_chunk, Some(user_id)).await,
            };

            match outcome {
                Ok(changed) => {
                    let freed: i64 = size_chunk.iter().sum();
                    match policy.action {
                        CleanupActionType::Delete => {
                            result.deleted += changed as usize;
                            result.storage_freed += freed;
                        }
                        CleanupActionType::Archive => {
                            result.archived += changed as usize;
                        }
                    }
                }
                Err(e) => {
                    result.failed += id_chunk.len();
                    failed_batches += 1;
                    result.errors.push(format!("Batch {} failed: {e}", batch_no + 1));
                }
            }
        }
        let operation = match policy.action {
            CleanupActionType::Delete => "cleanup_delete",
            CleanupActionType::Archive => "cleanup_archive",
        };
        crate::metrics::track_bulk_mutation(operation, batch_count, failed_batches).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::JsonExportFormatter;
    use crate::file_acl::FileAclConfig;
    use crate::remote::{FakeFailure, FakeRemoteMailClient, RemoteMessage};

    fn email(id: &str, user_id: &str, category: Option<&str>, size: i64) -> EmailIndex {
        let mut e = EmailIndex::new_minimal(id, Some(user_id.to_string()));
        e.subject = "s".to_string();
        e.sender = "a@b.com".to_string();
        e.date = 1_700_000_000_000;
        e.year = 2023;
        e.size = size;
        e.category = category.map(String::from);
        e
    }

    async fn setup(n: usize, category: Option<&str>) -> (Arc<Store>, Arc<FakeRemoteMailClient>, BulkMutator) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        for i in 0..n {
            store.upsert_email_index(&email(&format!("e{i}"), "u1", category, 1000), None).await.unwrap();
        }
        let remote = Arc::new(FakeRemoteMailClient::new(vec![]));
        let file_acl = Arc::new(FileAccessControl::new(store.clone(), FileAclConfig::default()));
        let formatter = Arc::new(JsonExportFormatter);
        let mutator = BulkMutator::new(store.clone(), remote.clone(), file_acl, formatter);
        (store, remote, mutator)
    }

    #[tokio::test]
    async fn bulk_delete_batches_of_fifty() {
        let (_, remote, mutator) = setup(150, Some("low")).await;
        let options = DeleteOptions {
            criteria: SearchCriteria { category: Some("low".to_string()), ..Default::default() },
            skip_archived: true,
            dry_run: false,
        };
        let result = mutator.delete_emails(options, "u1", false).await.unwrap();
        assert_eq!(result.deleted, 150);
        assert_eq!(remote.call_count(), 3);
    }

    #[tokio::test]
    async fn partial_batch_failure_stops_counting_failed_batch() {
        let (_, remote, mutator) = setup(80, Some("low")).await;
        // FIFO: the one queued failure is consumed by the first `batch_modify` call
        // (the 50-id batch), leaving the second (30-id) batch to succeed.
        remote.queue_failure(FakeFailure::Transient("Network timeout".to_string()));
        let options = DeleteOptions {
            criteria: SearchCriteria { category: Some("low".to_string()), ..Default::default() },
            skip_archived: true,
            dry_run: false,
        };
        let result = mutator.delete_emails(options, "u1", false).await.unwrap();
        assert_eq!(result.deleted, 30);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Network timeout"));
        assert_eq!(remote.call_count(), 2);
    }

    #[tokio::test]
    async fn dry_run_never_calls_remote() {
        let (_, remote, mutator) = setup(10, Some("low")).await;
        let options = DeleteOptions {
            criteria: SearchCriteria { category: Some("low".to_string()), ..Default::default() },
            skip_archived: true,
            dry_run: true,
        };
        let result = mutator.delete_emails(options, "u1", false).await.unwrap();
        assert_eq!(result.deleted, 10);
        assert_eq!(remote.call_count(), 0);
        assert!(result.errors[0].starts_with("DRY RUN"));
    }

    #[tokio::test]
    async fn cleanup_preserves_high_importance() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        for i in 0..2 {
            store.upsert_email_index(&email(&format!("low{i}"), "u1", Some("medium"), 1000), None).await.unwrap();
        }
        for i in 0..3 {
            store.upsert_email_index(&email(&format!("high{i}"), "u1", Some("high"), 1000), None).await.unwrap();
        }
        let remote = Arc::new(FakeRemoteMailClient::new(vec![]));
        let file_acl = Arc::new(FileAccessControl::new(store.clone(), FileAclConfig::default()));
        let formatter = Arc::new(JsonExportFormatter);
        let mutator = BulkMutator::new(store.clone(), remote.clone(), file_acl, formatter);

        let emails = store
            .get_emails_for_cleanup(&CleanupCriteria::default(), None, Some("u1"))
            .await
            .unwrap();
        assert_eq!(emails.len(), 5);

        let policy = CleanupPolicy {
            action: CleanupActionType::Delete,
            safety: CleanupSafety { preserve_important: true, max_emails_per_run: None, max_failures: 3 },
        };
        let result = mutator
            .batch_delete_for_cleanup(emails, &policy, BatchDeleteOptions::default(), "u1")
            .await
            .unwrap();
        assert_eq!(result.deleted, 0);
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn restore_refuses_cross_user_rows() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let mut archived = email("e-u2", "u2", None, 1000);
        archived.archived = true;
        archived.archive_location = Some("trash".to_string());
        store.upsert_email_index(&archived, None).await.unwrap();

        let remote = Arc::new(FakeRemoteMailClient::new(vec![]));
        let file_acl = Arc::new(FileAccessControl::new(store.clone(), FileAclConfig::default()));
        let formatter = Arc::new(JsonExportFormatter);
        let mutator = BulkMutator::new(store.clone(), remote, file_acl, formatter);

        let result = mutator
            .restore_emails(RestoreOptions { email_ids: vec!["e-u2".to_string()], restore_labels: vec![] }, "u1")
            .await
            .unwrap();
        assert_eq!(result.restored, 0);
        assert_eq!(result.errors.len(), 1);

        let still_archived = store.get_emails_for_cleanup(&CleanupCriteria::default(), None, Some("u2")).await.unwrap();
        assert!(still_archived.is_empty());
        let row = store
            .search_emails(&SearchCriteria { ids: Some(vec!["e-u2".to_string()]), ..Default::default() })
            .await
            .unwrap();
        assert!(row.emails[0].archived);
    }

    #[tokio::test]
    async fn export_archive_creates_file_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _remote, mutator) = setup(2, None).await;

        let options = ArchiveOptions {
            criteria: SearchCriteria::default(),
            method: ArchiveMethod::Export,
            export_base_path: dir.path().to_string_lossy().to_string(),
            export_label: "backup".to_string(),
        };
        let result = mutator.archive_emails(options, "u1").await.unwrap();
        assert_eq!(result.archived, 2);

        let rows = store.get_emails_for_cleanup(&CleanupCriteria::default(), None, Some("u1")).await.unwrap();
        assert!(rows.is_empty(), "archived rows are excluded from cleanup candidates");
    }
}
