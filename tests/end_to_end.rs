//! Integration-style coverage of the six concrete scenarios in the
//! categorization/bulk-mutation design. Scenario 1 wires the full async
//! stack (`StoreRegistry` + `JobQueue` + `JobStore` + `CategorizationWorker`);
//! the rest exercise the public `SearchEngine`/`BulkMutator` surface directly,
//! the way a caller outside the crate would.

use mailindex::bulk::{
    ArchiveOptions, BatchDeleteOptions, BulkMutator, CleanupActionType, CleanupPolicy,
    CleanupSafety, DeleteOptions, RestoreOptions,
};
use mailindex::export::JsonExportFormatter;
use mailindex::file_acl::{FileAccessControl, FileAclConfig};
use mailindex::jobs::{CategorizationWorker, JobQueue, JobStore};
use mailindex::remote::{FakeFailure, FakeRemoteMailClient, RemoteMessage};
use mailindex::search::{QueryCriteria, SearchEngine};
use mailindex::store::email::{CleanupCriteria, SearchCriteria};
use mailindex::store::jobs::{Job, JobStatus};
use mailindex::store::{EmailIndex, Store, StoreRegistry};
use mailindex::{ArchiveMethod, EngineConfig};
use std::sync::Arc;

fn email(id: &str, user_id: &str, category: Option<&str>) -> EmailIndex {
    let mut e = EmailIndex::new_minimal(id, Some(user_id.to_string()));
    e.subject = "s".to_string();
    e.sender = "a@b.com".to_string();
    e.date = 1_700_000_000_000;
    e.year = 2023;
    e.size = 1000;
    e.category = category.map(String::from);
    e
}

#[tokio::test]
async fn scenario_1_categorize_one_urgent_email_via_the_full_async_stack() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(StoreRegistry::new(dir.path()));
    let store = registry.get("u1").await.unwrap();

    let mut urgent = EmailIndex::new_minimal("e1", Some("u1".to_string()));
    urgent.subject = "URGENT: Action Required".to_string();
    urgent.sender = "boss@company.com".to_string();
    urgent.labels = vec!["INBOX".to_string(), "IMPORTANT".to_string()];
    urgent.size = 150_000;
    urgent.has_attachments = true;
    urgent.date = chrono::Utc::now().timestamp_millis();
    urgent.year = 2024;
    store.upsert_email_index(&urgent, None).await.unwrap();

    let job_backing_store = Arc::new(Store::open_in_memory().await.unwrap());
    let job_store = Arc::new(JobStore::new(job_backing_store));
    let job = Job::new("j1", "categorization", "u1", serde_json::json!({"year": 2024, "forceRefresh": false}));
    job_store.insert(&job).await.unwrap();

    let queue = Arc::new(JobQueue::new());
    let cache = Arc::new(mailindex::Cache::default());
    let worker = CategorizationWorker::new(queue.clone(), job_store.clone(), registry.clone(), cache, EngineConfig::default());
    worker.start().await;
    queue.add_job("j1", "u1").await;

    let mut completed = None;
    for _ in 0..200 {
        if let Some(fetched) = job_store.get("j1", "u1").await.unwrap() {
            if fetched.status.is_terminal() {
                completed = Some(fetched);
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    worker.stop();
    worker.wait_for_shutdown().await;

    let job = completed.expect("job did not complete in time");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.results.as_ref().unwrap()["processed"], 1);

    let row = store
        .search_emails(&SearchCriteria { user_id: Some("u1".to_string()), ..Default::default() })
        .await
        .unwrap()
        .emails
        .remove(0);
    assert_eq!(row.category.as_deref(), Some("high"));
    assert_eq!(row.importance_level.as_deref(), Some("high"));
    assert!(row.age_category.is_some());
    assert!(row.size_category.is_some());
    assert_eq!(row.analysis_version.as_deref(), Some("1.0.0"));
}

#[tokio::test]
async fn scenario_2_cross_user_isolation_on_search() {
    let store = Arc::new(Store::open_in_memory().await.unwrap());
    let mut e1 = email("e-u1", "u1", None);
    e1.subject = "same subject".to_string();
    let mut e2 = email("e-u2", "u2", None);
    e2.subject = "same subject".to_string();
    store.upsert_email_index(&e1, None).await.unwrap();
    store.upsert_email_index(&e2, None).await.unwrap();

    let engine = SearchEngine::new(store);
    let u1 = engine.search(QueryCriteria::default(), "u1").await.unwrap();
    let u2 = engine.search(QueryCriteria::default(), "u2").await.unwrap();
    assert_eq!(u1.emails.iter().map(|e| e.id.clone()).collect::<Vec<_>>(), vec!["e-u1"]);
    assert_eq!(u2.emails.iter().map(|e| e.id.clone()).collect::<Vec<_>>(), vec!["e-u2"]);
}

async fn bulk_mutator_over(store: Arc<Store>, remote: Arc<FakeRemoteMailClient>) -> BulkMutator {
    let file_acl = Arc::new(FileAccessControl::new(store.clone(), FileAclConfig::default()));
    BulkMutator::new(store, remote, file_acl, Arc::new(JsonExportFormatter))
}

#[tokio::test]
async fn scenario_3_bulk_delete_batches_of_fifty() {
    let store = Arc::new(Store::open_in_memory().await.unwrap());
    for i in 0..150 {
        store.upsert_email_index(&email(&format!("e{i}"), "u1", Some("low")), None).await.unwrap();
    }
    let remote = Arc::new(FakeRemoteMailClient::new(vec![]));
    let mutator = bulk_mutator_over(store, remote.clone()).await;

    let options = DeleteOptions {
        criteria: SearchCriteria { category: Some("low".to_string()), ..Default::default() },
        skip_archived: true,
        dry_run: false,
    };
    let result = mutator.delete_emails(options, "u1", false).await.unwrap();

    assert_eq!(result.deleted, 150);
    assert_eq!(remote.call_count(), 3);
    for (ids, add, remove) in remote.batch_modify_calls.lock().unwrap().iter() {
        assert!(ids.len() <= 50);
        assert_eq!(add, &vec!["TRASH".to_string()]);
        assert_eq!(remove, &vec!["INBOX".to_string(), "UNREAD".to_string()]);
    }
}

#[tokio::test]
async fn scenario_4_partial_batch_failure() {
    let store = Arc::new(Store::open_in_memory().await.unwrap());
    for i in 0..80 {
        store.upsert_email_index(&email(&format!("e{i}"), "u1", Some("low")), None).await.unwrap();
    }
    let remote = Arc::new(FakeRemoteMailClient::new(vec![]));
    remote.queue_failure(FakeFailure::Transient("Network timeout".to_string()));
    let mutator = bulk_mutator_over(store, remote.clone()).await;

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
async fn scenario_5_cleanup_preserves_high_importance() {
    let store = Arc::new(Store::open_in_memory().await.unwrap());
    for i in 0..3 {
        store.upsert_email_index(&email(&format!("high{i}"), "u1", Some("high")), None).await.unwrap();
    }
    for i in 0..2 {
        store.upsert_email_index(&email(&format!("mid{i}"), "u1", Some("medium")), None).await.unwrap();
    }
    let remote = Arc::new(FakeRemoteMailClient::new(vec![]));
    let mutator = bulk_mutator_over(store.clone(), remote.clone()).await;

    let candidates = store.get_emails_for_cleanup(&CleanupCriteria::default(), None, Some("u1")).await.unwrap();
    assert_eq!(candidates.len(), 5);

    let policy = CleanupPolicy {
        action: CleanupActionType::Delete,
        safety: CleanupSafety { preserve_important: true, max_emails_per_run: None, max_failures: 3 },
    };
    let result = mutator
        .batch_delete_for_cleanup(candidates, &policy, BatchDeleteOptions::default(), "u1")
        .await
        .unwrap();

    assert_eq!(result.deleted, 0);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn scenario_6_restore_cross_user_refusal() {
    let store = Arc::new(Store::open_in_memory().await.unwrap());
    let mut archived = email("e-u2", "u2", None);
    archived.archived = true;
    archived.archive_location = Some("ARCHIVED".to_string());
    store.upsert_email_index(&archived, None).await.unwrap();

    let remote = Arc::new(FakeRemoteMailClient::new(vec![]));
    let mutator = bulk_mutator_over(store.clone(), remote).await;

    let result = mutator
        .restore_emails(RestoreOptions { email_ids: vec!["e-u2".to_string()], restore_labels: vec![] }, "u1")
        .await
        .unwrap();

    assert_eq!(result.restored, 0);
    assert_eq!(result.errors.len(), 1);

    let row = store
        .search_emails(&SearchCriteria { ids: Some(vec!["e-u2".to_string()]), ..Default::default() })
        .await
        .unwrap();
    assert!(row.emails[0].archived);
}

/// Archive (gmail method) then restore round-trips `archived`/`archive_location`
/// back to their pre-archive state (spec §8 round-trip law).
#[tokio::test]
async fn archive_then_restore_round_trips() {
    let store = Arc::new(Store::open_in_memory().await.unwrap());
    store.upsert_email_index(&email("e1", "u1", None), None).await.unwrap();

    let remote = Arc::new(FakeRemoteMailClient::new(vec![RemoteMessage {
        id: "e1".to_string(),
        thread_id: "t1".to_string(),
        subject: "s".to_string(),
        sender: "a@b.com".to_string(),
        recipients: vec![],
        date: 1_700_000_000_000,
        size: 1000,
        has_attachments: false,
        labels: vec![],
        snippet: String::new(),
    }]));
    let mutator = bulk_mutator_over(store.clone(), remote).await;

    let archived = mutator
        .archive_emails(
            ArchiveOptions {
                criteria: SearchCriteria::default(),
                method: ArchiveMethod::Gmail,
                export_base_path: String::new(),
                export_label: String::new(),
            },
            "u1",
        )
        .await
        .unwrap();
    assert_eq!(archived.archived, 1);

    let restored = mutator
        .restore_emails(RestoreOptions { email_ids: vec!["e1".to_string()], restore_labels: vec![] }, "u1")
        .await
        .unwrap();
    assert_eq!(restored.restored, 1);

    let row = store
        .search_emails(&SearchCriteria { ids: Some(vec!["e1".to_string()]), ..Default::default() })
        .await
        .unwrap();
    assert!(!row.emails[0].archived);
    assert!(row.emails[0].archive_location.is_none());
}
