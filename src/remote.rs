//! `RemoteMailClient` (spec §4.C, §6): the interface the core consumes from
//! the Gmail-compatible provider. Only the shape is specified here; the wire
//! transport and OAuth flow are explicit Non-goals and live outside this
//! crate.

use crate::error::{MailIndexError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessageRef {
    pub id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPageResult {
    pub messages: Vec<RemoteMessageRef>,
    pub next_page_token: Option<String>,
    pub estimate: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub date: i64,
    pub size: i64,
    pub has_attachments: bool,
    pub labels: Vec<String>,
    pub snippet: String,
}

/// All-or-nothing per batch: the only mutation call.
#[derive(Debug, Clone, Default)]
pub struct BatchModifyResult {
    pub ok: bool,
    pub error: Option<String>,
}

#[async_trait]
pub trait RemoteMailClient: Send + Sync {
    async fn list_page(&self, query: &str, page_token: Option<&str>, max_results: u32) -> Result<ListPageResult>;
    async fn get_batch(&self, ids: &[String]) -> Result<Vec<RemoteMessage>>;
    async fn batch_modify(&self, ids: &[String], add_labels: &[String], remove_labels: &[String]) -> Result<BatchModifyResult>;
}

/// An in-memory double used by tests and by the ingest/bulk pipeline's own
/// test suite. Lets tests script transient/permanent failures per call.
#[derive(Default)]
pub struct FakeRemoteMailClient {
    pub messages: std::sync::Mutex<Vec<RemoteMessage>>,
    pub fail_batches: std::sync::Mutex<Vec<FakeFailure>>,
    pub batch_modify_calls: std::sync::Mutex<Vec<(Vec<String>, Vec<String>, Vec<String>)>>,
}

#[derive(Debug, Clone)]
pub enum FakeFailure {
    Transient(String),
    Permanent(String),
}

impl FakeRemoteMailClient {
    pub fn new(messages: Vec<RemoteMessage>) -> Self {
        Self {
            messages: std::sync::Mutex::new(messages),
            fail_batches: std::sync::Mutex::new(Vec::new()),
            batch_modify_calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Queues a failure (FIFO) to be returned by the next `batch_modify` call.
    pub fn queue_failure(&self, failure: FakeFailure) {
        self.fail_batches.lock().unwrap().push(failure);
    }

    pub fn call_count(&self) -> usize {
        self.batch_modify_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteMailClient for FakeRemoteMailClient {
    async fn list_page(&self, _query: &str, _page_token: Option<&str>, max_results: u32) -> Result<ListPageResult> {
        let messages = self.messages.lock().unwrap();
        let refs: Vec<RemoteMessageRef> = messages
            .iter()
            .take(max_results as usize)
            .map(|m| RemoteMessageRef { id: m.id.clone(), thread_id: m.thread_id.clone() })
            .collect();
        Ok(ListPageResult { messages: refs, next_page_token: None, estimate: Some(messages.len() as u64) })
    }

    async fn get_batch(&self, ids: &[String]) -> Result<Vec<RemoteMessage>> {
        let messages = self.messages.lock().unwrap();
        Ok(messages.iter().filter(|m| ids.contains(&m.id)).cloned().collect())
    }

    async fn batch_modify(&self, ids: &[String], add_labels: &[String], remove_labels: &[String]) -> Result<BatchModifyResult> {
        self.batch_modify_calls.lock().unwrap().push((ids.to_vec(), add_labels.to_vec(), remove_labels.to_vec()));

        let next_failure = {
            let mut q = self.fail_batches.lock().unwrap();
            if q.is_empty() { None } else { Some(q.remove(0)) }
        };
        match next_failure {
            Some(FakeFailure::Transient(msg)) => Err(MailIndexError::RemoteTransient(msg)),
            Some(FakeFailure::Permanent(msg)) => Err(MailIndexError::RemotePermanent(msg)),
            None => Ok(BatchModifyResult { ok: true, error: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_client_replays_queued_failures_in_order() {
        let client = FakeRemoteMailClient::default();
        client.queue_failure(FakeFailure::Transient("Network timeout".to_string()));

        let first = client.batch_modify(&["e1".to_string()], &["TRASH".to_string()], &[]).await;
        assert!(matches!(first, Err(MailIndexError::RemoteTransient(_))));

        let second = client.batch_modify(&["e2".to_string()], &["TRASH".to_string()], &[]).await;
        assert!(second.is_ok());

        assert_eq!(client.call_count(), 2);
    }
}
