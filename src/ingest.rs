//! `Ingester` (spec §4.M): pulls remote messages page by page, batch-fetches
//! full details, and upserts them into the user's Store. Also the write side
//! of the access-pattern tables consumed by cleanup's `no_access_days` /
//! `access_score_max` predicates.

use crate::error::Result;
use crate::remote::{RemoteMailClient, RemoteMessage};
use crate::store::{EmailIndex, Store};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub pages_fetched: usize,
    pub messages_upserted: usize,
}

pub struct Ingester {
    store: Arc<Store>,
    remote: Arc<dyn RemoteMailClient>,
    page_size: u32,
}

impl Ingester {
    pub fn new(store: Arc<Store>, remote: Arc<dyn RemoteMailClient>, page_size: u32) -> Self {
        Self { store, remote, page_size }
    }

    /// Pulls every page for `query`, batch-fetching and upserting as it goes.
    pub async fn ingest(&self, query: &str, user_id: &str) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.remote.list_page(query, page_token.as_deref(), self.page_size).await?;
            summary.pages_fetched += 1;

            if !page.messages.is_empty() {
                let ids: Vec<String> = page.messages.iter().map(|m| m.id.clone()).collect();
                let details = self.remote.get_batch(&ids).await?;
                let rows: Vec<EmailIndex> = details.iter().map(|m| remote_to_email_index(m, user_id)).collect();
                self.store.bulk_upsert_email_index(&rows, Some(user_id)).await?;
                summary.messages_upserted += rows.len();
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(summary)
    }

    /// Records that `email_ids` were surfaced by a search and which of them
    /// the user interacted with, feeding `email_access_log`/`search_activity`
    /// and the recency-weighted `email_access_summary`.
    pub async fn record_search_activity(
        &self,
        user_id: &str,
        query: &str,
        email_ids: &[String],
        interacted_ids: &[String],
        at: i64,
    ) -> Result<()> {
        self.store.record_search_activity(user_id, query, email_ids, interacted_ids, at).await
    }

    pub async fn record_access(&self, user_id: &str, email_id: &str, at: i64) -> Result<()> {
        self.store.record_email_access(user_id, email_id, at).await
    }
}

fn remote_to_email_index(message: &RemoteMessage, user_id: &str) -> EmailIndex {
    let mut email = EmailIndex::new_minimal(message.id.clone(), Some(user_id.to_string()));
    email.thread_id = Some(message.thread_id.clone());
    email.subject = message.subject.clone();
    email.sender = message.sender.clone();
    email.recipients = message.recipients.clone();
    email.date = message.date;
    email.year = chrono::DateTime::from_timestamp_millis(message.date)
        .map(|dt| dt.format("%Y").to_string().parse().unwrap_or(0))
        .unwrap_or(0);
    email.size = message.size;
    email.has_attachments = message.has_attachments;
    email.labels = message.labels.clone();
    email.snippet = message.snippet.clone();
    email
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{FakeRemoteMailClient, RemoteMessage};
    use crate::store::email::SearchCriteria;

    fn message(id: &str) -> RemoteMessage {
        RemoteMessage {
            id: id.to_string(),
            thread_id: format!("t-{id}"),
            subject: "hello".to_string(),
            sender: "a@b.com".to_string(),
            recipients: vec!["me@b.com".to_string()],
            date: 1_700_000_000_000,
            size: 1000,
            has_attachments: false,
            labels: vec!["INBOX".to_string()],
            snippet: "hi there".to_string(),
        }
    }

    #[tokio::test]
    async fn ingest_upserts_every_page() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let remote = Arc::new(FakeRemoteMailClient::new(vec![message("e1"), message("e2")]));
        let ingester = Ingester::new(store.clone(), remote, 1);

        let summary = ingester.ingest("in:inbox", "u1").await.unwrap();
        assert_eq!(summary.messages_upserted, 2);

        let rows = store
            .search_emails(&SearchCriteria { user_id: Some("u1".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rows.emails.len(), 2);
    }

    #[tokio::test]
    async fn record_access_feeds_the_summary_table() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let remote = Arc::new(FakeRemoteMailClient::default());
        let ingester = Ingester::new(store.clone(), remote, 50);
        ingester.record_access("u1", "e1", 1_700_000_000_000).await.unwrap();

        let summary = store.get_access_summary("u1", "e1").await.unwrap();
        assert!(summary.is_some());
    }
}
