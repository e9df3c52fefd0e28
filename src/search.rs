//! Top-level `SearchEngine` (spec §4.K): delegates the query shape to the
//! Store, applies a post-hoc free-text predicate, and owns saved-search
//! persistence. Caches nothing — results are considered volatile.

use crate::store::email::SearchCriteria;
use crate::store::search::SavedSearch;
use crate::store::{EmailIndex, Store};
use crate::error::Result;
use std::sync::Arc;

pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Default)]
pub struct QueryCriteria {
    pub base: SearchCriteria,
    /// Free text matched against `subject`/`snippet` after the database call.
    /// `"quoted spans"` are matched as exact phrases; unquoted text is matched
    /// as independent substrings (case-insensitive, all must match).
    pub query: Option<String>,
}

pub struct SearchResponse {
    pub emails: Vec<EmailIndex>,
    pub total: i64,
}

pub struct SearchEngine {
    store: Arc<Store>,
}

impl SearchEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn search(&self, mut criteria: QueryCriteria, user_id: &str) -> Result<SearchResponse> {
        criteria.base.user_id = Some(user_id.to_string());
        if criteria.base.limit.is_none() {
            criteria.base.limit = Some(DEFAULT_LIMIT);
        }
        let started = std::time::Instant::now();
        let search_type = if criteria.query.is_some() { "free_text" } else { "advanced" };

        let db_result = self.store.search_emails(&criteria.base).await?;
        let response = match &criteria.query {
            Some(query) if !query.trim().is_empty() => {
                let terms = parse_query_terms(query);
                let filtered: Vec<EmailIndex> = db_result
                    .emails
                    .into_iter()
                    .filter(|email| matches_all_terms(email, &terms))
                    .collect();
                let total = filtered.len() as i64;
                SearchResponse { emails: filtered, total }
            }
            _ => SearchResponse { emails: db_result.emails, total: db_result.total },
        };

        crate::metrics::track_search(search_type, response.emails.len(), started.elapsed().as_millis() as u64)
            .await;
        Ok(response)
    }

    pub async fn save_search(&self, search: &SavedSearch) -> Result<()> {
        self.store.insert_saved_search(search).await
    }

    pub async fn list_saved_searches(&self, user_id: &str) -> Result<Vec<SavedSearch>> {
        self.store.list_saved_searches(user_id).await
    }

    /// Re-applies a saved search's stored criteria.
    pub async fn execute_saved_search(&self, saved: &SavedSearch, user_id: &str) -> Result<SearchResponse> {
        let criteria: QueryCriteria = criteria_from_json(&saved.criteria);
        self.search(criteria, user_id).await
    }
}

fn criteria_from_json(value: &serde_json::Value) -> QueryCriteria {
    QueryCriteria {
        base: SearchCriteria {
            category: value.get("category").and_then(|v| v.as_str()).map(String::from),
            year: value.get("year").and_then(|v| v.as_i64()).map(|y| y as i32),
            sender_like: value.get("sender").and_then(|v| v.as_str()).map(String::from),
            has_attachments: value.get("hasAttachments").and_then(|v| v.as_bool()),
            ..Default::default()
        },
        query: value.get("query").and_then(|v| v.as_str()).map(String::from),
    }
}

/// Splits free text into quoted-phrase and bare-word terms.
fn parse_query_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut chars = query.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes {
                    if !current.is_empty() {
                        terms.push(current.clone());
                        current.clear();
                    }
                    in_quotes = false;
                } else {
                    in_quotes = true;
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    terms.push(current.clone());
                    current.clear();
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms.into_iter().map(|t| t.to_lowercase()).collect()
}

fn matches_all_terms(email: &EmailIndex, terms: &[String]) -> bool {
    let haystack = format!("{} {}", email.subject, email.snippet).to_lowercase();
    terms.iter().all(|term| haystack.contains(term.as_str()))
}

/// Maps criteria to the provider query grammar (spec §4.K). Empty criteria
/// yields an empty string. Year range end is exclusive on the provider side.
pub fn build_advanced_query(criteria: &QueryCriteria) -> String {
    let mut parts = Vec::new();

    if let Some(query) = &criteria.query {
        if !query.trim().is_empty() {
            parts.push(format!("\"{query}\""));
        }
    }
    if let Some(sender) = &criteria.base.sender_like {
        parts.push(format!("from:{sender}"));
    }
    if let Some(year) = criteria.base.year {
        parts.push(format!("after:{year}/1/1"));
        parts.push(format!("before:{}/1/1", year + 1));
    }
    if let Some((start, end)) = criteria.base.year_range {
        parts.push(format!("after:{start}/1/1"));
        parts.push(format!("before:{}/1/1", end + 1));
    }
    if criteria.base.has_attachments == Some(true) {
        parts.push("has:attachment".to_string());
    }
    if let Some(labels) = &criteria.base.labels {
        for label in labels {
            parts.push(format!("label:{label}"));
        }
    }
    if let Some(size_min) = criteria.base.size_min {
        parts.push(format!("larger:{size_min}"));
    }
    if let Some(size_max) = criteria.base.size_max {
        parts.push(format!("smaller:{size_max}"));
    }

    parts.join(" ")
}
