//! `CategorizationEngine` (spec §4.F): orchestrates the three analyzers,
//! combines their results into a final category, and persists the enriched
//! row back to the Store.

use crate::analyzers::{
    DateSizeAnalyzer, DateSizeConfig, DateSizeResult, EmailAnalysisContext, ImportanceAnalyzer,
    ImportanceConfig, ImportanceResult, LabelClassifier, LabelClassifierConfig, LabelResult,
};
use crate::cache::Cache;
use crate::error::Result;
use crate::store::{EmailIndex, Param, Store};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const ANALYSIS_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enable_parallel_processing: bool,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_parallel_processing: true,
            batch_size: 100,
            timeout_ms: 5_000,
            retry_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategorizeOptions {
    pub force_refresh: bool,
    pub year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CombinedAnalysisResult {
    pub importance: ImportanceResult,
    pub date_size: DateSizeResult,
    pub label: LabelResult,
    pub category: String,
    pub confidence: f64,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Insights {
    pub top_matched_rules: Vec<(String, usize)>,
    pub spam_detection_rate: f64,
    pub avg_importance_confidence: f64,
    pub age_category_histogram: HashMap<String, usize>,
    pub size_category_histogram: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CategorizeSummary {
    pub processed: usize,
    pub categories: HashMap<String, usize>,
    pub emails: Vec<String>,
    pub insights: Insights,
}

pub struct CategorizationEngine {
    store: Arc<Store>,
    cache: Arc<Cache>,
    importance: ImportanceAnalyzer,
    date_size: DateSizeAnalyzer,
    label: LabelClassifier,
    config: EngineConfig,
}

impl CategorizationEngine {
    pub fn new(store: Arc<Store>, cache: Arc<Cache>, config: EngineConfig) -> Self {
        let importance = ImportanceAnalyzer::new(ImportanceConfig::default(), cache.clone());
        let date_size = DateSizeAnalyzer::new(DateSizeConfig::default(), cache.clone());
        let label = LabelClassifier::new(LabelClassifierConfig::default(), cache.clone());
        Self { store, cache, importance, date_size, label, config }
    }

    fn build_context(email: &EmailIndex, user_id: &str) -> EmailAnalysisContext {
        EmailAnalysisContext::new(
            email.id.clone(),
            &email.subject,
            &email.sender,
            &email.snippet,
            email.labels.clone(),
            email.date,
            email.size,
            email.has_attachments,
            user_id,
        )
    }

    /// Runs the pipeline for one email without persisting anything.
    pub async fn analyze_email(&self, email: &EmailIndex, user_id: &str) -> CombinedAnalysisResult {
        let ctx = Self::build_context(email, user_id);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let deadline = Duration::from_millis(self.config.timeout_ms);

        let (importance, date_size, label, timed_out) = if self.config.enable_parallel_processing {
            let importance_fut = tokio::time::timeout(deadline, self.importance.analyze(&ctx));
            let date_size_fut = tokio::time::timeout(deadline, self.date_size.analyze(&ctx, now_ms));
            let label_fut = tokio::time::timeout(deadline, self.label.analyze(&ctx));
            let (i, d, l) = tokio::join!(importance_fut, date_size_fut, label_fut);
            let timed_out = i.is_err() || d.is_err() || l.is_err();
            (i.ok(), d.ok(), l.ok(), timed_out)
        } else {
            let i = tokio::time::timeout(deadline, self.importance.analyze(&ctx)).await;
            let d = tokio::time::timeout(deadline, self.date_size.analyze(&ctx, now_ms)).await;
            let l = tokio::time::timeout(deadline, self.label.analyze(&ctx)).await;
            let timed_out = i.is_err() || d.is_err() || l.is_err();
            (i.ok(), d.ok(), l.ok(), timed_out)
        };

        if timed_out {
            tracing::warn!(email_id = %email.id, "analyzer timed out, falling back to medium");
            return CombinedAnalysisResult {
                importance: importance.unwrap_or(ImportanceResult {
                    score: 0.0,
                    level: "medium".to_string(),
                    matched_rules: vec![],
                    confidence: 0.0,
                }),
                date_size: date_size.unwrap_or(DateSizeResult {
                    age_category: "moderate".to_string(),
                    size_category: "medium".to_string(),
                    recency_score: 0.0,
                    size_penalty: 0.0,
                }),
                label: label.unwrap_or(LabelResult {
                    category: "other".to_string(),
                    spam_score: 0.0,
                    promotional_score: 0.0,
                    social_score: 0.0,
                    spam_indicators: vec![],
                    promotional_indicators: vec![],
                    social_indicators: vec![],
                }),
                category: "medium".to_string(),
                confidence: 0.0,
                timed_out: true,
            };
        }

        let importance = importance.unwrap();
        let date_size = date_size.unwrap();
        let label = label.unwrap();
        let category = combine_category(&importance, &date_size, &label);
        let confidence = combine_confidence(&importance, &label);

        CombinedAnalysisResult { importance, date_size, label, category, confidence, timed_out: false }
    }

    /// Runs the pipeline for every matching email and persists results.
    /// Pulls only `category IS NULL` rows unless `force_refresh`, in which
    /// case it pulls every row matching `year`.
    pub async fn categorize_emails(
        &self,
        opts: CategorizeOptions,
        user_id: &str,
    ) -> Result<CategorizeSummary> {
        let started = std::time::Instant::now();
        let candidates = self.fetch_candidates(&opts, user_id).await?;

        let mut summary = CategorizeSummary::default();
        let mut rule_counts: HashMap<String, usize> = HashMap::new();
        let mut confidence_sum = 0.0;
        let mut spam_hits = 0usize;

        for (i, email) in candidates.iter().enumerate() {
            let result = self.analyze_email(email, user_id).await;

            for rule_id in &result.importance.matched_rules {
                *rule_counts.entry(rule_id.clone()).or_insert(0) += 1;
            }
            confidence_sum += result.importance.confidence;
            if result.label.spam_score > 0.5 {
                spam_hits += 1;
            }
            *summary.insights.age_category_histogram.entry(result.date_size.age_category.clone()).or_insert(0) += 1;
            *summary.insights.size_category_histogram.entry(result.date_size.size_category.clone()).or_insert(0) += 1;
            *summary.categories.entry(result.category.clone()).or_insert(0) += 1;

            let persisted = apply_analysis(email.clone(), &result);
            self.store.persist_analysis(&persisted, Some(user_id)).await?;

            summary.emails.push(email.id.clone());
            summary.processed += 1;

            if summary.processed % 100 == 0 {
                tracing::info!(processed = summary.processed, "categorization progress");
            }
        }

        let processed = summary.processed.max(1) as f64;
        summary.insights.avg_importance_confidence = confidence_sum / processed;
        summary.insights.spam_detection_rate = spam_hits as f64 / processed;
        let mut top: Vec<(String, usize)> = rule_counts.into_iter().collect();
        top.sort_by(|a, b| b.1.cmp(&a.1));
        top.truncate(5);
        summary.insights.top_matched_rules = top;

        self.cache.flush_user(user_id).await;
        crate::metrics::track_categorization_job(
            summary.processed,
            started.elapsed().as_millis() as u64,
            true,
        )
        .await;
        Ok(summary)
    }

    async fn fetch_candidates(&self, opts: &CategorizeOptions, user_id: &str) -> Result<Vec<EmailIndex>> {
        let (sql, params): (&str, Vec<Param>) = match (opts.force_refresh, opts.year) {
            (true, Some(year)) => (
                "SELECT * FROM email_index WHERE user_id = ? AND year = ? ORDER BY date DESC",
                vec![user_id.into(), (year as i64).into()],
            ),
            (true, None) => (
                "SELECT * FROM email_index WHERE user_id = ? ORDER BY date DESC",
                vec![user_id.into()],
            ),
            (false, Some(year)) => (
                "SELECT * FROM email_index WHERE user_id = ? AND category IS NULL AND year = ? ORDER BY date DESC",
                vec![user_id.into(), (year as i64).into()],
            ),
            (false, None) => (
                "SELECT * FROM email_index WHERE user_id = ? AND category IS NULL ORDER BY date DESC",
                vec![user_id.into()],
            ),
        };
        let rows = self.store.query_all(sql, &params).await?;
        Ok(rows.into_iter().map(EmailIndex::from).collect())
    }
}

/// Combination rule (spec §4.F).
fn combine_category(importance: &ImportanceResult, date_size: &DateSizeResult, label: &LabelResult) -> String {
    let recent = date_size.age_category == "recent";
    let label_important = label.category == "important";

    match importance.level.as_str() {
        "high" => "high".to_string(),
        "low" => {
            if recent && label_important {
                "medium".to_string()
            } else {
                "low".to_string()
            }
        }
        "medium" => {
            if recent && label_important {
                "high".to_string()
            } else if label.spam_score > 0.7 || label.promotional_score > 0.8 {
                "low".to_string()
            } else {
                "medium".to_string()
            }
        }
        _ => "medium".to_string(),
    }
}

fn combine_confidence(importance: &ImportanceResult, label: &LabelResult) -> f64 {
    let total_indicators = label.spam_indicators.len() + label.promotional_indicators.len() + label.social_indicators.len();
    0.6 * importance.confidence + 0.2 * 0.8 + 0.2 * (total_indicators as f64 * 0.2).min(1.0)
}

/// Copies every analyzer field onto the row (`collectAnalyzerResults`).
/// `gmail_category == "other"` folds to `"primary"` — the column constraint
/// does not accept `other`.
fn apply_analysis(mut email: EmailIndex, result: &CombinedAnalysisResult) -> EmailIndex {
    email.category = Some(result.category.clone());
    email.importance_score = Some(result.importance.score.round() as i64);
    email.importance_level = Some(result.importance.level.clone());
    email.importance_matched_rules = Some(result.importance.matched_rules.clone());
    email.importance_confidence = Some(result.importance.confidence);

    email.age_category = Some(result.date_size.age_category.clone());
    email.size_category = Some(result.date_size.size_category.clone());
    email.recency_score = Some(result.date_size.recency_score);
    email.size_penalty = Some(result.date_size.size_penalty);

    let gmail_category = if result.label.category == "other" { "primary" } else { &result.label.category };
    email.gmail_category = Some(gmail_category.to_string());
    email.spam_score = Some(result.label.spam_score);
    email.promotional_score = Some(result.label.promotional_score);
    email.social_score = Some(result.label.social_score);
    email.spam_indicators = Some(result.label.spam_indicators.clone());
    email.promotional_indicators = Some(result.label.promotional_indicators.clone());
    email.social_indicators = Some(result.label.social_indicators.clone());

    email.analysis_timestamp = Some(chrono::Utc::now().timestamp_millis());
    email.analysis_version = Some(ANALYSIS_VERSION.to_string());
    email
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urgent_email() -> EmailIndex {
        let mut e = EmailIndex::new_minimal("e1", Some("u1".to_string()));
        e.subject = "URGENT: Action Required".to_string();
        e.sender = "boss@company.com".to_string();
        e.labels = vec!["INBOX".to_string(), "IMPORTANT".to_string()];
        e.size = 150_000;
        e.has_attachments = true;
        e.date = chrono::Utc::now().timestamp_millis();
        e.year = 2024;
        e
    }

    #[tokio::test]
    async fn categorize_one_urgent_email_ends_up_high() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let cache = Arc::new(Cache::default());
        store.upsert_email_index(&urgent_email(), None).await.unwrap();

        let engine = CategorizationEngine::new(store.clone(), cache, EngineConfig::default());
        let summary = engine
            .categorize_emails(CategorizeOptions { force_refresh: false, year: Some(2024) }, "u1")
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.categories.get("high"), Some(&1));

        let result = store
            .search_emails(&crate::store::SearchCriteria { user_id: Some("u1".to_string()), ..Default::default() })
            .await
            .unwrap();
        let row = &result.emails[0];
        assert_eq!(row.category.as_deref(), Some("high"));
        assert_eq!(row.importance_level.as_deref(), Some("high"));
        assert!(row.age_category.is_some());
        assert!(row.size_category.is_some());
        assert_eq!(row.analysis_version.as_deref(), Some("1.0.0"));
    }

    #[tokio::test]
    async fn already_categorized_emails_are_skipped_without_force_refresh() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let cache = Arc::new(Cache::default());
        let mut email = urgent_email();
        email.category = Some("low".to_string());
        store.upsert_email_index(&email, None).await.unwrap();

        let engine = CategorizationEngine::new(store, cache, EngineConfig::default());
        let summary = engine
            .categorize_emails(CategorizeOptions { force_refresh: false, year: Some(2024) }, "u1")
            .await
            .unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn force_refresh_reprocesses_already_categorized_emails() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let cache = Arc::new(Cache::default());
        let mut email = urgent_email();
        email.category = Some("low".to_string());
        store.upsert_email_index(&email, None).await.unwrap();

        let engine = CategorizationEngine::new(store, cache, EngineConfig::default());
        let summary = engine
            .categorize_emails(CategorizeOptions { force_refresh: true, year: Some(2024) }, "u1")
            .await
            .unwrap();
        assert_eq!(summary.processed, 1);
    }
}
