//! `LabelClassifier` (spec §4.E.3): maps a label set to a provider category
//! and computes spam/promotional/social scores from configured token sets.

use super::{cache_key, CacheKeyStrategy, EmailAnalysisContext};
use crate::cache::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelClassifierConfig {
    pub important_tokens: Vec<String>,
    pub spam_tokens: Vec<String>,
    pub promotional_tokens: Vec<String>,
    pub social_tokens: Vec<String>,
    pub spam_threshold: f64,
    pub promotional_threshold: f64,
    pub social_threshold: f64,
    pub cache_ttl: Duration,
    pub cache_key_strategy_full: bool,
}

impl Default for LabelClassifierConfig {
    fn default() -> Self {
        Self {
            important_tokens: vec!["IMPORTANT".to_string(), "STARRED".to_string()],
            spam_tokens: vec!["SPAM".to_string(), "JUNK".to_string()],
            promotional_tokens: vec!["PROMOTIONS".to_string(), "CATEGORY_PROMOTIONS".to_string()],
            social_tokens: vec!["SOCIAL".to_string(), "CATEGORY_SOCIAL".to_string()],
            spam_threshold: 0.7,
            promotional_threshold: 0.8,
            social_threshold: 0.5,
            cache_ttl: Duration::from_secs(300),
            cache_key_strategy_full: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelResult {
    /// `{important,spam,promotions,social,primary,updates,forums,other}`
    pub category: String,
    pub spam_score: f64,
    pub promotional_score: f64,
    pub social_score: f64,
    pub spam_indicators: Vec<String>,
    pub promotional_indicators: Vec<String>,
    pub social_indicators: Vec<String>,
}

pub struct LabelClassifier {
    config: LabelClassifierConfig,
    cache: Arc<Cache>,
}

impl LabelClassifier {
    pub fn new(config: LabelClassifierConfig, cache: Arc<Cache>) -> Self {
        Self { config, cache }
    }

    fn strategy(&self) -> CacheKeyStrategy {
        if self.config.cache_key_strategy_full {
            CacheKeyStrategy::Full
        } else {
            CacheKeyStrategy::Partial
        }
    }

    fn matched_tokens(&self, labels_upper: &[String], tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .filter(|t| labels_upper.contains(&t.to_uppercase()))
            .cloned()
            .collect()
    }

    pub async fn analyze(&self, ctx: &EmailAnalysisContext) -> LabelResult {
        let key = cache_key("label", self.strategy(), ctx);
        if let Some(cached) = self.cache.get::<LabelResult>(&key).await {
            return cached;
        }

        let labels_upper: Vec<String> = ctx.labels.iter().map(|l| l.to_uppercase()).collect();

        let spam_indicators = self.matched_tokens(&labels_upper, &self.config.spam_tokens);
        let promotional_indicators = self.matched_tokens(&labels_upper, &self.config.promotional_tokens);
        let social_indicators = self.matched_tokens(&labels_upper, &self.config.social_tokens);
        let important_indicators = self.matched_tokens(&labels_upper, &self.config.important_tokens);

        let spam_score = ratio(spam_indicators.len(), self.config.spam_tokens.len());
        let promotional_score = ratio(promotional_indicators.len(), self.config.promotional_tokens.len());
        let social_score = ratio(social_indicators.len(), self.config.social_tokens.len());

        let category = if !important_indicators.is_empty() {
            "important"
        } else if spam_score >= self.config.spam_threshold {
            "spam"
        } else if promotional_score >= self.config.promotional_threshold {
            "promotions"
        } else if social_score >= self.config.social_threshold {
            "social"
        } else if labels_upper.iter().any(|l| l == "CATEGORY_UPDATES") {
            "updates"
        } else if labels_upper.iter().any(|l| l == "CATEGORY_FORUMS") {
            "forums"
        } else if labels_upper.iter().any(|l| l == "INBOX") {
            "primary"
        } else {
            "other"
        };

        let result = LabelResult {
            category: category.to_string(),
            spam_score,
            promotional_score,
            social_score,
            spam_indicators,
            promotional_indicators,
            social_indicators,
        };
        self.cache.set(&key, &result, Some(self.config.cache_ttl)).await;
        result
    }
}

fn ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    }
}
