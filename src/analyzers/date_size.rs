//! `DateSizeAnalyzer` (spec §4.E.2): age and size buckets plus a recency
//! score and size penalty, both cache-backed.

use super::{cache_key, CacheKeyStrategy, EmailAnalysisContext};
use crate::cache::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateSizeConfig {
    pub recent_days: i64,
    pub moderate_days: i64,
    pub old_days_for_recency: i64,
    pub small_bytes: i64,
    pub medium_bytes: i64,
    pub large_bytes_ceiling: i64,
    pub cache_ttl: Duration,
    pub cache_key_strategy_full: bool,
}

impl Default for DateSizeConfig {
    fn default() -> Self {
        Self {
            recent_days: 7,
            moderate_days: 30,
            old_days_for_recency: 365,
            small_bytes: 100 * 1024,
            medium_bytes: 1024 * 1024,
            large_bytes_ceiling: 10 * 1024 * 1024,
            cache_ttl: Duration::from_secs(300),
            cache_key_strategy_full: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateSizeResult {
    pub age_category: String,
    pub size_category: String,
    pub recency_score: f64,
    pub size_penalty: f64,
}

pub struct DateSizeAnalyzer {
    config: DateSizeConfig,
    cache: Arc<Cache>,
}

impl DateSizeAnalyzer {
    pub fn new(config: DateSizeConfig, cache: Arc<Cache>) -> Self {
        Self { config, cache }
    }

    fn strategy(&self) -> CacheKeyStrategy {
        if self.config.cache_key_strategy_full {
            CacheKeyStrategy::Full
        } else {
            CacheKeyStrategy::Partial
        }
    }

    pub async fn analyze(&self, ctx: &EmailAnalysisContext, now_ms: i64) -> DateSizeResult {
        let key = cache_key("datesize", self.strategy(), ctx);
        if let Some(cached) = self.cache.get::<DateSizeResult>(&key).await {
            return cached;
        }

        let age_days = (now_ms - ctx.date) as f64 / 86_400_000.0;

        let age_category = if age_days <= self.config.recent_days as f64 {
            "recent"
        } else if age_days <= self.config.moderate_days as f64 {
            "moderate"
        } else {
            "old"
        };

        let size_category = if ctx.size <= self.config.small_bytes {
            "small"
        } else if ctx.size <= self.config.medium_bytes {
            "medium"
        } else {
            "large"
        };

        // Future dates (negative age_days) legally exceed 1 — only the lower
        // bound is clamped.
        let recency_score = (1.0 - age_days / self.config.old_days_for_recency as f64).max(0.0);

        let size_penalty = if ctx.size <= self.config.small_bytes {
            0.0
        } else {
            ((ctx.size - self.config.small_bytes) as f64
                / (self.config.large_bytes_ceiling - self.config.small_bytes) as f64)
                .min(1.0)
        };

        let result = DateSizeResult {
            age_category: age_category.to_string(),
            size_category: size_category.to_string(),
            recency_score,
            size_penalty,
        };
        self.cache.set(&key, &result, Some(self.config.cache_ttl)).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_age_days(age_days: i64) -> (EmailAnalysisContext, i64) {
        let now_ms = 1_700_000_000_000;
        let date = now_ms - age_days * 86_400_000;
        (EmailAnalysisContext::new("e1", "", "", "", vec![], date, 0, false, "u1"), now_ms)
    }

    #[tokio::test]
    async fn age_boundary_exactly_seven_days_is_recent() {
        let analyzer = DateSizeAnalyzer::new(DateSizeConfig::default(), Arc::new(Cache::default()));
        let (ctx, now) = ctx_with_age_days(7);
        assert_eq!(analyzer.analyze(&ctx, now).await.age_category, "recent");
    }

    #[tokio::test]
    async fn age_boundary_exactly_thirty_days_is_moderate() {
        let analyzer = DateSizeAnalyzer::new(DateSizeConfig::default(), Arc::new(Cache::default()));
        let (ctx, now) = ctx_with_age_days(30);
        assert_eq!(analyzer.analyze(&ctx, now).await.age_category, "moderate");
    }

    #[tokio::test]
    async fn age_thirty_one_days_is_old() {
        let analyzer = DateSizeAnalyzer::new(DateSizeConfig::default(), Arc::new(Cache::default()));
        let (ctx, now) = ctx_with_age_days(31);
        assert_eq!(analyzer.analyze(&ctx, now).await.age_category, "old");
    }

    #[tokio::test]
    async fn size_boundaries() {
        let analyzer = DateSizeAnalyzer::new(DateSizeConfig::default(), Arc::new(Cache::default()));
        let now = 0;
        let small = EmailAnalysisContext::new("e1", "", "", "", vec![], 0, 100 * 1024, false, "u1");
        assert_eq!(analyzer.analyze(&small, now).await.size_category, "small");

        let medium = EmailAnalysisContext::new("e2", "", "", "", vec![], 0, 1024 * 1024, false, "u1");
        assert_eq!(analyzer.analyze(&medium, now).await.size_category, "medium");

        let large = EmailAnalysisContext::new("e3", "", "", "", vec![], 0, 10 * 1024 * 1024, false, "u1");
        assert_eq!(analyzer.analyze(&large, now).await.size_category, "large");
    }

    #[tokio::test]
    async fn small_email_has_no_size_penalty() {
        let analyzer = DateSizeAnalyzer::new(DateSizeConfig::default(), Arc::new(Cache::default()));
        let ctx = EmailAnalysisContext::new("e1", "", "", "", vec![], 0, 1024, false, "u1");
        assert_eq!(analyzer.analyze(&ctx, 0).await.size_penalty, 0.0);
    }

    #[tokio::test]
    async fn future_date_recency_score_can_exceed_one() {
        let analyzer = DateSizeAnalyzer::new(DateSizeConfig::default(), Arc::new(Cache::default()));
        let ctx = EmailAnalysisContext::new("e1", "", "", "", vec![], 86_400_000 * 10, 0, false, "u1");
        let result = analyzer.analyze(&ctx, 0).await;
        assert!(result.recency_score > 1.0);
    }
}
