//! `ImportanceAnalyzer` (spec §4.E.1): a configurable rule set scoring each
//! email, cache-backed look-aside over [`crate::cache::Cache`].

use super::{cache_key, CacheKeyStrategy, EmailAnalysisContext};
use crate::cache::Cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleKind {
    Keyword { keywords: Vec<String> },
    Domain { domains: Vec<String> },
    Label { labels: Vec<String> },
    NoReply,
    LargeAttachment { min_size: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceRule {
    pub id: String,
    pub kind: RuleKind,
    pub weight: f64,
    /// Higher runs first; also feeds the confidence formula.
    pub priority: i32,
}

#[derive(Debug, Clone)]
struct RuleMatch {
    score: f64,
    priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceConfig {
    pub rules: Vec<ImportanceRule>,
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub cache_ttl: Duration,
    pub cache_key_strategy_full: bool,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                ImportanceRule {
                    id: "urgent-keyword".to_string(),
                    kind: RuleKind::Keyword {
                        keywords: vec!["urgent".to_string(), "action required".to_string(), "asap".to_string()],
                    },
                    weight: 3.0,
                    priority: 90,
                },
                ImportanceRule {
                    id: "important-label".to_string(),
                    kind: RuleKind::Label { labels: vec!["IMPORTANT".to_string()] },
                    weight: 2.0,
                    priority: 80,
                },
                ImportanceRule {
                    id: "no-reply".to_string(),
                    kind: RuleKind::NoReply,
                    weight: -2.0,
                    priority: 50,
                },
                ImportanceRule {
                    id: "large-attachment".to_string(),
                    kind: RuleKind::LargeAttachment { min_size: 1024 * 1024 },
                    weight: 1.0,
                    priority: 30,
                },
            ],
            high_threshold: 3.0,
            low_threshold: 0.0,
            cache_ttl: Duration::from_secs(300),
            cache_key_strategy_full: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportanceResult {
    pub score: f64,
    pub level: String,
    pub matched_rules: Vec<String>,
    pub confidence: f64,
}

pub struct ImportanceAnalyzer {
    config: ImportanceConfig,
    cache: Arc<Cache>,
}

impl ImportanceAnalyzer {
    pub fn new(config: ImportanceConfig, cache: Arc<Cache>) -> Self {
        Self { config, cache }
    }

    fn strategy(&self) -> CacheKeyStrategy {
        if self.config.cache_key_strategy_full {
            CacheKeyStrategy::Full
        } else {
            CacheKeyStrategy::Partial
        }
    }

    /// A failing rule (e.g. an invalid regex built from bad config) is logged
    /// and skipped; remaining rules still run.
    fn evaluate_rule(&self, rule: &ImportanceRule, ctx: &EmailAnalysisContext) -> Option<RuleMatch> {
        let matched_count: usize = match &rule.kind {
            RuleKind::Keyword { keywords } => {
                let haystack = format!("{} {}", ctx.subject_lower, ctx.snippet_lower);
                keywords
                    .iter()
                    .filter(|kw| {
                        let pattern = format!(r"\b{}\b", regex::escape(&kw.to_lowercase()));
                        match Regex::new(&pattern) {
                            Ok(re) => re.is_match(&haystack),
                            Err(e) => {
                                tracing::warn!(rule = %rule.id, error = %e, "importance rule regex failed, skipping");
                                false
                            }
                        }
                    })
                    .count()
            }
            RuleKind::Domain { domains } => {
                if domains.iter().any(|d| ctx.sender_lower.contains(&d.to_lowercase())) {
                    1
                } else {
                    0
                }
            }
            RuleKind::Label { labels } => {
                let lowered: Vec<String> = ctx.labels.iter().map(|l| l.to_lowercase()).collect();
                labels.iter().filter(|l| lowered.contains(&l.to_lowercase())).count()
            }
            RuleKind::NoReply => {
                if ["no-reply", "noreply"].iter().any(|n| ctx.sender_lower.contains(n)) {
                    1
                } else {
                    0
                }
            }
            RuleKind::LargeAttachment { min_size } => {
                if ctx.has_attachments && ctx.size > *min_size {
                    1
                } else {
                    0
                }
            }
        };

        if matched_count == 0 {
            return None;
        }
        let score = match rule.kind {
            RuleKind::Domain { .. } | RuleKind::NoReply | RuleKind::LargeAttachment { .. } => rule.weight,
            _ => matched_count as f64 * rule.weight,
        };
        Some(RuleMatch { score, priority: rule.priority })
    }

    pub async fn analyze(&self, ctx: &EmailAnalysisContext) -> ImportanceResult {
        let key = cache_key("importance", self.strategy(), ctx);
        if let Some(cached) = self.cache.get::<ImportanceResult>(&key).await {
            return cached;
        }

        let mut rules_sorted = self.config.rules.clone();
        rules_sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut matched_ids = Vec::new();
        let mut matches = Vec::new();
        for rule in &rules_sorted {
            if let Some(m) = self.evaluate_rule(rule, ctx) {
                matched_ids.push(rule.id.clone());
                matches.push(m);
            }
        }

        let score: f64 = matches.iter().map(|m| m.score).sum();
        let level = if score >= self.config.high_threshold {
            "high"
        } else if score <= self.config.low_threshold {
            "low"
        } else {
            "medium"
        };

        let total_rules = rules_sorted.len().max(1) as f64;
        let priority_sum: f64 = matches.iter().map(|m| m.priority as f64).sum();
        let confidence = (matches.len() as f64 / total_rules + priority_sum / 100.0).min(1.0);

        let result = ImportanceResult {
            score,
            level: level.to_string(),
            matched_rules: matched_ids,
            confidence,
        };
        self.cache.set(&key, &result, Some(self.config.cache_ttl)).await;
        result
    }
}
