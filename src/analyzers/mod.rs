//! Pure per-email classifiers (spec §4.E). All three share an
//! `EmailAnalysisContext` and a cache look-aside helper with a configurable
//! key strategy; the engine ([`crate::engine`]) holds a fixed triple rather
//! than dispatching through a trait object — per the design notes, the
//! composition is closed, so a dynamic-dispatch boundary buys nothing.

pub mod date_size;
pub mod importance;
pub mod label;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub use date_size::{DateSizeAnalyzer, DateSizeConfig, DateSizeResult};
pub use importance::{ImportanceAnalyzer, ImportanceConfig, ImportanceResult};
pub use label::{LabelClassifier, LabelClassifierConfig, LabelResult};

/// Normalized view of an email handed to every analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAnalysisContext {
    pub email_id: String,
    pub subject_lower: String,
    pub sender_lower: String,
    pub snippet_lower: String,
    pub labels: Vec<String>,
    pub date: i64,
    pub size: i64,
    pub has_attachments: bool,
    pub user_id: String,
}

impl EmailAnalysisContext {
    pub fn new(
        email_id: impl Into<String>,
        subject: &str,
        sender: &str,
        snippet: &str,
        labels: Vec<String>,
        date: i64,
        size: i64,
        has_attachments: bool,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            email_id: email_id.into(),
            subject_lower: subject.to_lowercase(),
            sender_lower: sender.to_lowercase(),
            snippet_lower: snippet.to_lowercase(),
            labels,
            date,
            size,
            has_attachments,
            user_id: user_id.into(),
        }
    }
}

/// Cache key strategies shared by all three analyzers (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKeyStrategy {
    /// `{prefix}:{user}:{id}:{subject}:{sender}`
    Partial,
    /// `{prefix}:{user}:base64(canonical_context)`
    Full,
}

pub fn cache_key(prefix: &str, strategy: CacheKeyStrategy, ctx: &EmailAnalysisContext) -> String {
    match strategy {
        CacheKeyStrategy::Partial => format!(
            "{prefix}:{}:{}:{}:{}",
            ctx.user_id, ctx.email_id, ctx.subject_lower, ctx.sender_lower
        ),
        CacheKeyStrategy::Full => {
            let canonical = format!(
                "{}|{}|{}|{}|{:?}|{}|{}|{}",
                ctx.email_id,
                ctx.subject_lower,
                ctx.sender_lower,
                ctx.snippet_lower,
                ctx.labels,
                ctx.date,
                ctx.size,
                ctx.has_attachments
            );
            let encoded = base64::engine::general_purpose::STANDARD.encode(canonical);
            format!("{prefix}:{}:{encoded}", ctx.user_id)
        }
    }
}
