//! # mailindex - per-user email indexing, categorization and bulk-mutation core
//!
//! Ingests messages from a remote mail provider behind the [`remote`] trait,
//! persists a durable per-user SQLite index ([`store`]), classifies each
//! message with three independent analyzers ([`analyzers`], combined by
//! [`engine`]), serves search ([`search`]) and bulk delete/restore/archive
//! operations ([`bulk`]), and exposes shared file storage with per-file ACLs
//! ([`file_acl`]) for export archives.
//!
//! ## Architecture
//!
//! - [`auth`] resolves a caller's [`auth::UserContext`] to a remote client
//! - [`ingest`] pages through the remote provider and upserts into [`store`]
//! - [`analyzers`] + [`engine`] turn a raw row into a category and insights
//! - [`search`] and [`bulk`] are the read and write surfaces over the index
//! - [`jobs`] makes categorization asynchronous: a durable store, an
//!   in-memory FIFO queue, and a cooperative worker that drains it
//! - [`cache`] is a look-aside cache shared by the analyzers and search
//! - [`metrics`] and [`telemetry`] are the ambient observability stack
//! - [`health`] exposes process introspection for the server's health check

pub mod analyzers;
pub mod auth;
pub mod bulk;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod file_acl;
pub mod health;
pub mod ingest;
pub mod jobs;
pub mod metrics;
pub mod remote;
pub mod search;
pub mod store;
pub mod telemetry;

pub use analyzers::{
    CacheKeyStrategy, DateSizeAnalyzer, DateSizeConfig, DateSizeResult, EmailAnalysisContext,
    ImportanceAnalyzer, ImportanceConfig, ImportanceResult, LabelClassifier,
    LabelClassifierConfig, LabelResult,
};
pub use auth::{AuthError, Authenticator, UserContext};
pub use bulk::{
    ArchiveMethod, ArchiveOptions, BatchDeleteOptions, BulkMutator, CleanupActionType,
    CleanupPolicy, CleanupSafety, DeleteOptions, MutationResult, RestoreOptions,
};
pub use cache::{Cache, CacheStats};
pub use config::Config;
pub use engine::{
    CategorizationEngine, CategorizeOptions, CategorizeSummary, CombinedAnalysisResult,
    EngineConfig, Insights,
};
pub use error::{MailIndexError, Result};
pub use export::{ExportFormatter, JsonExportFormatter};
pub use file_acl::{
    CreateFileRequest, FileAccessCheck, FileAccessControl, FileAclConfig,
};
pub use health::{CacheStatsReport, HealthMonitor, HealthReport};
pub use ingest::{IngestSummary, Ingester};
pub use jobs::{CategorizationWorker, JobQueue, JobStore};
pub use remote::{
    BatchModifyResult, ListPageResult, RemoteMailClient, RemoteMessage, RemoteMessageRef,
};
pub use search::{QueryCriteria, SearchEngine, SearchResponse};
pub use store::{EmailIndex, Param, SearchCriteria, Store, StoreRegistry};

/// Re-export of the most commonly used types, for `use mailindex::prelude::*;`.
pub mod prelude {
    pub use crate::auth::{AuthError, Authenticator, UserContext};
    pub use crate::bulk::{
        ArchiveMethod, ArchiveOptions, BulkMutator, CleanupPolicy, DeleteOptions, MutationResult,
        RestoreOptions,
    };
    pub use crate::cache::Cache;
    pub use crate::config::Config;
    pub use crate::engine::{CategorizationEngine, CategorizeOptions, CategorizeSummary, EngineConfig};
    pub use crate::error::{MailIndexError, Result};
    pub use crate::file_acl::FileAccessControl;
    pub use crate::health::HealthMonitor;
    pub use crate::ingest::Ingester;
    pub use crate::jobs::{CategorizationWorker, JobQueue, JobStore};
    pub use crate::remote::RemoteMailClient;
    pub use crate::search::{QueryCriteria, SearchEngine};
    pub use crate::store::{EmailIndex, Store, StoreRegistry};
}
