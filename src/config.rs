//! Environment-driven configuration.
//!
//! Loaded once at process start (`src/bin/server.rs`, `src/bin/cli.rs`) via
//! `dotenvy` + `std::env`, following the env-var surface named in the spec:
//! `STORAGE_PATH`, `ARCHIVE_PATH`, `SESSION_TIMEOUT_HOURS`, `MAX_TEST_EMAILS`.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for per-user Store files: `<storage_path>/user_<id>.db`.
    pub storage_path: PathBuf,
    /// Base directory for export archives: `<archive_path>/user_<id>/...`.
    pub archive_path: PathBuf,
    pub session_timeout_hours: u64,
    /// Development-only cap on emails considered by a test harness; absent in prod.
    pub max_test_emails: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./data"),
            archive_path: PathBuf::from("./data/archive"),
            session_timeout_hours: 24,
            max_test_emails: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to defaults.
    /// Calls `dotenvy::dotenv()` first so a `.env` file in the working directory
    /// is picked up the same way the teacher's binaries do.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Config::default();

        if let Ok(v) = std::env::var("STORAGE_PATH") {
            cfg.storage_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ARCHIVE_PATH") {
            cfg.archive_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SESSION_TIMEOUT_HOURS") {
            cfg.session_timeout_hours = v.parse().unwrap_or(cfg.session_timeout_hours);
        }
        if let Ok(v) = std::env::var("MAX_TEST_EMAILS") {
            cfg.max_test_emails = v.parse().ok();
        }

        Ok(cfg)
    }

    /// Ensure both base directories exist, creating them if necessary.
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.storage_path).await?;
        tokio::fs::create_dir_all(&self.archive_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_relative_data_dir() {
        let cfg = Config::default();
        assert_eq!(cfg.storage_path, PathBuf::from("./data"));
        assert_eq!(cfg.session_timeout_hours, 24);
        assert!(cfg.max_test_emails.is_none());
    }
}
