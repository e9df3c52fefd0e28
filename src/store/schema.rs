//! Schema DDL. `date`/timestamp columns store epoch milliseconds throughout this
//! schema (the design note's "pick one canonical unit per table": every table here
//! uses ms, so `age_days_min` cleanup predicates multiply days by 86_400_000).

pub const CREATE_TABLE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS email_index (
        id TEXT PRIMARY KEY,
        thread_id TEXT,
        subject TEXT NOT NULL DEFAULT '',
        sender TEXT NOT NULL DEFAULT '',
        recipients TEXT NOT NULL DEFAULT '[]',
        date INTEGER NOT NULL DEFAULT 0,
        year INTEGER NOT NULL DEFAULT 0,
        size INTEGER NOT NULL DEFAULT 0,
        has_attachments INTEGER NOT NULL DEFAULT 0,
        labels TEXT NOT NULL DEFAULT '[]',
        snippet TEXT NOT NULL DEFAULT '',
        archived INTEGER NOT NULL DEFAULT 0,
        archive_date INTEGER,
        archive_location TEXT,
        category TEXT CHECK (category IN ('high','medium','low') OR category IS NULL),
        user_id TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_email_index_user ON email_index(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_email_index_user_date ON email_index(user_id, date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_email_index_category ON email_index(user_id, category)",
    "CREATE INDEX IF NOT EXISTS idx_email_index_archived ON email_index(user_id, archived)",
    r#"
    CREATE TABLE IF NOT EXISTS job_statuses (
        job_id TEXT PRIMARY KEY,
        job_type TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('PENDING','IN_PROGRESS','COMPLETED','FAILED','CANCELLED')),
        request_params TEXT NOT NULL DEFAULT '{}',
        progress INTEGER NOT NULL DEFAULT 0,
        results TEXT,
        error_details TEXT,
        created_at INTEGER NOT NULL,
        started_at INTEGER,
        completed_at INTEGER,
        updated_at INTEGER NOT NULL,
        user_id TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_job_statuses_user ON job_statuses(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_job_statuses_status ON job_statuses(status)",
    r#"
    CREATE TABLE IF NOT EXISTS cleanup_jobs (
        job_id TEXT PRIMARY KEY REFERENCES job_statuses(job_id) ON DELETE CASCADE,
        policy_id TEXT,
        triggered_by TEXT NOT NULL,
        priority TEXT NOT NULL DEFAULT 'normal',
        batch_size INTEGER NOT NULL DEFAULT 50,
        target_emails INTEGER,
        emails_analyzed INTEGER NOT NULL DEFAULT 0,
        emails_cleaned INTEGER NOT NULL DEFAULT 0,
        storage_freed INTEGER NOT NULL DEFAULT 0,
        errors_encountered INTEGER NOT NULL DEFAULT 0,
        current_batch INTEGER NOT NULL DEFAULT 0,
        total_batches INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS archive_rules (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        criteria TEXT NOT NULL,
        action TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_archive_rules_user ON archive_rules(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS archive_records (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        email_id TEXT NOT NULL,
        method TEXT NOT NULL,
        location TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_archive_records_user ON archive_records(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS saved_searches (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        criteria TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_saved_searches_user ON saved_searches(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS file_metadata (
        id TEXT PRIMARY KEY,
        file_path TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        file_type TEXT NOT NULL CHECK (file_type IN ('email_export','archive_backup','search_result','attachment','log_file')),
        size_bytes INTEGER NOT NULL,
        mime_type TEXT,
        checksum_sha256 TEXT,
        encryption_status TEXT NOT NULL DEFAULT 'none' CHECK (encryption_status IN ('none','aes256','gpg')),
        compression_status TEXT NOT NULL DEFAULT 'none' CHECK (compression_status IN ('none','gzip','zip')),
        user_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        accessed_at INTEGER,
        expires_at INTEGER
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_file_metadata_user ON file_metadata(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_file_metadata_expires ON file_metadata(expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS file_access_permissions (
        file_id TEXT NOT NULL REFERENCES file_metadata(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        permission_type TEXT NOT NULL CHECK (permission_type IN ('read','write','delete','share')),
        granted_by TEXT NOT NULL,
        granted_at INTEGER NOT NULL,
        expires_at INTEGER,
        is_active INTEGER NOT NULL DEFAULT 1,
        PRIMARY KEY (file_id, user_id, permission_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        action TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        resource_id TEXT,
        details TEXT,
        success INTEGER NOT NULL,
        error_message TEXT,
        ip_address TEXT,
        user_agent TEXT,
        session_id TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS email_access_log (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        email_id TEXT NOT NULL,
        accessed_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_email_access_log_user_email ON email_access_log(user_id, email_id)",
    r#"
    CREATE TABLE IF NOT EXISTS search_activity (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        query TEXT NOT NULL,
        email_ids TEXT NOT NULL DEFAULT '[]',
        interacted_ids TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_search_activity_user ON search_activity(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS email_access_summary (
        user_id TEXT NOT NULL,
        email_id TEXT NOT NULL,
        access_count INTEGER NOT NULL DEFAULT 0,
        last_accessed_at INTEGER,
        access_score REAL NOT NULL DEFAULT 0.0,
        PRIMARY KEY (user_id, email_id)
    )
    "#,
];

/// Added by migration when an existing store predates analyzer columns.
/// "duplicate column name" failures are tolerated as idempotent by the caller.
pub const MIGRATION_ADD_ANALYZER_COLUMNS: &[&str] = &[
    "ALTER TABLE email_index ADD COLUMN importance_score INTEGER",
    "ALTER TABLE email_index ADD COLUMN importance_level TEXT",
    "ALTER TABLE email_index ADD COLUMN importance_matched_rules TEXT",
    "ALTER TABLE email_index ADD COLUMN importance_confidence REAL",
    "ALTER TABLE email_index ADD COLUMN age_category TEXT",
    "ALTER TABLE email_index ADD COLUMN size_category TEXT",
    "ALTER TABLE email_index ADD COLUMN recency_score REAL",
    "ALTER TABLE email_index ADD COLUMN size_penalty REAL",
    "ALTER TABLE email_index ADD COLUMN gmail_category TEXT",
    "ALTER TABLE email_index ADD COLUMN spam_score REAL",
    "ALTER TABLE email_index ADD COLUMN promotional_score REAL",
    "ALTER TABLE email_index ADD COLUMN social_score REAL",
    "ALTER TABLE email_index ADD COLUMN spam_indicators TEXT",
    "ALTER TABLE email_index ADD COLUMN promotional_indicators TEXT",
    "ALTER TABLE email_index ADD COLUMN social_indicators TEXT",
    "ALTER TABLE email_index ADD COLUMN analysis_timestamp INTEGER",
    "ALTER TABLE email_index ADD COLUMN analysis_version TEXT",
];

pub const MIGRATION_ANALYZER_INDICES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_email_index_importance ON email_index(user_id, importance_level)",
    "CREATE INDEX IF NOT EXISTS idx_email_index_gmail_category ON email_index(user_id, gmail_category)",
];
