//! SQL migration definitions for the ExpoHarvest database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: trade_shows, crawl_jobs, exhibitors",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Trade shows: the collection context a crawl populates
CREATE TABLE IF NOT EXISTS trade_shows (
    id         TEXT PRIMARY KEY,
    scope_id   TEXT NOT NULL,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Lookup is case-insensitive exact name within a scope. Deliberately NOT a
-- unique index: two concurrent jobs creating the same show can race, and the
-- duplicate is surfaced rather than silently prevented. A production
-- deployment closing that gap would add UNIQUE(scope_id, LOWER(name)).
CREATE INDEX IF NOT EXISTS idx_trade_shows_scope_name
    ON trade_shows(scope_id, name COLLATE NOCASE);

-- One row per crawl run; the owning controller is the only writer
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id                TEXT PRIMARY KEY,
    status            TEXT NOT NULL,
    progress          INTEGER NOT NULL DEFAULT 0,
    current_page      INTEGER NOT NULL DEFAULT 0,
    total_pages       INTEGER NOT NULL DEFAULT 0,
    records_extracted INTEGER NOT NULL DEFAULT 0,
    records_saved     INTEGER NOT NULL DEFAULT 0,
    records_merged    INTEGER NOT NULL DEFAULT 0,
    error_count       INTEGER NOT NULL DEFAULT 0,
    errors_json       TEXT NOT NULL DEFAULT '[]',
    logs_json         TEXT NOT NULL DEFAULT '[]',
    started_at        TEXT,
    completed_at      TEXT,
    paused_at         TEXT,
    stopped_at        TEXT,
    scope_id          TEXT NOT NULL,
    created_by        TEXT NOT NULL,
    trade_show_id     TEXT REFERENCES trade_shows(id),
    show_name         TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_scope_created
    ON crawl_jobs(scope_id, created_at);

-- Reconciled exhibitor records
CREATE TABLE IF NOT EXISTS exhibitors (
    id            TEXT PRIMARY KEY,
    trade_show_id TEXT NOT NULL REFERENCES trade_shows(id),
    scope_id      TEXT NOT NULL,
    company_name  TEXT NOT NULL,
    booth_no      TEXT NOT NULL DEFAULT '',
    website       TEXT NOT NULL DEFAULT '',
    company_email TEXT NOT NULL DEFAULT '',
    location      TEXT NOT NULL DEFAULT '',
    contacts_json TEXT NOT NULL DEFAULT '[]',
    extracted_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_exhibitors_show_scope_name
    ON exhibitors(trade_show_id, scope_id, company_name COLLATE NOCASE);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
