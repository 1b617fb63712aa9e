//! libSQL storage layer for ExpoHarvest.
//!
//! The [`Storage`] struct wraps a local libSQL database holding crawl job
//! records, trade shows, and reconciled exhibitors.
//!
//! **Access rules:**
//! - A job's `crawl_jobs` row is written by exactly one controller at a time
//!   (single writer per job); observers only read snapshots.
//! - Exhibitor find-then-write is *not* atomic across concurrent jobs — see
//!   the schema comment in `migrations.rs`.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use expoharvest_shared::{
    Contact, Exhibitor, ExhibitorId, ExpoHarvestError, JobErrorEntry, JobId, JobLogEntry,
    JobRecord, JobStatus, Result, TradeShow, TradeShowId,
};
use libsql::{Connection, Database, params};

/// Shorthand for wrapping database failures into the crate error type.
fn db_err(e: impl std::fmt::Display) -> ExpoHarvestError {
    ExpoHarvestError::Storage(e.to_string())
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ExpoHarvestError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ExpoHarvestError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Crawl job operations
    // -----------------------------------------------------------------------

    /// Insert a newly created job record (normally in `pending` state).
    pub async fn insert_job(&self, record: &JobRecord) -> Result<()> {
        let errors_json = serde_json::to_string(&record.errors).map_err(db_err)?;
        let logs_json = serde_json::to_string(&record.logs).map_err(db_err)?;

        self.conn
            .execute(
                "INSERT INTO crawl_jobs (id, status, progress, current_page, total_pages,
                    records_extracted, records_saved, records_merged, error_count,
                    errors_json, logs_json, started_at, completed_at, paused_at, stopped_at,
                    scope_id, created_by, trade_show_id, show_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                params![
                    record.job_id.to_string(),
                    record.status.as_str(),
                    record.progress as i64,
                    record.current_page as i64,
                    record.total_pages as i64,
                    record.records_extracted as i64,
                    record.records_saved as i64,
                    record.records_merged as i64,
                    record.error_count as i64,
                    errors_json.as_str(),
                    logs_json.as_str(),
                    record.started_at.map(|t| t.to_rfc3339()),
                    record.completed_at.map(|t| t.to_rfc3339()),
                    record.paused_at.map(|t| t.to_rfc3339()),
                    record.stopped_at.map(|t| t.to_rfc3339()),
                    record.scope_id.as_str(),
                    record.created_by.as_str(),
                    record.trade_show_id.map(|id| id.to_string()),
                    record.show_name.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Persist the full current state of a job record.
    pub async fn update_job(&self, record: &JobRecord) -> Result<()> {
        let errors_json = serde_json::to_string(&record.errors).map_err(db_err)?;
        let logs_json = serde_json::to_string(&record.logs).map_err(db_err)?;

        self.conn
            .execute(
                "UPDATE crawl_jobs SET
                    status = ?2, progress = ?3, current_page = ?4, total_pages = ?5,
                    records_extracted = ?6, records_saved = ?7, records_merged = ?8,
                    error_count = ?9, errors_json = ?10, logs_json = ?11,
                    started_at = ?12, completed_at = ?13, paused_at = ?14, stopped_at = ?15,
                    trade_show_id = ?16
                 WHERE id = ?1",
                params![
                    record.job_id.to_string(),
                    record.status.as_str(),
                    record.progress as i64,
                    record.current_page as i64,
                    record.total_pages as i64,
                    record.records_extracted as i64,
                    record.records_saved as i64,
                    record.records_merged as i64,
                    record.error_count as i64,
                    errors_json.as_str(),
                    logs_json.as_str(),
                    record.started_at.map(|t| t.to_rfc3339()),
                    record.completed_at.map(|t| t.to_rfc3339()),
                    record.paused_at.map(|t| t.to_rfc3339()),
                    record.stopped_at.map(|t| t.to_rfc3339()),
                    record.trade_show_id.map(|id| id.to_string()),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Fetch the durable snapshot of a job by id.
    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM crawl_jobs WHERE id = ?1"),
                params![job_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_job(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Most recent runs for a scope, newest first, logs/errors elided.
    pub async fn list_jobs_by_scope(&self, scope_id: &str, limit: u32) -> Result<Vec<JobRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM crawl_jobs
                     WHERE scope_id = ?1
                     ORDER BY created_at DESC
                     LIMIT ?2"
                ),
                params![scope_id, limit as i64],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_job(&row)?.summary());
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Trade show operations
    // -----------------------------------------------------------------------

    /// Find a show by case-insensitive exact name within a scope.
    pub async fn find_trade_show(&self, scope_id: &str, name: &str) -> Result<Option<TradeShow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, scope_id, name, created_at FROM trade_shows
                 WHERE scope_id = ?1 AND name = ?2 COLLATE NOCASE",
                params![scope_id, name],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_trade_show(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Insert a new trade show record.
    pub async fn insert_trade_show(&self, show: &TradeShow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO trade_shows (id, scope_id, name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    show.id.to_string(),
                    show.scope_id.as_str(),
                    show.name.as_str(),
                    show.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a trade show by id.
    pub async fn get_trade_show(&self, id: &TradeShowId) -> Result<Option<TradeShow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, scope_id, name, created_at FROM trade_shows WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_trade_show(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Exhibitor operations
    // -----------------------------------------------------------------------

    /// Find an exhibitor by case-insensitive exact company name within
    /// `(trade show, scope)`.
    pub async fn find_exhibitor(
        &self,
        trade_show_id: &TradeShowId,
        scope_id: &str,
        company_name: &str,
    ) -> Result<Option<Exhibitor>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXHIBITOR_COLUMNS} FROM exhibitors
                     WHERE trade_show_id = ?1 AND scope_id = ?2
                       AND company_name = ?3 COLLATE NOCASE"
                ),
                params![trade_show_id.to_string(), scope_id, company_name],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_exhibitor(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Insert a new exhibitor record.
    pub async fn insert_exhibitor(&self, exhibitor: &Exhibitor) -> Result<()> {
        let contacts_json = serde_json::to_string(&exhibitor.contacts).map_err(db_err)?;
        self.conn
            .execute(
                "INSERT INTO exhibitors (id, trade_show_id, scope_id, company_name,
                    booth_no, website, company_email, location, contacts_json, extracted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    exhibitor.id.to_string(),
                    exhibitor.trade_show_id.to_string(),
                    exhibitor.scope_id.as_str(),
                    exhibitor.company_name.as_str(),
                    exhibitor.booth_no.as_str(),
                    exhibitor.website.as_str(),
                    exhibitor.company_email.as_str(),
                    exhibitor.location.as_str(),
                    contacts_json.as_str(),
                    exhibitor.extracted_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Persist merged fields of an existing exhibitor.
    pub async fn update_exhibitor(&self, exhibitor: &Exhibitor) -> Result<()> {
        let contacts_json = serde_json::to_string(&exhibitor.contacts).map_err(db_err)?;
        self.conn
            .execute(
                "UPDATE exhibitors SET
                    booth_no = ?2, website = ?3, company_email = ?4,
                    location = ?5, contacts_json = ?6
                 WHERE id = ?1",
                params![
                    exhibitor.id.to_string(),
                    exhibitor.booth_no.as_str(),
                    exhibitor.website.as_str(),
                    exhibitor.company_email.as_str(),
                    exhibitor.location.as_str(),
                    contacts_json.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List all exhibitors for a show, ordered by company name.
    pub async fn list_exhibitors_by_show(
        &self,
        trade_show_id: &TradeShowId,
    ) -> Result<Vec<Exhibitor>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXHIBITOR_COLUMNS} FROM exhibitors
                     WHERE trade_show_id = ?1 ORDER BY company_name"
                ),
                params![trade_show_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_exhibitor(&row)?);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const JOB_COLUMNS: &str = "id, status, progress, current_page, total_pages, \
    records_extracted, records_saved, records_merged, error_count, \
    errors_json, logs_json, started_at, completed_at, paused_at, stopped_at, \
    scope_id, created_by, trade_show_id, show_name, created_at";

const EXHIBITOR_COLUMNS: &str = "id, trade_show_id, scope_id, company_name, \
    booth_no, website, company_email, location, contacts_json, extracted_at";

fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(db_err)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ExpoHarvestError::Storage(format!("invalid date: {e}")))
}

/// Read a nullable RFC 3339 column.
fn get_opt_ts(row: &libsql::Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    match row.get::<String>(idx) {
        Ok(s) => parse_ts(&s).map(Some),
        Err(_) => Ok(None),
    }
}

/// Convert a database row to a [`JobRecord`].
fn row_to_job(row: &libsql::Row) -> Result<JobRecord> {
    let status: JobStatus = get_string(row, 1)?
        .parse()
        .map_err(ExpoHarvestError::Storage)?;
    let errors: Vec<JobErrorEntry> =
        serde_json::from_str(&get_string(row, 9)?).map_err(db_err)?;
    let logs: Vec<JobLogEntry> = serde_json::from_str(&get_string(row, 10)?).map_err(db_err)?;
    let trade_show_id = match row.get::<String>(17) {
        Ok(s) => Some(s.parse::<TradeShowId>().map_err(db_err)?),
        Err(_) => None,
    };

    Ok(JobRecord {
        job_id: get_string(row, 0)?.parse().map_err(db_err)?,
        status,
        progress: row.get::<i64>(2).map_err(db_err)? as u8,
        current_page: row.get::<i64>(3).map_err(db_err)? as u32,
        total_pages: row.get::<i64>(4).map_err(db_err)? as u32,
        records_extracted: row.get::<i64>(5).map_err(db_err)? as u64,
        records_saved: row.get::<i64>(6).map_err(db_err)? as u64,
        records_merged: row.get::<i64>(7).map_err(db_err)? as u64,
        error_count: row.get::<i64>(8).map_err(db_err)? as u64,
        errors,
        logs,
        started_at: get_opt_ts(row, 11)?,
        completed_at: get_opt_ts(row, 12)?,
        paused_at: get_opt_ts(row, 13)?,
        stopped_at: get_opt_ts(row, 14)?,
        scope_id: get_string(row, 15)?,
        created_by: get_string(row, 16)?,
        trade_show_id,
        show_name: get_string(row, 18)?,
        created_at: parse_ts(&get_string(row, 19)?)?,
    })
}

/// Convert a database row to a [`TradeShow`].
fn row_to_trade_show(row: &libsql::Row) -> Result<TradeShow> {
    Ok(TradeShow {
        id: get_string(row, 0)?.parse().map_err(db_err)?,
        scope_id: get_string(row, 1)?,
        name: get_string(row, 2)?,
        created_at: parse_ts(&get_string(row, 3)?)?,
    })
}

/// Convert a database row to an [`Exhibitor`].
fn row_to_exhibitor(row: &libsql::Row) -> Result<Exhibitor> {
    let contacts: Vec<Contact> = serde_json::from_str(&get_string(row, 8)?).map_err(db_err)?;
    Ok(Exhibitor {
        id: get_string(row, 0)?.parse::<ExhibitorId>().map_err(db_err)?,
        trade_show_id: get_string(row, 1)?.parse().map_err(db_err)?,
        scope_id: get_string(row, 2)?,
        company_name: get_string(row, 3)?,
        booth_no: get_string(row, 4)?,
        website: get_string(row, 5)?,
        company_email: get_string(row, 6)?,
        location: get_string(row, 7)?,
        contacts,
        extracted_at: parse_ts(&get_string(row, 9)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use expoharvest_shared::{LogLevel, RawExhibitor};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("eh_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_exhibitor(show: &TradeShow, name: &str) -> Exhibitor {
        Exhibitor {
            id: ExhibitorId::new(),
            trade_show_id: show.id,
            scope_id: show.scope_id.clone(),
            company_name: name.into(),
            booth_no: "A-12".into(),
            website: String::new(),
            company_email: String::new(),
            location: String::new(),
            contacts: vec![Contact {
                name: "Jo Doe".into(),
                email: "jo@example.com".into(),
                ..Contact::default()
            }],
            extracted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("eh_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn job_insert_update_get() {
        let storage = test_storage().await;
        let mut record = JobRecord::new("user-1", "tenant-1", "Acme Expo 2026");

        storage.insert_job(&record).await.expect("insert job");

        let found = storage
            .get_job(&record.job_id)
            .await
            .expect("get job")
            .expect("job exists");
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.show_name, "Acme Expo 2026");
        assert_eq!(found.records_extracted, 0);
        assert!(found.started_at.is_none());

        record.status = JobStatus::Running;
        record.started_at = Some(Utc::now());
        record.records_extracted = 12;
        record.records_saved = 10;
        record.set_progress(40);
        record.push_log(LogLevel::Info, "crawl started");
        record.push_error("bad record on page 2", Some(2));
        storage.update_job(&record).await.expect("update job");

        let found = storage.get_job(&record.job_id).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Running);
        assert_eq!(found.progress, 40);
        assert_eq!(found.records_extracted, 12);
        assert_eq!(found.error_count, 1);
        assert_eq!(found.errors[0].page_number, Some(2));
        assert_eq!(found.logs.len(), 1);
        assert!(found.started_at.is_some());
        assert!(found.completed_at.is_none());
    }

    #[tokio::test]
    async fn missing_job_is_none() {
        let storage = test_storage().await;
        let found = storage.get_job(&JobId::new()).await.expect("get job");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn history_orders_and_elides() {
        let storage = test_storage().await;

        for i in 0..3 {
            let mut record = JobRecord::new("user-1", "tenant-1", format!("Show {i}"));
            // Stagger created_at so ordering is deterministic
            record.created_at = Utc::now() + chrono::Duration::seconds(i);
            record.push_log(LogLevel::Info, "noise");
            storage.insert_job(&record).await.unwrap();
        }
        let other = JobRecord::new("user-2", "tenant-2", "Other Show");
        storage.insert_job(&other).await.unwrap();

        let history = storage
            .list_jobs_by_scope("tenant-1", 2)
            .await
            .expect("history");
        assert_eq!(history.len(), 2);
        // Newest first
        assert_eq!(history[0].show_name, "Show 2");
        assert_eq!(history[1].show_name, "Show 1");
        // Logs elided in summaries
        assert!(history[0].logs.is_empty());
    }

    #[tokio::test]
    async fn trade_show_case_insensitive_lookup() {
        let storage = test_storage().await;
        let show = TradeShow::new("tenant-1", "Global Tech Expo");
        storage.insert_trade_show(&show).await.expect("insert show");

        let found = storage
            .find_trade_show("tenant-1", "global tech expo")
            .await
            .expect("find show");
        assert_eq!(found.map(|s| s.id), Some(show.id));

        // Wrong scope misses
        let found = storage
            .find_trade_show("tenant-2", "Global Tech Expo")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn exhibitor_crud_and_case_insensitive_lookup() {
        let storage = test_storage().await;
        let show = TradeShow::new("tenant-1", "Expo");
        storage.insert_trade_show(&show).await.unwrap();

        let exhibitor = sample_exhibitor(&show, "Acme Inc");
        storage
            .insert_exhibitor(&exhibitor)
            .await
            .expect("insert exhibitor");

        let found = storage
            .find_exhibitor(&show.id, "tenant-1", "ACME INC")
            .await
            .expect("find exhibitor")
            .expect("exhibitor exists");
        assert_eq!(found.id, exhibitor.id);
        assert_eq!(found.booth_no, "A-12");
        assert_eq!(found.contacts.len(), 1);
        assert_eq!(found.contacts[0].email, "jo@example.com");

        let mut updated = found;
        updated.website = "https://acme.example.com".into();
        updated.contacts.push(Contact {
            email: "sales@acme.example.com".into(),
            ..Contact::default()
        });
        storage.update_exhibitor(&updated).await.expect("update");

        let found = storage
            .find_exhibitor(&show.id, "tenant-1", "Acme Inc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.website, "https://acme.example.com");
        assert_eq!(found.contacts.len(), 2);

        let all = storage
            .list_exhibitors_by_show(&show.id)
            .await
            .expect("list");
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn raw_exhibitor_json_shape() {
        // The feed shape the JSON-API source consumes
        let raw: RawExhibitor = serde_json::from_str(
            r#"{"companyName": "Acme Inc", "boothNo": "B-7",
                "contacts": [{"email": "a@x.com"}]}"#,
        )
        .expect("parse raw exhibitor");
        assert_eq!(raw.company_name.as_deref(), Some("Acme Inc"));
        assert_eq!(raw.booth_no.as_deref(), Some("B-7"));
        assert!(raw.website.is_none());
        assert_eq!(raw.contacts.len(), 1);
    }
}
