//! Core domain types for the exhibitor acquisition pipeline.
//!
//! The serialized shapes of [`JobRecord`] and [`ProgressEvent`] (camelCase
//! field names, lowercase status strings) are an external contract consumed
//! by existing observers — do not rename wire fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// A UUID v7 wrapper for crawl job identifiers (time-sortable).
    JobId
}

uuid_id! {
    /// Identifier for a trade show (the collection a crawl populates).
    TradeShowId
}

uuid_id! {
    /// Identifier for a reconciled exhibitor record.
    ExhibitorId
}

// ---------------------------------------------------------------------------
// Job status & log entries
// ---------------------------------------------------------------------------

/// Lifecycle state of a crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    /// Terminal states admit no further mutation by the controller.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Lowercase wire name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Severity of a structured job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// One entry in a job's append-only structured log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub message: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
}

/// One entry in a job's append-only error log (non-fatal per-record failures
/// and the final fatal error, if any).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobErrorEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// Durable state of one crawl run.
///
/// Mutated only by the owning job controller; observers read snapshots from
/// storage. Counters and `progress` are monotonically non-decreasing within
/// a run; transition timestamps are set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Completion percentage, clamped to 0–100.
    pub progress: u8,
    pub current_page: u32,
    /// Advisory; 0 when the source cannot estimate its size.
    pub total_pages: u32,
    pub records_extracted: u64,
    pub records_saved: u64,
    pub records_merged: u64,
    pub error_count: u64,
    pub errors: Vec<JobErrorEntry>,
    pub logs: Vec<JobLogEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    /// Tenant/owner scope the run belongs to.
    #[serde(rename = "scopeRef")]
    pub scope_id: String,
    pub created_by: String,
    /// The trade show this run populates; set once resolved.
    #[serde(rename = "targetShowRef")]
    pub trade_show_id: Option<TradeShowId>,
    pub show_name: String,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh record in `pending` state with zeroed counters.
    pub fn new(
        created_by: impl Into<String>,
        scope_id: impl Into<String>,
        show_name: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            status: JobStatus::Pending,
            progress: 0,
            current_page: 0,
            total_pages: 0,
            records_extracted: 0,
            records_saved: 0,
            records_merged: 0,
            error_count: 0,
            errors: Vec::new(),
            logs: Vec::new(),
            started_at: None,
            completed_at: None,
            paused_at: None,
            stopped_at: None,
            scope_id: scope_id.into(),
            created_by: created_by.into(),
            trade_show_id: None,
            show_name: show_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Append a structured log entry with the current timestamp.
    pub fn push_log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(JobLogEntry {
            message: message.into(),
            level,
            timestamp: Utc::now(),
        });
    }

    /// Append a per-record error and bump `error_count`.
    pub fn push_error(&mut self, message: impl Into<String>, page_number: Option<u32>) {
        self.errors.push(JobErrorEntry {
            message: message.into(),
            timestamp: Utc::now(),
            page_number,
        });
        self.error_count += 1;
    }

    /// Set progress, clamped to 0–100 and never decreasing within a run.
    pub fn set_progress(&mut self, pct: u8) {
        self.progress = pct.min(100).max(self.progress);
    }

    /// Copy with `logs` and `errors` elided, for history listings.
    pub fn summary(&self) -> Self {
        Self {
            errors: Vec::new(),
            logs: Vec::new(),
            ..self.clone()
        }
    }

    /// The progress-channel payload for the record's current state.
    pub fn progress_event(&self) -> ProgressEvent {
        ProgressEvent {
            job_id: self.job_id,
            progress: self.progress,
            status: self.status,
            current_page: self.current_page,
            total_pages: self.total_pages,
            records_extracted: self.records_extracted,
            records_saved: self.records_saved,
            records_merged: self.records_merged,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// Payload broadcast per unit of work on a job's progress topic.
///
/// Best-effort, at-most-once; durable state always comes from storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub progress: u8,
    pub status: JobStatus,
    pub current_page: u32,
    pub total_pages: u32,
    pub records_extracted: u64,
    pub records_saved: u64,
    pub records_merged: u64,
}

// ---------------------------------------------------------------------------
// TradeShow
// ---------------------------------------------------------------------------

/// A named scope exhibitors are grouped under, resolved once per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeShow {
    pub id: TradeShowId,
    #[serde(rename = "scopeRef")]
    pub scope_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl TradeShow {
    /// Create a minimal show record with metadata defaults.
    pub fn new(scope_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TradeShowId::new(),
            scope_id: scope_id.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Exhibitor
// ---------------------------------------------------------------------------

/// A contact person attached to an exhibitor. The lowercased email is the
/// dedup key; contacts without an email are never considered duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub title: String,
}

/// The reconciled business entity. At most one exhibitor exists per
/// `(trade show, scope, case-insensitive company name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exhibitor {
    pub id: ExhibitorId,
    #[serde(rename = "tradeShowRef")]
    pub trade_show_id: TradeShowId,
    #[serde(rename = "scopeRef")]
    pub scope_id: String,
    pub company_name: String,
    pub booth_no: String,
    pub website: String,
    pub company_email: String,
    pub location: String,
    pub contacts: Vec<Contact>,
    pub extracted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Raw extractor output
// ---------------------------------------------------------------------------

/// A raw contact as produced by a source, an unvalidated bag of strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawContact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// One candidate exhibitor record as yielded by an extractor source.
///
/// Everything is optional; the reconciler rejects records without a company
/// name and defaults the rest to empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExhibitor {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub booth_no: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub company_email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contacts: Vec<RawContact>,
}

/// Outcome of reconciling one raw record against stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new exhibitor was created.
    Created,
    /// An existing exhibitor gained data (fill-gap merge or new contacts).
    Merged,
    /// The record added nothing; no write was performed.
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_roundtrip() {
        let id = JobId::new();
        let s = id.to_string();
        let parsed: JobId = s.parse().expect("parse JobId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn job_record_wire_contract() {
        let mut record = JobRecord::new("user-1", "tenant-1", "Acme Expo");
        record.status = JobStatus::Running;
        record.push_error("bad record", Some(3));

        let json = serde_json::to_value(&record).expect("serialize");
        assert!(json.get("jobId").is_some());
        assert!(json.get("recordsExtracted").is_some());
        assert!(json.get("scopeRef").is_some());
        assert!(json.get("targetShowRef").is_some());
        assert_eq!(json["status"], "running");
        assert_eq!(json["errors"][0]["pageNumber"], 3);
    }

    #[test]
    fn progress_clamps_and_never_decreases() {
        let mut record = JobRecord::new("u", "s", "show");
        record.set_progress(150);
        assert_eq!(record.progress, 100);

        let mut record = JobRecord::new("u", "s", "show");
        record.set_progress(40);
        record.set_progress(25);
        assert_eq!(record.progress, 40);
        record.set_progress(55);
        assert_eq!(record.progress, 55);
    }

    #[test]
    fn error_entry_counts() {
        let mut record = JobRecord::new("u", "s", "show");
        record.push_error("first", None);
        record.push_error("second", Some(2));
        assert_eq!(record.error_count, 2);
        assert_eq!(record.errors.len(), 2);
        assert_eq!(record.errors[1].page_number, Some(2));
    }

    #[test]
    fn summary_elides_logs_and_errors() {
        let mut record = JobRecord::new("u", "s", "show");
        record.push_log(LogLevel::Info, "started");
        record.push_error("oops", None);

        let summary = record.summary();
        assert!(summary.logs.is_empty());
        assert!(summary.errors.is_empty());
        // Counters survive elision
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.job_id, record.job_id);
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Stopped.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn progress_event_matches_record() {
        let mut record = JobRecord::new("u", "s", "show");
        record.status = JobStatus::Running;
        record.current_page = 2;
        record.total_pages = 10;
        record.records_extracted = 20;
        record.set_progress(20);

        let event = record.progress_event();
        assert_eq!(event.job_id, record.job_id);
        assert_eq!(event.progress, 20);
        assert_eq!(event.current_page, 2);

        let json = serde_json::to_value(&event).expect("serialize");
        assert!(json.get("recordsMerged").is_some());
        assert!(json.get("totalPages").is_some());
    }
}
