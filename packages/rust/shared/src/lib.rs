//! Shared types, error model, and configuration for ExpoHarvest.
//!
//! This crate is the foundation depended on by all other ExpoHarvest crates.
//! It provides:
//! - [`ExpoHarvestError`] — the unified error type
//! - Domain types ([`JobRecord`], [`Exhibitor`], [`TradeShow`], [`RawExhibitor`])
//! - Configuration ([`AppConfig`], [`ExtractorConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EngineConfig, ExtractorConfig, SourceConfig, SourceKind,
    config_dir, config_file_path, expand_path, init_config, load_config, load_config_from,
};
pub use error::{ExpoHarvestError, Result};
pub use types::{
    Contact, Exhibitor, ExhibitorId, JobErrorEntry, JobId, JobLogEntry, JobRecord, JobStatus,
    LogLevel, ProgressEvent, RawContact, RawExhibitor, ReconcileOutcome, TradeShow, TradeShowId,
};
