//! Extractor sources for the exhibitor pipeline.
//!
//! This crate provides:
//! - [`Extractor`] — the source-agnostic batch interface the engine drives
//! - [`JsonApiExtractor`] — paginated JSON feed fetched over HTTP
//! - [`FixtureExtractor`] — scripted in-memory source for tests and demos
//! - [`build_extractor`] — config-driven source construction
//!
//! Site-specific markup scraping is out of scope here: every source yields
//! already-structured [`RawExhibitor`] records.

pub mod sources;

use async_trait::async_trait;
use expoharvest_shared::{ExpoHarvestError, ExtractorConfig, RawExhibitor, Result, SourceKind};

pub use sources::fixture::FixtureExtractor;
pub use sources::json_api::JsonApiExtractor;

/// One unit of extractor output.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Raw candidate records pulled from the source.
    pub records: Vec<RawExhibitor>,
    /// True when the source is exhausted; no further `next_batch` calls
    /// will yield records.
    pub done: bool,
}

/// A pluggable, source-specific supplier of raw exhibitor records.
///
/// The engine is polymorphic over this trait; each source only implements
/// batch pulling. Implementations own their position (page cursor, script
/// index) and are driven by exactly one job at a time.
#[async_trait]
pub trait Extractor: Send {
    /// Pull the next batch. `done = true` on the final (possibly empty) batch.
    async fn next_batch(&mut self) -> Result<Batch>;

    /// Advisory page count, when the source can estimate its size.
    /// May become known only after the first fetch.
    fn total_pages(&self) -> Option<u32>;

    /// Human-readable source name for tracing.
    fn name(&self) -> &str;
}

/// Construct the extractor a job's config asks for.
pub fn build_extractor(config: &ExtractorConfig) -> Result<Box<dyn Extractor>> {
    match config.source {
        SourceKind::JsonApi => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                ExpoHarvestError::validation("json-api source requires a base_url")
            })?;
            Ok(Box::new(JsonApiExtractor::new(
                base_url,
                config.page_size,
                config.rate_limit_ms,
            )?))
        }
        SourceKind::Fixture => Ok(Box::new(FixtureExtractor::demo())),
    }
}
