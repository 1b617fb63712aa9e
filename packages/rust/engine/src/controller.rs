//! Job execution loop: drives one extractor to completion while honoring
//! cooperative stop and pause signals between units of work.
//!
//! Extractor errors are fatal and fail the job; per-record reconcile errors
//! are recorded and skipped. Durable state is re-persisted after every page
//! so a crash loses at most one page of counters.

use std::sync::Arc;

use chrono::Utc;
use expoharvest_extract::Extractor;
use expoharvest_shared::{EngineConfig, ExpoHarvestError, JobRecord, JobStatus, LogLevel, Result};
use expoharvest_storage::Storage;
use tracing::{info, warn};

use crate::progress::ProgressPublisher;
use crate::reconcile::reconcile;
use crate::registry::{ControlFlags, JobRegistry};
use crate::resolver::resolve_or_create;

/// Owns one job run from `pending` to a terminal state.
pub struct JobController {
    storage: Arc<Storage>,
    publisher: Arc<ProgressPublisher>,
    registry: Arc<JobRegistry>,
    flags: Arc<ControlFlags>,
    config: EngineConfig,
    record: JobRecord,
}

impl JobController {
    pub fn new(
        storage: Arc<Storage>,
        publisher: Arc<ProgressPublisher>,
        registry: Arc<JobRegistry>,
        flags: Arc<ControlFlags>,
        config: EngineConfig,
        record: JobRecord,
    ) -> Self {
        Self {
            storage,
            publisher,
            registry,
            flags,
            config,
            record,
        }
    }

    /// Run the job to a terminal state, then tear down its control-plane
    /// entries. The registry entry and progress topic exist only while the
    /// job is live.
    pub async fn run(mut self, mut extractor: Box<dyn Extractor>) {
        let job_id = self.record.job_id;
        if let Err(e) = self.run_loop(extractor.as_mut()).await {
            self.fail(e).await;
        }
        // Registry removal must precede topic close: subscribers gate on
        // registry liveness to decide whether joining the topic is safe.
        self.registry.remove(&job_id);
        self.publisher.close(&job_id);
    }

    async fn run_loop(&mut self, extractor: &mut dyn Extractor) -> Result<()> {
        self.record.status = JobStatus::Running;
        self.record.started_at = Some(Utc::now());
        self.record
            .push_log(LogLevel::Info, format!("extraction started ({})", extractor.name()));
        self.persist_and_publish().await?;

        let show = resolve_or_create(
            &self.storage,
            &self.record.scope_id,
            &self.record.show_name,
        )
        .await?;
        self.record.trade_show_id = Some(show.id);
        self.record
            .push_log(LogLevel::Info, format!("resolved trade show '{}'", show.name));
        self.persist_and_publish().await?;

        loop {
            if self.flags.is_stopped() {
                self.finish_stopped().await?;
                return Ok(());
            }

            if self.flags.is_paused() {
                self.wait_while_paused().await?;
                // A stop request may arrive during the pause
                if self.flags.is_stopped() {
                    self.finish_stopped().await?;
                    return Ok(());
                }
            }

            let batch = extractor.next_batch().await?;
            if let Some(total) = extractor.total_pages() {
                self.record.total_pages = total;
            }

            if !batch.records.is_empty() {
                self.record.current_page += 1;
                for raw in &batch.records {
                    self.record.records_extracted += 1;
                    match reconcile(&self.storage, raw, &show.id, &self.record.scope_id).await {
                        Ok(outcome) => {
                            use expoharvest_shared::ReconcileOutcome::*;
                            match outcome {
                                Created => self.record.records_saved += 1,
                                Merged => self.record.records_merged += 1,
                                Skipped => {}
                            }
                        }
                        Err(e) => {
                            warn!(job_id = %self.record.job_id, error = %e, "record rejected");
                            self.record
                                .push_error(e.to_string(), Some(self.record.current_page));
                        }
                    }
                }
                self.recompute_progress();
            }

            self.persist_and_publish().await?;

            if batch.done {
                self.finish_completed().await?;
                return Ok(());
            }
        }
    }

    /// Polled wait until the pause flag clears or a stop arrives. The paused
    /// status and `paused_at` are persisted once on entry; `paused_at` is
    /// kept from the first pause of the run.
    async fn wait_while_paused(&mut self) -> Result<()> {
        self.record.status = JobStatus::Paused;
        if self.record.paused_at.is_none() {
            self.record.paused_at = Some(Utc::now());
        }
        self.record.push_log(LogLevel::Info, "paused");
        info!(job_id = %self.record.job_id, "job paused");
        self.persist_and_publish().await?;

        while self.flags.is_paused() && !self.flags.is_stopped() {
            tokio::time::sleep(self.config.pause_poll).await;
        }

        if !self.flags.is_stopped() {
            self.record.status = JobStatus::Running;
            self.record.push_log(LogLevel::Info, "resumed");
            info!(job_id = %self.record.job_id, "job resumed");
            self.persist_and_publish().await?;
        }
        Ok(())
    }

    /// Progress is derived from page position when the source advertises a
    /// total; with an unknown total it stays put until completion.
    fn recompute_progress(&mut self) {
        if self.record.total_pages > 0 {
            let pct = (self.record.current_page as u64 * 100) / self.record.total_pages as u64;
            self.record.set_progress(pct.min(100) as u8);
        }
    }

    async fn finish_completed(&mut self) -> Result<()> {
        self.record.status = JobStatus::Completed;
        self.record.set_progress(100);
        self.record.completed_at = Some(Utc::now());
        self.record.push_log(
            LogLevel::Success,
            format!(
                "extraction complete: {} extracted, {} saved, {} merged, {} errors",
                self.record.records_extracted,
                self.record.records_saved,
                self.record.records_merged,
                self.record.error_count
            ),
        );
        info!(
            job_id = %self.record.job_id,
            extracted = self.record.records_extracted,
            saved = self.record.records_saved,
            merged = self.record.records_merged,
            errors = self.record.error_count,
            "job completed"
        );
        self.persist_and_publish().await
    }

    async fn finish_stopped(&mut self) -> Result<()> {
        self.record.status = JobStatus::Stopped;
        self.record.stopped_at = Some(Utc::now());
        self.record.push_log(
            LogLevel::Warning,
            format!(
                "stopped by request after {} records",
                self.record.records_extracted
            ),
        );
        info!(job_id = %self.record.job_id, "job stopped");
        self.persist_and_publish().await
    }

    /// Fatal failure: record the error, mark the job failed, persist
    /// best-effort. A storage outage here cannot be reported anywhere else.
    async fn fail(&mut self, error: ExpoHarvestError) {
        warn!(job_id = %self.record.job_id, error = %error, "job failed");
        self.record.status = JobStatus::Failed;
        self.record.completed_at = Some(Utc::now());
        self.record
            .push_error(error.to_string(), Some(self.record.current_page));
        self.record
            .push_log(LogLevel::Error, format!("extraction failed: {error}"));
        if let Err(e) = self.storage.update_job(&self.record).await {
            warn!(job_id = %self.record.job_id, error = %e, "failed to persist failure state");
        }
        self.publisher.publish(self.record.progress_event());
    }

    async fn persist_and_publish(&mut self) -> Result<()> {
        self.storage.update_job(&self.record).await?;
        self.publisher.publish(self.record.progress_event());
        Ok(())
    }
}
