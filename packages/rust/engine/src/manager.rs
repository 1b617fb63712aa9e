//! Public engine facade: start jobs, steer them, observe them.
//!
//! `start` validates inputs and persists the pending record before spawning
//! the run task, so a job id returned to the caller always resolves in
//! storage. Control commands go through the live registry; status reads go
//! through storage, which is the source of truth.

use std::sync::Arc;

use expoharvest_extract::{Extractor, build_extractor};
use expoharvest_shared::{
    EngineConfig, ExpoHarvestError, ExtractorConfig, JobId, JobRecord, ProgressEvent, Result,
};
use expoharvest_storage::Storage;
use tokio::sync::broadcast;
use tracing::info;

use crate::controller::JobController;
use crate::progress::ProgressPublisher;
use crate::registry::JobRegistry;

#[derive(Clone)]
pub struct JobManager {
    storage: Arc<Storage>,
    registry: Arc<JobRegistry>,
    publisher: Arc<ProgressPublisher>,
    config: EngineConfig,
}

impl JobManager {
    pub fn new(storage: Arc<Storage>, config: EngineConfig) -> Self {
        Self {
            storage,
            registry: Arc::new(JobRegistry::new()),
            publisher: Arc::new(ProgressPublisher::new()),
            config,
        }
    }

    /// Start an extraction job against the configured source. Returns as
    /// soon as the pending record is durable and the run task is spawned.
    pub async fn start(
        &self,
        created_by: &str,
        scope_id: &str,
        show_name: &str,
        extractor_config: &ExtractorConfig,
    ) -> Result<JobId> {
        let extractor = build_extractor(extractor_config)?;
        self.start_with_extractor(created_by, scope_id, show_name, extractor)
            .await
    }

    /// Start a job with a caller-supplied extractor.
    pub async fn start_with_extractor(
        &self,
        created_by: &str,
        scope_id: &str,
        show_name: &str,
        extractor: Box<dyn Extractor>,
    ) -> Result<JobId> {
        if created_by.trim().is_empty() {
            return Err(ExpoHarvestError::validation("creator must not be empty"));
        }
        if scope_id.trim().is_empty() {
            return Err(ExpoHarvestError::validation("scope id must not be empty"));
        }
        if show_name.trim().is_empty() {
            return Err(ExpoHarvestError::validation("show name must not be empty"));
        }

        let record = JobRecord::new(created_by.trim(), scope_id.trim(), show_name.trim());
        let job_id = record.job_id;
        self.storage.insert_job(&record).await?;

        let flags = self.registry.register(job_id);
        info!(%job_id, scope = scope_id, show = show_name, "job accepted");

        let controller = JobController::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.publisher),
            Arc::clone(&self.registry),
            flags,
            self.config.clone(),
            record,
        );
        tokio::spawn(controller.run(extractor));

        Ok(job_id)
    }

    /// Request a cooperative stop. Takes effect at the job's next checkpoint.
    pub fn stop(&self, job_id: &JobId) -> Result<()> {
        match self.registry.flags(job_id) {
            Some(flags) => {
                flags.request_stop();
                info!(%job_id, "stop requested");
                Ok(())
            }
            None => Err(ExpoHarvestError::not_running(job_id.to_string())),
        }
    }

    /// Request a pause. Takes effect at the job's next checkpoint.
    pub fn pause(&self, job_id: &JobId) -> Result<()> {
        match self.registry.flags(job_id) {
            Some(flags) => {
                flags.request_pause();
                info!(%job_id, "pause requested");
                Ok(())
            }
            None => Err(ExpoHarvestError::not_running(job_id.to_string())),
        }
    }

    /// Clear the pause flag. A no-op on a job that is not paused.
    pub fn resume(&self, job_id: &JobId) -> Result<()> {
        match self.registry.flags(job_id) {
            Some(flags) => {
                flags.resume();
                info!(%job_id, "resume requested");
                Ok(())
            }
            None => Err(ExpoHarvestError::not_running(job_id.to_string())),
        }
    }

    /// Durable state of a job, live or finished.
    pub async fn status(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        self.storage.get_job(job_id).await
    }

    /// Recent jobs for a scope, newest first, with logs and errors elided.
    pub async fn history(&self, scope_id: &str, limit: u32) -> Result<Vec<JobRecord>> {
        self.storage.list_jobs_by_scope(scope_id, limit).await
    }

    /// Subscribe to a job's progress topic. Only events published after the
    /// subscription are delivered; nothing is replayed.
    ///
    /// Subscribing to a finished (or unknown) job yields a channel that is
    /// already closed rather than resurrecting the job's topic. Teardown
    /// removes the registry entry before closing the topic, so a live entry
    /// here means the owning controller will still close any topic created
    /// by this call.
    pub fn subscribe(&self, job_id: &JobId) -> broadcast::Receiver<ProgressEvent> {
        if self.registry.flags(job_id).is_some() {
            self.publisher.subscribe(job_id)
        } else {
            let (tx, rx) = broadcast::channel(1);
            drop(tx);
            rx
        }
    }

    /// Number of jobs currently in the live registry.
    pub fn running_jobs(&self) -> usize {
        self.registry.len()
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }
}
