//! In-memory registry of live job runs.
//!
//! Routes control commands (pause/resume/stop) to the right run via shared
//! atomic flags. Process-local and deliberately not a source of truth: on
//! restart entries are lost while the job store still holds the last
//! persisted state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use expoharvest_shared::JobId;

/// Cooperative control flags shared between a controller and command callers.
///
/// Flags are advisory and only honored at the loop's checkpoints, so Relaxed
/// ordering is sufficient.
#[derive(Debug, Default)]
pub struct ControlFlags {
    stop: AtomicBool,
    paused: AtomicBool,
}

impl ControlFlags {
    /// Request a cooperative stop; takes effect at the next checkpoint.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Request suspension before the next unit of work.
    pub fn request_pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    /// Clear a pause request. A no-op when the job is not paused.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

/// Map from job id to the control flags of its live run.
#[derive(Default)]
pub struct JobRegistry {
    entries: Mutex<HashMap<JobId, Arc<ControlFlags>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run and hand back its control flags.
    pub fn register(&self, job_id: JobId) -> Arc<ControlFlags> {
        let flags = Arc::new(ControlFlags::default());
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.insert(job_id, flags.clone());
        flags
    }

    /// Remove a finished run. Idempotent.
    pub fn remove(&self, job_id: &JobId) {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.remove(job_id);
    }

    /// Control flags for a live run, or `None` when the job already finished
    /// (or never ran in this process).
    pub fn flags(&self, job_id: &JobId) -> Option<Arc<ControlFlags>> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries.get(job_id).cloned()
    }

    /// Number of currently registered runs.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_lookup_remove() {
        let registry = JobRegistry::new();
        let job_id = JobId::new();

        let flags = registry.register(job_id);
        assert_eq!(registry.len(), 1);

        let looked_up = registry.flags(&job_id).expect("registered");
        looked_up.request_pause();
        // Same flags instance is shared
        assert!(flags.is_paused());

        registry.remove(&job_id);
        assert!(registry.flags(&job_id).is_none());
        assert!(registry.is_empty());

        // Removing again is harmless
        registry.remove(&job_id);
    }

    #[test]
    fn flags_transitions() {
        let flags = ControlFlags::default();
        assert!(!flags.is_paused());
        assert!(!flags.is_stopped());

        flags.request_pause();
        assert!(flags.is_paused());

        flags.resume();
        assert!(!flags.is_paused());

        // Resume without a pause is a no-op
        flags.resume();
        assert!(!flags.is_paused());

        flags.request_stop();
        assert!(flags.is_stopped());
    }

    #[tokio::test]
    async fn concurrent_registration_from_many_tasks() {
        let registry = Arc::new(JobRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = JobId::new();
                registry.register(id);
                registry.flags(&id).expect("present");
                registry.remove(&id);
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }
        assert!(registry.is_empty());
    }
}
