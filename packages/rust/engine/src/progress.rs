//! Best-effort progress publish/subscribe, topic-scoped per job.
//!
//! Each job id maps to its own broadcast channel. Delivery is at-most-once
//! with no backlog: a subscriber that joins after an event was published
//! never sees it. Durable state must always be recovered from storage;
//! this channel only exists to cut polling latency for live observers.

use std::collections::HashMap;
use std::sync::Mutex;

use expoharvest_shared::{JobId, ProgressEvent};
use tokio::sync::broadcast;

/// Buffered events per topic before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Per-job broadcast channels for incremental progress.
#[derive(Default)]
pub struct ProgressPublisher {
    topics: Mutex<HashMap<JobId, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a job's progress topic, creating it if needed so that
    /// observers can join before the first event is published.
    pub fn subscribe(&self, job_id: &JobId) -> broadcast::Receiver<ProgressEvent> {
        let mut topics = self.topics.lock().expect("progress topics lock poisoned");
        topics
            .entry(*job_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Broadcast an event to current subscribers of the event's job topic.
    /// Best-effort: having no subscribers is not an error.
    pub fn publish(&self, event: ProgressEvent) {
        let topics = self.topics.lock().expect("progress topics lock poisoned");
        if let Some(tx) = topics.get(&event.job_id) {
            let _ = tx.send(event);
        }
    }

    /// Drop a job's topic once the run reaches a terminal state. Live
    /// receivers observe the channel closing after draining buffered events.
    pub fn close(&self, job_id: &JobId) {
        let mut topics = self.topics.lock().expect("progress topics lock poisoned");
        topics.remove(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expoharvest_shared::{JobRecord, JobStatus};

    fn event(record: &JobRecord, progress: u8) -> ProgressEvent {
        let mut record = record.clone();
        record.status = JobStatus::Running;
        record.set_progress(progress);
        record.progress_event()
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let publisher = ProgressPublisher::new();
        let record = JobRecord::new("u", "s", "show");

        let mut rx = publisher.subscribe(&record.job_id);
        publisher.publish(event(&record, 10));
        publisher.publish(event(&record, 20));

        assert_eq!(rx.recv().await.expect("first").progress, 10);
        assert_eq!(rx.recv().await.expect("second").progress, 20);
    }

    #[tokio::test]
    async fn no_replay_for_late_subscribers() {
        let publisher = ProgressPublisher::new();
        let record = JobRecord::new("u", "s", "show");

        // Event published while another observer holds the topic open
        let _early = publisher.subscribe(&record.job_id);
        publisher.publish(event(&record, 50));

        let mut late = publisher.subscribe(&record.job_id);
        publisher.publish(event(&record, 60));

        // The late subscriber only sees events after it joined
        assert_eq!(late.recv().await.expect("event").progress, 60);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let publisher = ProgressPublisher::new();
        let record = JobRecord::new("u", "s", "show");
        // Topic never created; should not panic or error
        publisher.publish(event(&record, 10));
    }

    #[tokio::test]
    async fn topics_are_isolated_per_job() {
        let publisher = ProgressPublisher::new();
        let a = JobRecord::new("u", "s", "show-a");
        let b = JobRecord::new("u", "s", "show-b");

        let mut rx_a = publisher.subscribe(&a.job_id);
        let mut rx_b = publisher.subscribe(&b.job_id);

        publisher.publish(event(&a, 30));

        assert_eq!(rx_a.recv().await.expect("a event").job_id, a.job_id);
        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn close_ends_live_receivers() {
        let publisher = ProgressPublisher::new();
        let record = JobRecord::new("u", "s", "show");

        let mut rx = publisher.subscribe(&record.job_id);
        publisher.publish(event(&record, 100));
        publisher.close(&record.job_id);

        // Buffered event drains, then the channel reports closed
        assert_eq!(rx.recv().await.expect("buffered").progress, 100);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
