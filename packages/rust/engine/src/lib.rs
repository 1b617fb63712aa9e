//! Job orchestration engine.
//!
//! [`JobManager`] is the entry point: it accepts extraction jobs, spawns a
//! [`controller::JobController`] task per job, and exposes control (stop,
//! pause, resume) and observation (status, history, progress subscription)
//! over them. Durable job state lives in storage; the registry and the
//! progress channel are in-process conveniences that are rebuilt empty on
//! restart.

pub mod controller;
pub mod manager;
pub mod progress;
pub mod reconcile;
pub mod registry;
pub mod resolver;

pub use manager::JobManager;
pub use progress::ProgressPublisher;
pub use reconcile::reconcile;
pub use registry::{ControlFlags, JobRegistry};
pub use resolver::resolve_or_create;
