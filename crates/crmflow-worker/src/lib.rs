// Due-work worker
// Decision: Polls the store for due executions and drip enrollments instead of a queue
// Decision: The same poller runs in-process inside the API when no database is configured

pub mod config;
pub mod poller;

pub use config::{PollerConfig, WorkerConfig};
pub use poller::{DuePoller, PollStats};
