// src/application/service/mod.rs
// Application services: the queue, the consumers draining it, and views over both

pub mod event_queue;
pub mod monitor;
pub mod worker_pool;

pub use event_queue::{EventQueue, SubmitOutcome};
pub use monitor::{FeedStats, FeedStatus, PipelineMonitor};
pub use worker_pool::{ShutdownOutcome, WorkerPool, WorkerStats};
