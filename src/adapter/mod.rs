// src/adapter/mod.rs
pub mod coordinator;

pub use crate::application::service::PipelineMonitor;
pub use coordinator::IngestionCoordinator;
