//! Application layer - job lifecycle services built on the ports.

pub mod aggregator;
pub mod hub;
mod monitor;
pub mod orchestrator;

pub use aggregator::ProgressAggregator;
pub use hub::EventHub;
pub use orchestrator::{JobHandle, JobOrchestrator, OrchestratorSettings, PlotRequest};
