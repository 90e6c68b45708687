//! Spudnig - batch movement detection over video files
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (jobs, progress parsing, result conversion)
//! - ports/: Trait definitions (process launching, progress display)
//! - adapters/: Concrete implementations (tokio processes, tracing, HTTP)
//! - application/: Job orchestration and progress aggregation
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use application::{JobHandle, JobOrchestrator, OrchestratorSettings, PlotRequest};
pub use config::AppConfig;
