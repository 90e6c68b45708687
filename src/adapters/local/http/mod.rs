//! HTTP inbound adapter.
//!
//! Exposes the orchestrator as a small JSON API so a front end can submit
//! files, poll per-job status and aggregate progress, request plots and
//! clear finished jobs.

mod error;
mod jobs;

pub use error::ApiError;
pub use jobs::{router, PlotBody, SubmitRequest, SubmitResult};
