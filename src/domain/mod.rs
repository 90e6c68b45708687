//! Domain layer - Pure business logic.

pub mod annotation;
pub mod error;
pub mod events;
pub mod invocation;
pub mod jobs;
pub mod progress;
pub mod records;
pub mod transcode;
pub mod xml;
