//! Ports - Trait definitions for the collaborators the application drives.

pub mod notify;
pub mod process;
