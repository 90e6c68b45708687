use crate::domain::invocation::Invocation;
use std::io;
use tokio::process::Child;

/// Starts external programs with piped stdout and stderr.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, invocation: &Invocation) -> io::Result<Child>;
}
