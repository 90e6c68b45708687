use crate::domain::invocation::Invocation;
use crate::ports::process::ProcessLauncher;
use std::io;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Spawns invocations as tokio child processes with both output streams piped.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for TokioProcessLauncher {
    fn launch(&self, invocation: &Invocation) -> io::Result<Child> {
        tracing::debug!(command = %invocation, "spawning process");
        Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}
