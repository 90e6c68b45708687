//! Local adapters: child processes, tracing output and the HTTP API.

pub mod http;
pub mod notify;
pub mod process;

pub use notify::TracingProgressSink;
pub use process::TokioProcessLauncher;
