//! Per-job monitoring task: streams process output, then settles the job.

use super::aggregator::ProgressAggregator;
use super::hub::EventHub;
use crate::domain::error::JobError;
use crate::domain::events::JobEvent;
use crate::domain::jobs::{JobStatus, JobWarning, OutputFormat};
use crate::domain::progress::{parse_line, Signal};
use crate::domain::transcode::OutputTranscoder;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::watch;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::sync::CancellationToken;

pub(crate) struct JobMonitor {
    pub file: PathBuf,
    pub format: OutputFormat,
    pub raw_table: PathBuf,
    pub status: watch::Sender<JobStatus>,
    pub aggregator: Arc<ProgressAggregator>,
    pub hub: Arc<EventHub>,
    pub transcoder: Arc<OutputTranscoder>,
}

impl JobMonitor {
    /// Drives the job to a terminal state. There is no per-job timeout: a
    /// process that never exits keeps its job running until shutdown.
    pub async fn run(self, mut child: Child, cancel: CancellationToken) {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.drive(&mut child) => Some(result),
        };

        let result = match outcome {
            None => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(file = %self.file.display(), "failed to kill analysis process: {}", e);
                }
                Err(JobError::Cancelled)
            }
            Some(Err(err)) => Err(err),
            Some(Ok(())) => self.produce_output().await,
        };

        self.settle(result);
    }

    async fn drive(&self, child: &mut Child) -> Result<(), JobError> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let ((), errors) = tokio::join!(self.read_stdout(stdout), collect_lines(stderr));
        let exit = child.wait().await?;

        if !errors.trim().is_empty() {
            return Err(JobError::ScriptRuntime(errors.trim().to_string()));
        }
        if !exit.success() {
            tracing::warn!(file = %self.file.display(), %exit, "analysis exited unsuccessfully without error output");
        }
        Ok(())
    }

    /// Reads stdout to the end. Undecodable bytes never stop the reader, so
    /// the script is not cut off mid-run by a closed pipe.
    async fn read_stdout<R: AsyncRead + Unpin>(&self, stdout: Option<R>) {
        let Some(stdout) = stdout else { return };
        let mut lines = lossy_lines(stdout);
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => self.on_line(&line),
                Err(e) => {
                    tracing::warn!(file = %self.file.display(), "stopped reading stdout: {}", e);
                    break;
                }
            }
        }
    }

    fn on_line(&self, line: &str) {
        match parse_line(line, true) {
            Signal::Progress(fraction) => {
                self.status.send_if_modified(|s| s.record_progress(fraction));
                self.aggregator.update(&self.file, fraction);
                self.hub.publish(JobEvent::Progress {
                    file: self.file.clone(),
                    fraction,
                });
            }
            Signal::NoDetections => {
                if self.status.send_if_modified(|s| s.warn(JobWarning::NoDetections)) {
                    tracing::warn!(file = %self.file.display(), "no movement detected for the selected keypoints");
                    self.hub.publish(JobEvent::Warning {
                        file: self.file.clone(),
                        warning: JobWarning::NoDetections,
                    });
                }
            }
            Signal::Nothing => tracing::debug!(file = %self.file.display(), "{}", line),
        }
    }

    fn warned_no_detections(&self) -> bool {
        self.status
            .borrow()
            .warnings
            .contains(&JobWarning::NoDetections)
    }

    async fn produce_output(&self) -> Result<PathBuf, JobError> {
        // With nothing detected the analysis may skip writing the table.
        if self.warned_no_detections() && !tokio::fs::try_exists(&self.raw_table).await? {
            tokio::fs::write(&self.raw_table, "").await?;
        }
        let output = self
            .transcoder
            .transcode(&self.raw_table, self.format, &self.file)
            .await?;
        Ok(output)
    }

    /// The job status is published last, so anyone woken by it already sees
    /// the aggregate and the event stream in their final state.
    fn settle(&self, result: Result<PathBuf, JobError>) {
        match result {
            Ok(output) => {
                self.aggregator.update(&self.file, 1.0);
                tracing::info!(file = %self.file.display(), output = %output.display(), "job completed");
                self.hub.publish(JobEvent::Completed {
                    file: self.file.clone(),
                    output: output.clone(),
                });
                self.status.send_if_modified(|s| s.complete(output));
            }
            Err(err) => {
                self.aggregator.mark_failed(&self.file);
                tracing::error!(file = %self.file.display(), "job failed: {}", err);
                self.hub.publish(JobEvent::Failed {
                    file: self.file.clone(),
                    error: err.to_string(),
                });
                self.status.send_if_modified(|s| s.fail(err));
            }
        }
    }
}

impl Drop for JobMonitor {
    /// A monitor that goes away without settling (a panic, or its runtime
    /// shutting down) still leaves the job in a terminal state.
    fn drop(&mut self) {
        let running = self.status.borrow().is_running();
        if running {
            self.settle(Err(JobError::Aborted));
        }
    }
}

/// Splits a byte stream on `\n` and decodes every line lossily.
fn lossy_lines<R: AsyncRead + Unpin>(
    stream: R,
) -> impl Stream<Item = Result<String, AnyDelimiterCodecError>> + Unpin {
    FramedRead::new(stream, AnyDelimiterCodec::new(b"\n".to_vec(), Vec::new())).map(|chunk| {
        chunk.map(|bytes| {
            String::from_utf8_lossy(&bytes)
                .trim_end_matches('\r')
                .to_string()
        })
    })
}

/// Reads a stream to the end, one line at a time. A read failure is kept as
/// a line of its own so the collected text is never silently empty.
pub(crate) async fn collect_lines<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut collected = String::new();
    let Some(stream) = stream else {
        return collected;
    };
    let mut lines = lossy_lines(stream);
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => collected.push_str(&line),
            Err(e) => {
                collected.push_str(&format!("failed to read output: {}", e));
                collected.push('\n');
                break;
            }
        }
        collected.push('\n');
    }
    collected
}

/// Runs the plotting process for a finished job and reports the outcome.
pub(crate) async fn run_plot(
    mut child: Child,
    file: PathBuf,
    dir: PathBuf,
    hub: Arc<EventHub>,
    cancel: CancellationToken,
) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let finished = async {
        let (output, errors) = tokio::join!(collect_lines(stdout), collect_lines(stderr));
        for line in output.lines() {
            // Plot output is never attributed to a job's progress.
            if parse_line(line, false) == Signal::Nothing {
                tracing::debug!(file = %file.display(), "plotter: {}", line);
            }
        }
        let exit = child.wait().await;
        (errors, exit)
    };

    let outcome = tokio::select! {
        _ = cancel.cancelled() => None,
        result = finished => Some(result),
    };

    let event = match outcome {
        None => {
            if let Err(e) = child.kill().await {
                tracing::warn!(file = %file.display(), "failed to kill plot process: {}", e);
            }
            JobEvent::PlotFailed {
                file,
                error: JobError::Cancelled.to_string(),
            }
        }
        Some((_, Err(e))) => JobEvent::PlotFailed {
            file,
            error: e.to_string(),
        },
        Some((errors, Ok(_))) if !errors.trim().is_empty() => {
            tracing::error!(file = %file.display(), "plot generation failed: {}", errors.trim());
            JobEvent::PlotFailed {
                file,
                error: errors.trim().to_string(),
            }
        }
        Some((_, Ok(_))) => {
            tracing::info!(file = %file.display(), dir = %dir.display(), "plot generated");
            JobEvent::PlotFinished { file, dir }
        }
    };
    hub.publish(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::xml::Document;
    use crate::ports::notify::MockProgressSink;
    use std::path::Path;
    use std::process::Stdio;
    use std::time::Duration;
    use tokio::process::Command;

    fn spawn(script: &str) -> Child {
        Command::new("sh")
            .args(["-c", script])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn test_collect_lines() {
        assert_eq!(collect_lines(None::<&[u8]>).await, "");
        let text: &[u8] = b"first\r\nsecond";
        assert_eq!(collect_lines(Some(text)).await, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_collect_lines_keeps_undecodable_bytes() {
        let text: &[u8] = b"Ung\xfcltige Datei\nnext\n";
        assert_eq!(
            collect_lines(Some(text)).await,
            "Ung\u{FFFD}ltige Datei\nnext\n"
        );
    }

    #[tokio::test]
    async fn test_dropped_monitor_fails_job() {
        let mut sink = MockProgressSink::new();
        sink.expect_progress_changed().return_const(());
        let aggregator = Arc::new(ProgressAggregator::new(Arc::new(sink)));
        aggregator.register(Path::new("clip.mp4"));
        let hub = Arc::new(EventHub::new());
        let mut events = hub.subscribe();
        let template =
            Document::parse(include_str!("../../templates/BlankTemplate.eaf")).unwrap();
        let (tx, rx) = watch::channel(JobStatus::running());

        let monitor = JobMonitor {
            file: PathBuf::from("clip.mp4"),
            format: OutputFormat::Table,
            raw_table: PathBuf::from("clip.csv"),
            status: tx,
            aggregator: aggregator.clone(),
            hub,
            transcoder: Arc::new(OutputTranscoder::new(template, "Me")),
        };
        drop(monitor);

        assert_eq!(rx.borrow().error(), Some(&JobError::Aborted));
        assert!(aggregator.has_failed_jobs());
        assert!(matches!(
            events.recv().await.unwrap(),
            JobEvent::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_plot_error_output_fails() {
        let hub = Arc::new(EventHub::new());
        let mut events = hub.subscribe();
        let child = spawn("echo 'cannot open scratch dir' >&2");

        run_plot(
            child,
            PathBuf::from("clip.mp4"),
            PathBuf::from("plots"),
            hub,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(
            events.recv().await.unwrap(),
            JobEvent::PlotFailed {
                file: PathBuf::from("clip.mp4"),
                error: String::from("cannot open scratch dir"),
            }
        );
    }

    #[tokio::test]
    async fn test_plot_cancelled() {
        let hub = Arc::new(EventHub::new());
        let mut events = hub.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_plot(
            spawn("exec sleep 30"),
            PathBuf::from("clip.mp4"),
            PathBuf::from("plots"),
            hub,
            cancel.clone(),
        ));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            JobEvent::PlotFailed { .. }
        ));
    }
}
