use super::aggregator::ProgressAggregator;
use super::hub::EventHub;
use super::monitor::{run_plot, JobMonitor};
use crate::domain::error::JobError;
use crate::domain::events::JobEvent;
use crate::domain::invocation::Invocation;
use crate::domain::jobs::{JobConfig, JobRecord, JobSnapshot, JobStatus};
use crate::domain::transcode::OutputTranscoder;
use crate::ports::notify::ProgressSink;
use crate::ports::process::ProcessLauncher;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where the external programs live and where results go.
#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    /// Interpreter the analysis and plotting scripts are run with
    pub interpreter: String,
    pub script: PathBuf,
    pub plotter: PathBuf,
    /// Final output directory shared by every job
    pub output_dir: PathBuf,
}

/// Caller's view of a submitted job.
#[derive(Clone, Debug)]
pub struct JobHandle {
    file: PathBuf,
    status: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Waits until the job leaves the running state.
    pub async fn wait(&mut self) -> JobStatus {
        loop {
            {
                let status = self.status.borrow_and_update();
                if !status.is_running() {
                    return status.clone();
                }
            }
            if self.status.changed().await.is_err() {
                return self.status.borrow().clone();
            }
        }
    }
}

/// Outcome of a plot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotRequest {
    Started,
    /// A plot was already requested for this job; nothing was done.
    AlreadyRequested,
}

struct JobEntry {
    record: JobRecord,
    status: watch::Receiver<JobStatus>,
    monitor: Option<JoinHandle<()>>,
}

impl JobEntry {
    fn is_running(&self) -> bool {
        self.status.borrow().is_running()
    }
}

/// Owns every job of the session: one external process and one monitor task per file.
pub struct JobOrchestrator<L> {
    launcher: L,
    settings: OrchestratorSettings,
    transcoder: Arc<OutputTranscoder>,
    aggregator: Arc<ProgressAggregator>,
    hub: Arc<EventHub>,
    jobs: Mutex<HashMap<PathBuf, JobEntry>>,
    plots: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl<L> JobOrchestrator<L>
where
    L: ProcessLauncher + 'static,
{
    pub fn new(
        launcher: L,
        settings: OrchestratorSettings,
        transcoder: OutputTranscoder,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            launcher,
            settings,
            transcoder: Arc::new(transcoder),
            aggregator: Arc::new(ProgressAggregator::new(sink)),
            hub: Arc::new(EventHub::new()),
            jobs: Mutex::new(HashMap::new()),
            plots: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<PathBuf, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn aggregator(&self) -> &Arc<ProgressAggregator> {
        &self.aggregator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.hub.subscribe()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Starts the analysis of `file`. Rejected without spawning anything if a
    /// job for the same path is still running. A process that cannot be
    /// started yields a handle whose job has already failed.
    pub fn submit(&self, file: &Path, config: JobConfig) -> Result<JobHandle, JobError> {
        if self.shutdown.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        if config.keypoints.is_empty() {
            return Err(JobError::MissingInput(String::from(
                "no keypoints selected, select one or more keypoints",
            )));
        }

        let mut jobs = self.jobs();
        if jobs.get(file).is_some_and(JobEntry::is_running) {
            return Err(JobError::DuplicateJob(file.to_path_buf()));
        }
        // Outputs are named after the stem, so two running jobs must not share one.
        let stem = file.file_stem();
        if let Some(other) = jobs
            .iter()
            .find(|(other, entry)| {
                other.as_path() != file && other.file_stem() == stem && entry.is_running()
            })
            .map(|(other, _)| other.clone())
        {
            return Err(JobError::OutputConflict {
                file: file.to_path_buf(),
                other,
            });
        }

        let scratch = tempfile::Builder::new().prefix("spudnig").tempdir()?;
        let format = config.format;
        let record = JobRecord::new(
            file.to_path_buf(),
            config,
            self.settings.output_dir.clone(),
            scratch,
        );
        let invocation =
            Invocation::analysis(&self.settings.interpreter, &self.settings.script, &record);
        self.aggregator.register(file);

        let child = match self.launcher.launch(&invocation) {
            Ok(child) => child,
            Err(e) => {
                let err = JobError::ProcessLaunch {
                    program: invocation.program.clone(),
                    reason: e.to_string(),
                };
                tracing::error!(file = %file.display(), "{}", err);
                self.aggregator.mark_failed(file);
                self.hub.publish(JobEvent::Failed {
                    file: file.to_path_buf(),
                    error: err.to_string(),
                });
                let (_, status) = watch::channel(JobStatus::failed(err));
                let handle = JobHandle {
                    file: file.to_path_buf(),
                    status: status.clone(),
                };
                jobs.insert(
                    file.to_path_buf(),
                    JobEntry {
                        record,
                        status,
                        monitor: None,
                    },
                );
                return Ok(handle);
            }
        };
        tracing::info!(file = %file.display(), command = %invocation, "analysis started");

        let (tx, status) = watch::channel(JobStatus::running());
        let monitor = JobMonitor {
            file: file.to_path_buf(),
            format,
            raw_table: record.raw_table_path(),
            status: tx,
            aggregator: self.aggregator.clone(),
            hub: self.hub.clone(),
            transcoder: self.transcoder.clone(),
        };
        let task = tokio::spawn(monitor.run(child, self.shutdown.child_token()));

        let handle = JobHandle {
            file: file.to_path_buf(),
            status: status.clone(),
        };
        jobs.insert(
            file.to_path_buf(),
            JobEntry {
                record,
                status,
                monitor: Some(task),
            },
        );
        Ok(handle)
    }

    /// Submits every file with the same configuration. Each file succeeds or
    /// fails on its own.
    pub fn submit_all(
        &self,
        files: &[PathBuf],
        config: &JobConfig,
    ) -> Result<Vec<(PathBuf, Result<JobHandle, JobError>)>, JobError> {
        if files.is_empty() {
            return Err(JobError::MissingInput(String::from(
                "no files added, add one or more input files",
            )));
        }
        Ok(files
            .iter()
            .map(|file| (file.clone(), self.submit(file, config.clone())))
            .collect())
    }

    pub fn handle(&self, file: &Path) -> Option<JobHandle> {
        self.jobs().get(file).map(|entry| JobHandle {
            file: file.to_path_buf(),
            status: entry.status.clone(),
        })
    }

    pub fn snapshot(&self, file: &Path) -> Option<JobSnapshot> {
        self.jobs()
            .get(file)
            .map(|entry| JobSnapshot::new(&entry.record, &entry.status.borrow()))
    }

    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = self
            .jobs()
            .values()
            .map(|entry| JobSnapshot::new(&entry.record, &entry.status.borrow()))
            .collect();
        snapshots.sort_by(|a, b| a.file.cmp(&b.file));
        snapshots
    }

    /// Launches the plotting program for a completed job. Only the first
    /// request per job does anything.
    pub fn request_plot(&self, file: &Path, plot_dir: &Path) -> Result<PlotRequest, JobError> {
        let mut jobs = self.jobs();
        let entry = jobs
            .get_mut(file)
            .ok_or_else(|| JobError::UnknownJob(file.to_path_buf()))?;

        if entry.record.plot().is_some() {
            tracing::info!(file = %file.display(), "plot already requested");
            return Ok(PlotRequest::AlreadyRequested);
        }
        if !entry.status.borrow().is_complete() {
            return Err(JobError::NotFinished(file.to_path_buf()));
        }

        let invocation = Invocation::plot(
            &self.settings.interpreter,
            &self.settings.plotter,
            plot_dir,
            entry.record.scratch_dir(),
        );
        let child = self
            .launcher
            .launch(&invocation)
            .map_err(|e| JobError::ProcessLaunch {
                program: invocation.program.clone(),
                reason: e.to_string(),
            })?;
        entry.record.mark_plot(plot_dir);
        tracing::info!(file = %file.display(), command = %invocation, "plot started");

        let task = tokio::spawn(run_plot(
            child,
            file.to_path_buf(),
            plot_dir.to_path_buf(),
            self.hub.clone(),
            self.shutdown.child_token(),
        ));
        self.plots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(PlotRequest::Started)
    }

    /// Discards every job that is no longer running, deleting its scratch
    /// directory. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs();
        let finished: Vec<PathBuf> = jobs
            .iter()
            .filter(|(_, entry)| !entry.is_running())
            .map(|(file, _)| file.clone())
            .collect();
        for file in &finished {
            jobs.remove(file);
            self.aggregator.unregister(file);
        }
        finished.len()
    }

    /// Terminates every process still running, waits for the monitors to
    /// settle, then drops all jobs and their scratch directories.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down, terminating running jobs");
        self.shutdown.cancel();

        let mut tasks: Vec<JoinHandle<()>> = self
            .jobs()
            .values_mut()
            .filter_map(|entry| entry.monitor.take())
            .collect();
        tasks.extend(
            self.plots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..),
        );

        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::warn!("monitor task ended abnormally: {}", e);
            }
        }

        let mut jobs = self.jobs();
        for file in jobs.keys() {
            self.aggregator.unregister(file);
        }
        jobs.clear();
    }
}
