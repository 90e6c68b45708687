//! Overall progress across every tracked job.

use crate::ports::notify::{CompletionBadge, ProgressSink, ProgressSnapshot};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Tracked {
    progress: HashMap<PathBuf, f64>,
    failed: HashSet<PathBuf>,
}

impl Tracked {
    fn average(&self) -> f64 {
        if self.progress.is_empty() {
            return 0.0;
        }
        self.progress.values().sum::<f64>() / self.progress.len() as f64
    }

    fn completed(&self) -> usize {
        self.progress.values().filter(|&&p| p >= 1.0).count()
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            average: self.average(),
            completed: CompletionBadge::from_count(self.completed()),
            has_failures: !self.failed.is_empty(),
        }
    }
}

/// Shared map from file to latest progress fraction. Safe to update from
/// many monitor tasks at once; every update refreshes the sink.
pub struct ProgressAggregator {
    tracked: Mutex<Tracked>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressAggregator {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            tracked: Mutex::new(Tracked::default()),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `path` at zero progress.
    pub fn register(&self, path: &Path) {
        let mut tracked = self.lock();
        tracked.progress.insert(path.to_path_buf(), 0.0);
        tracked.failed.remove(path);
    }

    /// Records the latest fraction for `path`. Unregistered paths are ignored.
    pub fn update(&self, path: &Path, fraction: f64) {
        let snapshot = {
            let mut tracked = self.lock();
            match tracked.progress.get_mut(path) {
                Some(value) => *value = fraction.clamp(0.0, 1.0),
                None => return,
            }
            tracked.snapshot()
        };
        self.sink.progress_changed(&snapshot);
    }

    /// Flags `path` as failed so displays can show an error state.
    pub fn mark_failed(&self, path: &Path) {
        let snapshot = {
            let mut tracked = self.lock();
            if !tracked.progress.contains_key(path) {
                return;
            }
            tracked.failed.insert(path.to_path_buf());
            tracked.snapshot()
        };
        self.sink.progress_changed(&snapshot);
    }

    pub fn unregister(&self, path: &Path) {
        let mut tracked = self.lock();
        tracked.progress.remove(path);
        tracked.failed.remove(path);
    }

    /// Mean over registered jobs, or 0 when none are registered.
    pub fn average_progress(&self) -> f64 {
        self.lock().average()
    }

    pub fn completed_count(&self) -> usize {
        self.lock().completed()
    }

    pub fn bucketed_completion_count(&self) -> CompletionBadge {
        CompletionBadge::from_count(self.completed_count())
    }

    pub fn has_failed_jobs(&self) -> bool {
        !self.lock().failed.is_empty()
    }

    pub fn progress_of(&self, path: &Path) -> Option<f64> {
        self.lock().progress.get(path).copied()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot()
    }

    /// Stops tracking jobs that reached 1.0. Returns how many were dropped.
    pub fn remove_finished(&self) -> usize {
        let mut tracked = self.lock();
        let before = tracked.progress.len();
        tracked.progress.retain(|_, p| *p < 1.0);
        before - tracked.progress.len()
    }
}
