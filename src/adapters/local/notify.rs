use crate::ports::notify::{ProgressSink, ProgressSnapshot};
use std::sync::atomic::{AtomicU32, Ordering};

/// Reports aggregate progress through tracing, once per whole percent.
#[derive(Debug)]
pub struct TracingProgressSink {
    last_percent: AtomicU32,
}

impl TracingProgressSink {
    pub fn new() -> Self {
        Self {
            last_percent: AtomicU32::new(u32::MAX),
        }
    }

    /// Returns true when `snapshot` moved to a different whole percent.
    fn advance(&self, snapshot: &ProgressSnapshot) -> bool {
        let percent = (snapshot.average * 100.0).floor() as u32;
        self.last_percent.swap(percent, Ordering::Relaxed) != percent
    }
}

impl Default for TracingProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TracingProgressSink {
    fn progress_changed(&self, snapshot: &ProgressSnapshot) {
        if !self.advance(snapshot) {
            return;
        }
        if snapshot.has_failures {
            tracing::warn!(
                average = snapshot.average,
                completed = %snapshot.completed.label(),
                "progress (some jobs failed)"
            );
        } else {
            tracing::info!(
                average = snapshot.average,
                completed = %snapshot.completed.label(),
                "progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::notify::CompletionBadge;

    fn snapshot(average: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            average,
            completed: CompletionBadge::from_count(0),
            has_failures: false,
        }
    }

    #[test]
    fn test_reports_once_per_percent() {
        let sink = TracingProgressSink::new();
        assert!(sink.advance(&snapshot(0.0)));
        assert!(!sink.advance(&snapshot(0.004)));
        assert!(sink.advance(&snapshot(0.011)));
        assert!(!sink.advance(&snapshot(0.019)));
        assert!(sink.advance(&snapshot(1.0)));
    }
}
