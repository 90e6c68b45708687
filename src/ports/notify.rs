use serde::Serialize;

/// Coarse completion count for badge-style displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionBadge {
    Count(usize),
    /// More than [`CompletionBadge::LIMIT`] jobs finished
    Overflow,
}

impl CompletionBadge {
    pub const LIMIT: usize = 9;

    pub fn from_count(count: usize) -> Self {
        if count > Self::LIMIT {
            CompletionBadge::Overflow
        } else {
            CompletionBadge::Count(count)
        }
    }

    pub fn label(&self) -> String {
        match self {
            CompletionBadge::Count(n) => n.to_string(),
            CompletionBadge::Overflow => format!("{}+", Self::LIMIT),
        }
    }
}

impl Serialize for CompletionBadge {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

/// Aggregate progress over all tracked jobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub average: f64,
    pub completed: CompletionBadge,
    pub has_failures: bool,
}

/// Display hook refreshed after every progress change.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressSink: Send + Sync {
    fn progress_changed(&self, snapshot: &ProgressSnapshot);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_caps_above_nine() {
        assert_eq!(CompletionBadge::from_count(0).label(), "0");
        assert_eq!(CompletionBadge::from_count(9).label(), "9");
        assert_eq!(CompletionBadge::from_count(10), CompletionBadge::Overflow);
        assert_eq!(CompletionBadge::from_count(42).label(), "9+");
    }
}
