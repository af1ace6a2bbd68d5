/// Crawl task lifecycle states
use std::fmt;

/// Represents the current state of a crawl task
///
/// A live task cycles `Fetching → Extracting → Writing → Waiting → Fetching`.
/// Failed fetches skip straight from `Fetching` to `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Pulling the next URL and waiting on the fetch client
    Fetching,

    /// Running the site's extraction capability over a fetched page
    Extracting,

    /// Handing a record to the output store
    Writing,

    /// Sleeping out the politeness delay
    Waiting,

    // ===== Terminal States =====
    /// Circuit breaker tripped or the frontier ran dry
    Exhausted,

    /// The task could not be constructed from its configuration
    Failed,
}

impl TaskState {
    /// Returns true if this task will never be scheduled again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Exhausted | Failed, _) => false,
            (_, Failed) => false,
            (_, Exhausted) => true,
            (Fetching, Extracting | Waiting) => true,
            (Extracting, Writing | Waiting) => true,
            (Writing, Waiting) => true,
            (Waiting, Fetching) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Writing => "writing",
            Self::Waiting => "waiting",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
