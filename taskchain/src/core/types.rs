//! Shared enumerations for results and runs.
//!
//! These types define the stable vocabulary used by results, runs, faults and
//! the serialization projections. Their lowercase serde names are part of the
//! public output format.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a result.
///
/// Transitions are one-directional:
/// `initialized -> executing -> {complete | interrupted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Initialized,
    Executing,
    Complete,
    Interrupted,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Initialized => "initialized",
            State::Executing => "executing",
            State::Complete => "complete",
            State::Interrupted => "interrupted",
        }
    }

    /// True once the result has left `executing`.
    pub fn is_executed(self) -> bool {
        matches!(self, State::Complete | State::Interrupted)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome classification of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Skipped,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Skipped => "skipped",
            Status::Failed => "failed",
        }
    }

    /// Aggregation rank: `failed > skipped > success`.
    fn rank(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::Skipped => 1,
            Status::Failed => 2,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: Status) -> Status {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived view over state and status.
///
/// While a result is still in flight the outcome reports its state. Once
/// executed it mirrors the status, except for failures adopted from another
/// result which report `interrupted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Initialized,
    Executing,
    Success,
    Skipped,
    Failed,
    Interrupted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Initialized => "initialized",
            Outcome::Executing => "executing",
            Outcome::Success => "success",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
            Outcome::Interrupted => "interrupted",
        }
    }
}

impl From<Status> for Outcome {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => Outcome::Success,
            Status::Skipped => Outcome::Skipped,
            Status::Failed => Outcome::Failed,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an invocation wraps a plain task or a batch of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Task,
    Batch,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Task => f.write_str("Task"),
            TaskKind::Batch => f.write_str("Batch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_status_prefers_failed_then_skipped() {
        assert_eq!(Status::Success.worst(Status::Skipped), Status::Skipped);
        assert_eq!(Status::Skipped.worst(Status::Failed), Status::Failed);
        assert_eq!(Status::Failed.worst(Status::Success), Status::Failed);
        assert_eq!(Status::Success.worst(Status::Success), Status::Success);
    }

    #[test]
    fn serde_names_are_lowercase() {
        let json = serde_json::to_string(&(State::Interrupted, Status::Skipped)).expect("json");
        assert_eq!(json, r#"["interrupted","skipped"]"#);
        let kind = serde_json::to_string(&TaskKind::Batch).expect("json");
        assert_eq!(kind, r#""Batch""#);
    }
}
