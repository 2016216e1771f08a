//! Ordered collection of results for one logical operation.
//!
//! Every invocation in a top-level call (including nested calls and batch
//! members) registers into the same [`Run`]. Registration assigns the next
//! 0-based index and stamps the run id under a single lock, so the ordering
//! stays correct even if children are ever invoked from several threads.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;
use uuid::Uuid;

use crate::core::result::{Record, ResultSnapshot, TaskResult};
use crate::core::types::{Outcome, State, Status};
use crate::error::UsageError;

#[derive(Debug)]
pub struct Run {
    id: Uuid,
    records: Mutex<Vec<Arc<Record>>>,
}

impl Run {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            records: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Append `result`, assigning its index and run id.
    ///
    /// Returns a handle that carries this run.
    pub fn register(self: &Arc<Self>, result: &TaskResult) -> Result<TaskResult, UsageError> {
        let mut records = self.records.lock();
        let index = records.len();
        result.record().register(index, self.id)?;
        records.push(Arc::clone(result.record()));
        drop(records);

        trace!(run_id = %self.id, index, task = %result.task().name(), "registered result");
        Ok(TaskResult::from_record(
            Arc::clone(result.record()),
            Some(Arc::clone(self)),
        ))
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Results in registration order.
    pub fn results(self: &Arc<Self>) -> Vec<TaskResult> {
        self.records
            .lock()
            .iter()
            .map(|record| TaskResult::from_record(Arc::clone(record), Some(Arc::clone(self))))
            .collect()
    }

    pub fn get(self: &Arc<Self>, index: usize) -> Option<TaskResult> {
        let record = self.records.lock().get(index).cloned()?;
        Some(TaskResult::from_record(record, Some(Arc::clone(self))))
    }

    /// `failed` if any result failed, else `skipped` if any skipped, else
    /// `success`.
    pub fn status(&self) -> Status {
        self.records
            .lock()
            .iter()
            .fold(Status::Success, |acc, record| acc.worst(record.status()))
    }

    /// `initialized` when empty, `executing` while any result is in flight,
    /// then `interrupted` if any result was interrupted, else `complete`.
    pub fn state(&self) -> State {
        let records = self.records.lock();
        if records.is_empty() {
            return State::Initialized;
        }
        let states: Vec<State> = records.iter().map(|record| record.state()).collect();
        if states.iter().any(|state| !state.is_executed()) {
            State::Executing
        } else if states.contains(&State::Interrupted) {
            State::Interrupted
        } else {
            State::Complete
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self.state() {
            State::Initialized => Outcome::Initialized,
            State::Executing => Outcome::Executing,
            _ => Outcome::from(self.status()),
        }
    }

    /// Wall-clock span from the earliest start to the latest finish.
    pub fn runtime(&self) -> Option<Duration> {
        let records = self.records.lock();
        let timings: Vec<_> = records.iter().map(|record| record.timing()).collect();
        let first = timings.iter().filter_map(|(started, _)| *started).min()?;
        let last = timings.iter().filter_map(|(_, finished)| *finished).max()?;
        Some(last.saturating_duration_since(first))
    }

    pub fn snapshot(self: &Arc<Self>) -> RunSnapshot {
        RunSnapshot {
            id: self.id,
            state: self.state(),
            status: self.status(),
            outcome: self.outcome(),
            runtime: self.runtime().map(|d| d.as_secs_f64()),
            results: self.results().iter().map(TaskResult::snapshot).collect(),
        }
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run: {}", self.id)?;
        let records = self.records.lock().clone();
        for record in records {
            writeln!(f, "{}", TaskResult::from_record(record, None))?;
        }
        write!(
            f,
            "state={} status={} outcome={}",
            self.state(),
            self.status(),
            self.outcome()
        )
    }
}

/// Serialization projection of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub id: Uuid,
    pub state: State,
    pub status: Status,
    pub outcome: Outcome,
    /// Seconds.
    pub runtime: Option<f64>,
    pub results: Vec<ResultSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{TaskDescriptor, TaskType};
    use crate::core::types::TaskKind;

    struct Step;

    fn result() -> TaskResult {
        TaskResult::new(TaskDescriptor::new("Step", TaskKind::Task, TaskType::of::<Step>()))
    }

    #[test]
    fn register_assigns_sequential_indexes_and_run_id() {
        let run = Run::new();
        let registered: Vec<TaskResult> = (0..3)
            .map(|_| run.register(&result()).expect("register"))
            .collect();
        for (expected, result) in registered.iter().enumerate() {
            assert_eq!(result.index(), Some(expected));
            assert_eq!(result.run_id(), Some(run.id()));
            assert!(result.run().is_some());
        }
        assert_eq!(run.len(), 3);
    }

    /// Parallel registration still yields dense, unique indexes and one
    /// shared run id.
    #[test]
    fn concurrent_registration_assigns_dense_indexes() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;

        let run = Run::new();
        let mut registered: Vec<TaskResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        (0..PER_THREAD)
                            .map(|_| run.register(&result()).expect("register"))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().expect("join"))
                .collect()
        });

        registered.sort_by_key(|result| result.index());
        let indexes: Vec<Option<usize>> = registered.iter().map(TaskResult::index).collect();
        let expected: Vec<Option<usize>> = (0..THREADS * PER_THREAD).map(Some).collect();
        assert_eq!(indexes, expected);
        assert!(registered.iter().all(|result| result.run_id() == Some(run.id())));
        assert_eq!(run.len(), THREADS * PER_THREAD);
        for (index, result) in registered.iter().enumerate() {
            assert!(run.get(index).expect("registered").same(result));
        }
    }

    #[test]
    fn registering_twice_is_a_usage_error() {
        let run = Run::new();
        let result = result();
        run.register(&result).expect("register");
        assert!(matches!(
            Run::new().register(&result),
            Err(UsageError::AlreadyRegistered { index: 0 })
        ));
        assert_eq!(run.len(), 1);
    }

    #[test]
    fn empty_run_is_initialized_success() {
        let run = Run::new();
        assert_eq!(run.state(), State::Initialized);
        assert_eq!(run.status(), Status::Success);
        assert!(run.runtime().is_none());
    }

    /// Aggregation ranks `failed > skipped > success` and reports
    /// `executing` while any member is still in flight.
    #[test]
    fn aggregates_status_and_state() {
        let run = Run::new();
        let first = run.register(&result()).expect("register");
        let second = run.register(&result()).expect("register");
        first.start().expect("start");
        first.succeed().expect("succeed");
        second.start().expect("start");
        assert_eq!(run.state(), State::Executing);
        assert_eq!(run.outcome(), Outcome::Executing);

        second.skip("quiet hours").expect("skip");
        assert_eq!(run.state(), State::Complete);
        assert_eq!(run.status(), Status::Skipped);

        let third = run.register(&result()).expect("register");
        third.start().expect("start");
        third.fail("boom").expect("fail");
        assert_eq!(run.state(), State::Interrupted);
        assert_eq!(run.status(), Status::Failed);
        assert_eq!(run.outcome(), Outcome::Failed);
        assert!(run.runtime().is_some());
    }

    #[test]
    fn snapshot_lists_results_in_order() {
        let run = Run::new();
        for _ in 0..2 {
            let result = run.register(&result()).expect("register");
            result.start().expect("start");
            result.succeed().expect("succeed");
        }
        let snapshot = run.snapshot();
        let indexes: Vec<_> = snapshot.results.iter().map(|r| r.task.index).collect();
        assert_eq!(indexes, vec![Some(0), Some(1)]);
        assert!(snapshot.results.iter().all(|r| r.task.run_id == Some(run.id())));
        assert_eq!(snapshot.status, Status::Success);
    }
}
