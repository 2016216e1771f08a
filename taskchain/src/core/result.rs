//! Per-invocation outcome record and its state machine.
//!
//! A [`TaskResult`] is a cheap, cloneable handle. All clones observe the same
//! underlying record, which is mutated exactly once into a terminal
//! state/status pair:
//!
//! | operation | state | status |
//! |-----------|-------|--------|
//! | `start`   | executing | success |
//! | `succeed` | complete | success |
//! | `skip`    | complete | skipped |
//! | `fail`    | interrupted | failed |
//! | `throw`   | adopted from the thrown result |
//!
//! Handles returned by [`Run::register`](crate::core::run::Run::register) also
//! carry the owning run so callers can inspect the whole chain afterwards.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::core::context::{Context, Metadata};
use crate::core::descriptor::{TaskDescriptor, TaskSnapshot};
use crate::core::fault::Fault;
use crate::core::run::Run;
use crate::core::types::{Outcome, State, Status};
use crate::error::UsageError;

#[derive(Debug, Clone, Copy)]
struct Registration {
    index: usize,
    run_id: Uuid,
}

#[derive(Debug)]
struct Inner {
    state: State,
    status: Status,
    metadata: Metadata,
    started: Option<Instant>,
    finished: Option<Instant>,
    context: Context,
    threw: Option<Arc<Record>>,
    caused: Option<Arc<Record>>,
}

/// Shared storage behind every [`TaskResult`] handle.
#[derive(Debug)]
pub(crate) struct Record {
    id: Uuid,
    task: TaskDescriptor,
    registration: OnceLock<Registration>,
    inner: Mutex<Inner>,
}

impl Record {
    pub(crate) fn register(&self, index: usize, run_id: Uuid) -> Result<(), UsageError> {
        self.registration
            .set(Registration { index, run_id })
            .map_err(|_| UsageError::AlreadyRegistered {
                index: self.registration.get().map_or(index, |r| r.index),
            })
    }

    pub(crate) fn state(&self) -> State {
        self.inner.lock().state
    }

    pub(crate) fn status(&self) -> Status {
        self.inner.lock().status
    }

    /// `(started, finished)` instants, when recorded.
    pub(crate) fn timing(&self) -> (Option<Instant>, Option<Instant>) {
        let inner = self.inner.lock();
        (inner.started, inner.finished)
    }
}

#[derive(Clone)]
pub struct TaskResult {
    record: Arc<Record>,
    run: Option<Arc<Run>>,
}

impl TaskResult {
    /// Create an unregistered result in the `initialized` state.
    pub fn new(task: TaskDescriptor) -> Self {
        let record = Record {
            id: Uuid::new_v4(),
            task,
            registration: OnceLock::new(),
            inner: Mutex::new(Inner {
                state: State::Initialized,
                status: Status::Success,
                metadata: Metadata::default(),
                started: None,
                finished: None,
                context: Context::default(),
                threw: None,
                caused: None,
            }),
        };
        Self {
            record: Arc::new(record),
            run: None,
        }
    }

    pub(crate) fn from_record(record: Arc<Record>, run: Option<Arc<Run>>) -> Self {
        Self { record, run }
    }

    pub(crate) fn record(&self) -> &Arc<Record> {
        &self.record
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn task(&self) -> &TaskDescriptor {
        &self.record.task
    }

    /// Position within the owning run, once registered.
    pub fn index(&self) -> Option<usize> {
        self.record.registration.get().map(|r| r.index)
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.record.registration.get().map(|r| r.run_id)
    }

    pub fn run(&self) -> Option<&Arc<Run>> {
        self.run.as_ref()
    }

    /// True when both handles point at the same record.
    pub fn same(&self, other: &TaskResult) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }

    pub fn state(&self) -> State {
        self.record.state()
    }

    pub fn status(&self) -> Status {
        self.record.status()
    }

    pub fn outcome(&self) -> Outcome {
        let inner = self.record.inner.lock();
        match inner.state {
            State::Initialized => Outcome::Initialized,
            State::Executing => Outcome::Executing,
            _ if inner.threw.is_some() && inner.status == Status::Failed => Outcome::Interrupted,
            _ => Outcome::from(inner.status),
        }
    }

    pub fn metadata(&self) -> Metadata {
        self.record.inner.lock().metadata.clone()
    }

    pub fn reason(&self) -> Option<String> {
        self.record.inner.lock().metadata.reason().map(str::to_string)
    }

    /// Time between `start` and the terminal transition.
    pub fn runtime(&self) -> Option<Duration> {
        let (started, finished) = self.record.timing();
        started
            .zip(finished)
            .map(|(started, finished)| finished.duration_since(started))
    }

    /// Context as it was when the invocation settled.
    pub fn context(&self) -> Context {
        self.record.inner.lock().context.clone()
    }

    pub(crate) fn set_context(&self, context: Context) {
        self.record.inner.lock().context = context;
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == State::Initialized
    }

    pub fn is_executing(&self) -> bool {
        self.state() == State::Executing
    }

    pub fn is_complete(&self) -> bool {
        self.state() == State::Complete
    }

    pub fn is_interrupted(&self) -> bool {
        self.state() == State::Interrupted
    }

    pub fn is_executed(&self) -> bool {
        self.state().is_executed()
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn is_skipped(&self) -> bool {
        self.status() == Status::Skipped
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    /// Not failed.
    pub fn is_good(&self) -> bool {
        !self.is_failed()
    }

    /// Not successful.
    pub fn is_bad(&self) -> bool {
        !self.is_success()
    }

    /// The result this one adopted its status from, if any.
    pub fn threw_failure(&self) -> Option<TaskResult> {
        let threw = self.record.inner.lock().threw.clone();
        threw.map(|record| TaskResult::from_record(record, self.run.clone()))
    }

    /// The original result at the bottom of a chain of adoptions.
    pub fn caused_failure(&self) -> Option<TaskResult> {
        let caused = self.record.inner.lock().caused.clone();
        caused.map(|record| TaskResult::from_record(record, self.run.clone()))
    }

    /// Failed on its own rather than by adopting another result.
    pub fn is_caused_failure(&self) -> bool {
        let inner = self.record.inner.lock();
        inner.status == Status::Failed && inner.threw.is_none()
    }

    pub fn is_thrown_failure(&self) -> bool {
        let inner = self.record.inner.lock();
        inner.status == Status::Failed && inner.threw.is_some()
    }

    pub fn start(&self) -> Result<(), UsageError> {
        let mut inner = self.record.inner.lock();
        if inner.state != State::Initialized {
            return Err(UsageError::InvalidTransition {
                from: inner.state,
                to: State::Executing,
            });
        }
        inner.state = State::Executing;
        inner.started = Some(Instant::now());
        Ok(())
    }

    pub fn succeed(&self) -> Result<(), UsageError> {
        self.finish(State::Complete, Status::Success, Metadata::default(), None)
    }

    /// Mark the result skipped and return the fault to propagate.
    pub fn skip(&self, metadata: impl Into<Metadata>) -> Result<Fault, UsageError> {
        self.finish(State::Complete, Status::Skipped, metadata.into(), None)?;
        Fault::build(self.clone())
    }

    /// Mark the result failed and return the fault to propagate.
    pub fn fail(&self, metadata: impl Into<Metadata>) -> Result<Fault, UsageError> {
        self.finish(State::Interrupted, Status::Failed, metadata.into(), None)?;
        Fault::build(self.clone())
    }

    /// Adopt the status and metadata of another non-successful result.
    ///
    /// `metadata` is merged over the thrown result's metadata. The returned
    /// fault is built from this result.
    pub fn throw(&self, other: &TaskResult, metadata: impl Into<Metadata>) -> Result<Fault, UsageError> {
        if self.same(other) {
            return Err(UsageError::ThrowSelf);
        }
        let (status, mut merged, caused) = {
            let thrown = other.record.inner.lock();
            (thrown.status, thrown.metadata.clone(), thrown.caused.clone())
        };
        if status == Status::Success {
            return Err(UsageError::ThrowSuccess);
        }
        merged.merge(metadata.into());
        let state = if status == Status::Failed {
            State::Interrupted
        } else {
            State::Complete
        };
        let caused = caused.unwrap_or_else(|| Arc::clone(&other.record));
        self.finish(state, status, merged, Some((Arc::clone(&other.record), caused)))?;
        Fault::build(self.clone())
    }

    fn finish(
        &self,
        state: State,
        status: Status,
        metadata: Metadata,
        adopted: Option<(Arc<Record>, Arc<Record>)>,
    ) -> Result<(), UsageError> {
        let mut inner = self.record.inner.lock();
        if inner.state != State::Executing {
            return Err(UsageError::InvalidTransition {
                from: inner.state,
                to: state,
            });
        }
        inner.state = state;
        inner.status = status;
        inner.metadata = metadata;
        inner.finished = Some(Instant::now());
        if let Some((threw, caused)) = adopted {
            inner.threw = Some(threw);
            inner.caused = Some(caused);
        }
        drop(inner);

        debug!(
            task = %self.record.task.name(),
            index = ?self.index(),
            %state,
            %status,
            "result settled"
        );
        Ok(())
    }

    pub fn task_snapshot(&self) -> TaskSnapshot {
        let task = &self.record.task;
        TaskSnapshot {
            index: self.index(),
            run_id: self.run_id(),
            kind: task.kind(),
            class: task.name().to_string(),
            id: self.id(),
            tags: task.tags().to_vec(),
        }
    }

    pub fn snapshot(&self) -> ResultSnapshot {
        ResultSnapshot {
            task: self.task_snapshot(),
            state: self.state(),
            status: self.status(),
            outcome: self.outcome(),
            metadata: self.metadata(),
            runtime: self.runtime().map(|d| d.as_secs_f64()),
            caused_failure: self.caused_failure().as_ref().map(FailureRef::from),
            threw_failure: self.threw_failure().as_ref().map(FailureRef::from),
        }
    }
}

impl fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult")
            .field("id", &self.id())
            .field("task", &self.record.task.name())
            .field("index", &self.index())
            .field("state", &self.state())
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        let index = snapshot
            .task
            .index
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        let run_id = snapshot
            .task
            .run_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let metadata = serde_json::to_string(&snapshot.metadata).map_err(|_| fmt::Error)?;
        write!(
            f,
            "index={index} run_id={run_id} type={} class={} id={} state={} status={} outcome={} metadata={metadata}",
            snapshot.task.kind,
            snapshot.task.class,
            snapshot.task.id,
            snapshot.state,
            snapshot.status,
            snapshot.outcome,
        )?;
        if let Some(runtime) = snapshot.runtime {
            write!(f, " runtime={runtime:.6}")?;
        }
        Ok(())
    }
}

/// Serialization projection of a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSnapshot {
    #[serde(flatten)]
    pub task: TaskSnapshot,
    pub state: State,
    pub status: Status,
    pub outcome: Outcome,
    pub metadata: Metadata,
    /// Seconds.
    pub runtime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_failure: Option<FailureRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threw_failure: Option<FailureRef>,
}

/// Pointer to another result in the same run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRef {
    pub index: Option<usize>,
    pub class: String,
    pub id: Uuid,
}

impl From<&TaskResult> for FailureRef {
    fn from(result: &TaskResult) -> Self {
        Self {
            index: result.index(),
            class: result.task().name().to_string(),
            id: result.id(),
        }
    }
}
