//! Test-only helpers: fixture tasks, a recording logger and a recording
//! validation target.

use parking_lot::Mutex;

use crate::core::context::{Context, Metadata};
use crate::core::descriptor::{TaskDescriptor, TaskType};
use crate::core::errors::Errors;
use crate::core::result::TaskResult;
use crate::core::types::{Status, TaskKind};
use crate::engine::{Engine, Execution};
use crate::error::TaskError;
use crate::locale::Locale;
use crate::logging::{ResultLogger, Severity};
use crate::params::Params;
use crate::params::pipeline::ValidationTarget;
use crate::params::tree::ParamTree;
use crate::task::Task;

/// Engine with default config and no result logger.
pub fn quiet_engine() -> Engine {
    Engine::default().without_logger()
}

/// Succeeds without touching anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Task for Noop {
    fn call(&self, _exec: &mut Execution<'_>) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Always skips with the given reason.
#[derive(Debug, Clone)]
pub struct Skipper {
    reason: String,
}

impl Skipper {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl Task for Skipper {
    fn call(&self, exec: &mut Execution<'_>) -> Result<(), TaskError> {
        Err(exec.skip(self.reason.as_str()))
    }
}

/// Always fails with the given reason.
#[derive(Debug, Clone)]
pub struct Failer {
    reason: String,
}

impl Failer {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl Task for Failer {
    fn call(&self, exec: &mut Execution<'_>) -> Result<(), TaskError> {
        Err(exec.fail(self.reason.as_str()))
    }
}

/// Appends `value` to the context array `key`.
#[derive(Debug, Clone)]
pub struct Append {
    key: String,
    value: String,
}

impl Append {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl Task for Append {
    fn call(&self, exec: &mut Execution<'_>) -> Result<(), TaskError> {
        let mut items = exec
            .context()
            .get(&self.key)
            .and_then(|value| value.as_array().cloned())
            .unwrap_or_default();
        items.push(self.value.clone().into());
        exec.context_mut().insert(self.key.clone(), items);
        Ok(())
    }
}

/// A standalone result for `Noop` driven to `status`.
pub fn finished_result(status: Status) -> TaskResult {
    let descriptor = TaskDescriptor::new("Noop", TaskKind::Task, TaskType::of::<Noop>());
    let result = TaskResult::new(descriptor);
    result.start().expect("start");
    match status {
        Status::Success => result.succeed().expect("succeed"),
        Status::Skipped => drop(result.skip("skipped").expect("skip")),
        Status::Failed => drop(result.fail("failed").expect("fail")),
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub task: String,
    pub index: Option<usize>,
    pub status: Status,
    pub severity: Severity,
}

/// Captures every dispatched result.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.entries.lock().iter().map(|entry| entry.severity).collect()
    }
}

impl ResultLogger for RecordingLogger {
    fn log(&self, result: &TaskResult, severity: Severity) {
        self.entries.lock().push(LogEntry {
            task: result.task().name().to_string(),
            index: result.index(),
            status: result.status(),
            severity,
        });
    }
}

/// Validation target backed by a standalone result; records fail calls.
pub struct RecordingTarget {
    tree: ParamTree,
    context: Context,
    locale: Locale,
    errors: Errors,
    params: Params,
    result: TaskResult,
    fail_calls: Vec<Metadata>,
}

impl RecordingTarget {
    pub fn new(tree: ParamTree, context: impl Into<Context>) -> Self {
        let descriptor = TaskDescriptor::new("Target", TaskKind::Task, TaskType::of::<RecordingTarget>());
        let result = TaskResult::new(descriptor);
        result.start().expect("start");
        Self {
            tree,
            context: context.into(),
            locale: Locale::default(),
            errors: Errors::new(),
            params: Params::default(),
            result,
            fail_calls: Vec::new(),
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn fail_calls(&self) -> &[Metadata] {
        &self.fail_calls
    }

    pub fn result(&self) -> &TaskResult {
        &self.result
    }
}

impl ValidationTarget for RecordingTarget {
    fn parameters(&self) -> &ParamTree {
        &self.tree
    }

    fn validation_context(&self) -> &Context {
        &self.context
    }

    fn locale(&self) -> &Locale {
        &self.locale
    }

    fn validation_errors(&self) -> &Errors {
        &self.errors
    }

    fn validation_errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    fn assign(&mut self, params: Params) {
        self.params = params;
    }

    fn fail_validation(&mut self, metadata: Metadata) -> TaskError {
        self.fail_calls.push(metadata.clone());
        match self.result.fail(metadata) {
            Ok(fault) => TaskError::Fault(fault),
            Err(err) => TaskError::Usage(err),
        }
    }
}
