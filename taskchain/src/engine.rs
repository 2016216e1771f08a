//! Invocation driver.
//!
//! Every invocation follows the same path:
//!
//! 1. Resolve the task's shared parameter tree.
//! 2. Register a fresh result into the run and `start` it.
//! 3. Validate parameters; on errors the result fails once and the body is
//!    skipped.
//! 4. Run the body.
//! 5. Settle: succeed if nothing halted, adopt nested faults, record
//!    unexpected errors as failures.
//! 6. Hand the result to the logger, if any.
//!
//! [`Engine::call`] always returns the result. [`Engine::call_strict`]
//! additionally returns `Err` when the final status is listed in
//! `task_halt` or when the body raised an unexpected error. The fault is
//! built from the invoked result, so an enclosing task adopts its direct
//! child; [`Fault::cause`] still names the original failure.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::core::context::{Context, Metadata};
use crate::core::errors::Errors;
use crate::core::fault::Fault;
use crate::core::result::TaskResult;
use crate::core::run::Run;
use crate::error::{TaskError, UsageError};
use crate::io::config::EngineConfig;
use crate::locale::{Locale, Translator};
use crate::logging::{self, ResultLogger, TracingLogger};
use crate::params::Params;
use crate::params::pipeline::{ValidationTarget, validate};
use crate::params::tree::ParamTree;
use crate::task::Invocable;

pub struct Engine {
    config: EngineConfig,
    locale: Locale,
    logger: Option<Arc<dyn ResultLogger>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let locale = Locale::new(config.locale.clone());
        let logger = config
            .log_results
            .then(|| Arc::new(TracingLogger) as Arc<dyn ResultLogger>);
        Self {
            config,
            locale,
            logger,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ResultLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn without_logger(mut self) -> Self {
        self.logger = None;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.locale = self.locale.with_translator(translator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Invoke `task` in a new run and return its result.
    ///
    /// Skips, failures and unexpected errors are all recorded on the result.
    /// Only usage errors are returned.
    pub fn call(&self, task: &dyn Invocable, context: impl Into<Context>) -> Result<TaskResult, UsageError> {
        let run = Run::new();
        self.invoke(&run, task, context.into()).map(|invocation| invocation.result)
    }

    /// Invoke `task` in a new run, returning halting statuses as faults.
    pub fn call_strict(&self, task: &dyn Invocable, context: impl Into<Context>) -> Result<TaskResult, TaskError> {
        let run = Run::new();
        self.invoke(&run, task, context.into())?.strict()
    }

    #[instrument(skip_all, fields(run_id = %run.id()))]
    fn invoke(&self, run: &Arc<Run>, task: &dyn Invocable, context: Context) -> Result<Invocation, UsageError> {
        let parameters = task.parameters()?;
        let result = run.register(&TaskResult::new(task.descriptor()))?;
        debug!(task = %result.task().name(), index = ?result.index(), "invoking task");
        result.start()?;

        let mut exec = Execution {
            engine: self,
            run: Arc::clone(run),
            result: result.clone(),
            parameters,
            context,
            params: Params::default(),
            errors: Errors::new(),
        };
        let outcome = match validate(&mut exec) {
            Ok(()) => task.invoke(&mut exec),
            Err(err) => Err(err),
        };
        let context = exec.context;

        let escalation = self.settle(&result, outcome)?;
        result.set_context(context.clone());
        logging::dispatch(self.logger.as_deref(), &result);

        Ok(Invocation {
            result,
            context,
            escalation,
        })
    }

    /// Bring `result` to a terminal state and decide what strict mode raises.
    fn settle(&self, result: &TaskResult, outcome: Result<(), TaskError>) -> Result<Option<TaskError>, UsageError> {
        match outcome {
            Ok(()) => {
                if result.is_executing() {
                    result.succeed()?;
                }
            }
            Err(TaskError::Fault(fault)) => {
                if !fault.result().same(result) && result.is_executing() {
                    result.throw(fault.result(), Metadata::new())?;
                }
            }
            Err(TaskError::Usage(err)) => return Err(err),
            Err(TaskError::Unexpected(err)) => {
                if result.is_executing() {
                    let reason = format!("[{}] {err}", result.task().name());
                    result.fail(Metadata::from(reason).with("error", format!("{err:#}")))?;
                }
                debug!(task = %result.task().name(), error = %err, "unexpected error in task");
                return Ok(Some(TaskError::Unexpected(err)));
            }
        }

        if !self.config.halts_task(result.status()) {
            return Ok(None);
        }
        Ok(Some(TaskError::Fault(Fault::build(result.clone())?)))
    }
}

struct Invocation {
    result: TaskResult,
    context: Context,
    escalation: Option<TaskError>,
}

impl Invocation {
    fn strict(self) -> Result<TaskResult, TaskError> {
        match self.escalation {
            Some(err) => Err(err),
            None => Ok(self.result),
        }
    }
}

/// Live state of one invocation, handed to the task body.
pub struct Execution<'a> {
    engine: &'a Engine,
    run: Arc<Run>,
    result: TaskResult,
    parameters: Arc<ParamTree>,
    context: Context,
    params: Params,
    errors: Errors,
}

fn transition(outcome: Result<Fault, UsageError>) -> TaskError {
    match outcome {
        Ok(fault) => TaskError::Fault(fault),
        Err(err) => TaskError::Usage(err),
    }
}

impl Execution<'_> {
    pub fn engine(&self) -> &Engine {
        self.engine
    }

    pub fn run(&self) -> &Arc<Run> {
        &self.run
    }

    pub fn result(&self) -> &TaskResult {
        &self.result
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shorthand for `params().value(name)`.
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> AnyResult<T> {
        self.params.value(name)
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    /// Skip this invocation. Return the error from the body.
    pub fn skip(&self, metadata: impl Into<Metadata>) -> TaskError {
        transition(self.result.skip(metadata))
    }

    /// Fail this invocation. Return the error from the body.
    pub fn fail(&self, metadata: impl Into<Metadata>) -> TaskError {
        transition(self.result.fail(metadata))
    }

    /// Adopt another result's skip or failure.
    pub fn throw(&self, other: &TaskResult, metadata: impl Into<Metadata>) -> TaskError {
        transition(self.result.throw(other, metadata))
    }

    /// Invoke a nested task in the same run with its own context.
    pub fn call(&self, task: &dyn Invocable, context: impl Into<Context>) -> Result<TaskResult, UsageError> {
        self.engine
            .invoke(&self.run, task, context.into())
            .map(|invocation| invocation.result)
    }

    /// Strict form of [`Execution::call`]; `?` propagates halting faults.
    pub fn call_strict(&self, task: &dyn Invocable, context: impl Into<Context>) -> Result<TaskResult, TaskError> {
        self.engine.invoke(&self.run, task, context.into())?.strict()
    }

    /// Invoke a nested task on this invocation's context.
    ///
    /// The nested task's writes are visible here afterwards.
    pub fn call_shared(&mut self, task: &dyn Invocable) -> Result<TaskResult, UsageError> {
        let context = std::mem::take(&mut self.context);
        let invocation = self.engine.invoke(&self.run, task, context)?;
        self.context = invocation.context;
        Ok(invocation.result)
    }
}

impl ValidationTarget for Execution<'_> {
    fn parameters(&self) -> &ParamTree {
        &self.parameters
    }

    fn validation_context(&self) -> &Context {
        &self.context
    }

    fn locale(&self) -> &Locale {
        &self.engine.locale
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
        transition(self.result.fail(metadata))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use serde_json::json;

    use super::*;
    use crate::core::descriptor::TaskType;
    use crate::core::fault::{FaultClass, Rescue};
    use crate::core::types::{State, Status};
    use crate::params::node::{Param, ParamType};
    use crate::params::tree::ParamsBuilder;
    use crate::task::Task;
    use crate::test_support::{Failer, Noop, Skipper, quiet_engine};

    struct Double;

    impl Task for Double {
        fn declare(params: &mut ParamsBuilder) {
            params.add(Param::required("n", ParamType::Integer));
        }

        fn call(&self, exec: &mut Execution<'_>) -> Result<(), TaskError> {
            let n: i64 = exec.param("n")?;
            exec.context_mut().insert("doubled", n * 2);
            Ok(())
        }
    }

    struct Explodes;

    impl Task for Explodes {
        fn call(&self, _exec: &mut Execution<'_>) -> Result<(), TaskError> {
            Err(anyhow!("disk full").into())
        }
    }

    #[test]
    fn successful_call_completes_and_keeps_context() {
        let result = quiet_engine().call(&Double, json!({"n": "21"})).expect("call");
        assert_eq!(result.state(), State::Complete);
        assert_eq!(result.status(), Status::Success);
        assert_eq!(result.context().get("doubled"), Some(&json!(42)));
        assert_eq!(result.index(), Some(0));
    }

    #[test]
    fn validation_failure_skips_body() {
        let result = quiet_engine().call(&Double, json!({})).expect("call");
        assert!(result.is_failed());
        assert_eq!(result.reason().as_deref(), Some("n is a required parameter"));
        assert!(result.context().get("doubled").is_none());
    }

    #[test]
    fn strict_call_returns_fault_for_failure_only_by_default() {
        let engine = quiet_engine();
        let err = engine
            .call_strict(&Failer::new("declined"), Context::new())
            .expect_err("fault");
        let fault = err.into_fault().expect("fault");
        assert!(fault.is_failed());
        assert_eq!(fault.message(), "declined");

        let skipped = engine
            .call_strict(&Skipper::new("later"), Context::new())
            .expect("skip does not halt");
        assert!(skipped.is_skipped());
    }

    #[test]
    fn task_halt_can_include_skipped() {
        let config = EngineConfig {
            task_halt: vec![Status::Skipped, Status::Failed],
            ..EngineConfig::default()
        };
        let engine = Engine::new(config).without_logger();
        let err = engine
            .call_strict(&Skipper::new("later"), Context::new())
            .expect_err("halt on skip");
        assert!(err.as_fault().is_some_and(Fault::is_skipped));
    }

    #[test]
    fn unexpected_errors_fail_the_result() {
        let engine = quiet_engine();
        let result = engine.call(&Explodes, Context::new()).expect("lenient");
        assert!(result.is_failed());
        assert_eq!(result.reason().as_deref(), Some("[Explodes] disk full"));

        let err = engine.call_strict(&Explodes, Context::new()).expect_err("strict");
        assert!(matches!(err, TaskError::Unexpected(ref e) if e.to_string() == "disk full"));
    }

    #[test]
    fn strict_result_can_be_rescued() {
        let engine = quiet_engine();
        let rescued = engine
            .call_strict(&Failer::new("declined"), Context::new())
            .rescue(FaultClass::Failed.for_tasks([TaskType::of::<Failer>()]), |fault| {
                Ok(fault.result().clone())
            })
            .expect("rescued");
        assert!(rescued.is_failed());
    }

    /// Task bodies reach the inherent `fail`/`errors` even where the
    /// validation hooks are in scope.
    struct Rejects;

    impl Task for Rejects {
        fn call(&self, exec: &mut Execution<'_>) -> Result<(), TaskError> {
            exec.errors_mut().add("stock", "is empty");
            let reason = exec.errors().to_sentence();
            Err(exec.fail(reason.as_str()))
        }
    }

    #[test]
    fn body_failure_uses_inherent_fail() {
        let result = quiet_engine().call(&Rejects, Context::new()).expect("call");
        assert!(result.is_failed());
        assert_eq!(result.reason().as_deref(), Some("stock is empty"));
    }

    #[test]
    fn noop_succeeds() {
        let result = quiet_engine().call(&Noop, Context::new()).expect("call");
        assert!(result.is_success());
        assert!(result.runtime().is_some());
    }
}
