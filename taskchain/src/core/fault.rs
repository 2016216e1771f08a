//! Typed, matchable signals raised from non-successful results.
//!
//! A [`Fault`] is returned (as [`TaskError::Fault`]) when a result is skipped
//! or failed. Callers intercept faults selectively with a [`FaultMatcher`],
//! built from a [`FaultClass`] and narrowed by originating task type and/or
//! an arbitrary predicate. Anything the matcher rejects keeps propagating.
//!
//! ```ignore
//! engine
//!     .call_strict(&checkout, ctx)
//!     .rescue(FaultClass::Failed.for_tasks([TaskType::of::<ChargeCard>()]), |fault| {
//!         refund(fault.result())
//!     })?;
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::context::Metadata;
use crate::core::descriptor::{TaskDescriptor, TaskType};
use crate::core::result::TaskResult;
use crate::core::types::Status;
use crate::error::{TaskError, UsageError};
use crate::locale::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Skipped,
    Failed,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Skipped => f.write_str("Skipped"),
            FaultKind::Failed => f.write_str("Failed"),
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct Fault {
    kind: FaultKind,
    result: TaskResult,
    cause: TaskResult,
    message: String,
}

impl Fault {
    /// Select the variant matching `result.status()`.
    ///
    /// The cause is `result.caused_failure()`, or `result` itself when it
    /// did not adopt another result. Successful results never produce a fault.
    pub fn build(result: TaskResult) -> Result<Fault, UsageError> {
        let kind = match result.status() {
            Status::Success => return Err(UsageError::FaultFromSuccess),
            Status::Skipped => FaultKind::Skipped,
            Status::Failed => FaultKind::Failed,
        };
        let message = result
            .reason()
            .unwrap_or_else(|| Locale::default().translate("taskchain.faults.unspecified", &[]));
        let cause = result.caused_failure().unwrap_or_else(|| result.clone());
        Ok(Fault {
            kind,
            result,
            cause,
            message,
        })
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn is_skipped(&self) -> bool {
        self.kind == FaultKind::Skipped
    }

    pub fn is_failed(&self) -> bool {
        self.kind == FaultKind::Failed
    }

    pub fn result(&self) -> &TaskResult {
        &self.result
    }

    /// The result that skipped or failed on its own, at the bottom of any
    /// chain of adoptions.
    pub fn cause(&self) -> &TaskResult {
        &self.cause
    }

    pub fn task(&self) -> &TaskDescriptor {
        self.result.task()
    }

    pub fn metadata(&self) -> Metadata {
        self.result.metadata()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type FaultPredicate = Arc<dyn Fn(&Fault) -> bool + Send + Sync>;

/// Variant filter; the starting point for building a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Any fault regardless of variant.
    Any,
    Skipped,
    Failed,
}

impl FaultClass {
    fn admits(self, kind: FaultKind) -> bool {
        match self {
            FaultClass::Any => true,
            FaultClass::Skipped => kind == FaultKind::Skipped,
            FaultClass::Failed => kind == FaultKind::Failed,
        }
    }

    /// Match faults whose result or original cause comes from one of `types`
    /// (or declares one of them in its lineage).
    pub fn for_tasks(self, types: impl IntoIterator<Item = TaskType>) -> FaultMatcher {
        FaultMatcher::from(self).for_tasks(types)
    }

    /// Match faults for which `predicate` returns true.
    ///
    /// A missing predicate is rejected here, before any fault is tested.
    pub fn matches(self, predicate: Option<FaultPredicate>) -> Result<FaultMatcher, UsageError> {
        FaultMatcher::from(self).matches(predicate)
    }

    /// Closure form of [`FaultClass::matches`].
    pub fn when<F>(self, predicate: F) -> FaultMatcher
    where
        F: Fn(&Fault) -> bool + Send + Sync + 'static,
    {
        FaultMatcher::from(self).when(predicate)
    }
}

/// Composed fault filter. Every configured condition must hold.
#[derive(Clone)]
pub struct FaultMatcher {
    class: FaultClass,
    tasks: Option<Vec<TaskType>>,
    predicates: Vec<FaultPredicate>,
}

impl FaultMatcher {
    pub fn for_tasks(mut self, types: impl IntoIterator<Item = TaskType>) -> Self {
        self.tasks
            .get_or_insert_with(Vec::new)
            .extend(types);
        self
    }

    pub fn matches(self, predicate: Option<FaultPredicate>) -> Result<Self, UsageError> {
        let predicate = predicate.ok_or(UsageError::PredicateRequired)?;
        let mut matcher = self;
        matcher.predicates.push(predicate);
        Ok(matcher)
    }

    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Fault) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    pub fn test(&self, fault: &Fault) -> bool {
        if !self.class.admits(fault.kind()) {
            return false;
        }
        if let Some(tasks) = &self.tasks
            && !tasks
                .iter()
                .any(|t| fault.task().is_a(*t) || fault.cause().task().is_a(*t))
        {
            return false;
        }
        self.predicates.iter().all(|predicate| predicate(fault))
    }
}

impl From<FaultClass> for FaultMatcher {
    fn from(class: FaultClass) -> Self {
        Self {
            class,
            tasks: None,
            predicates: Vec::new(),
        }
    }
}

impl fmt::Debug for FaultMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultMatcher")
            .field("class", &self.class)
            .field("tasks", &self.tasks)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// Intercept matching faults on a `Result<T, TaskError>`.
pub trait Rescue<T> {
    /// Hand matching faults to `handler`; everything else passes through.
    fn rescue<M, F>(self, matcher: M, handler: F) -> Result<T, TaskError>
    where
        M: Into<FaultMatcher>,
        F: FnOnce(Fault) -> Result<T, TaskError>;
}

impl<T> Rescue<T> for Result<T, TaskError> {
    fn rescue<M, F>(self, matcher: M, handler: F) -> Result<T, TaskError>
    where
        M: Into<FaultMatcher>,
        F: FnOnce(Fault) -> Result<T, TaskError>,
    {
        match self {
            Err(TaskError::Fault(fault)) if matcher.into().test(&fault) => handler(fault),
            other => other,
        }
    }
}
