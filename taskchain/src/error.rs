//! Error types returned by the engine.
//!
//! - [`TaskError`]: what a task body returns and what strict invocation
//!   surfaces. Faults are matchable control flow; usage and unexpected errors
//!   are not.
//! - [`UsageError`]: programmer misuse. Never intercepted by fault matching.
//! - [`DeclarationError`]: invalid parameter declarations, detected when a
//!   task type's parameter tree is built.

use thiserror::Error;

use crate::core::fault::Fault;
use crate::core::types::State;
use crate::params::node::{ParamType, Source};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Fault(#[from] Fault),

    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Anything raised by task or validator code that is not a fault.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl TaskError {
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            TaskError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn into_fault(self) -> Option<Fault> {
        match self {
            TaskError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("cannot transition result from {from} to {to}")]
    InvalidTransition { from: State, to: State },

    #[error("cannot build a fault from a successful result")]
    FaultFromSuccess,

    #[error("cannot throw a successful result")]
    ThrowSuccess,

    #[error("a result cannot throw itself")]
    ThrowSelf,

    #[error("a predicate is required")]
    PredicateRequired,

    #[error("result is already registered at index {index}")]
    AlreadyRegistered { index: usize },

    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

#[derive(Error, Debug, Clone)]
pub enum DeclarationError {
    #[error("parameter name cannot be empty")]
    EmptyName,

    #[error("parameter `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("parameter `{name}` of type {kind} cannot declare children")]
    ChildrenOnScalar { name: String, kind: ParamType },

    #[error("parameter `{name}` must be sourced from {expected}, not {actual}")]
    SourceMismatch {
        name: String,
        expected: Source,
        actual: Source,
    },

    #[error("invalid {validator} options for parameter `{name}`: {reason}")]
    InvalidValidator {
        name: String,
        validator: String,
        reason: String,
    },

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("default for parameter `{name}` {reason}")]
    InvalidDefault { name: String, reason: String },
}
