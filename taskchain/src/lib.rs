//! In-process task execution engine with typed results and matchable faults.
//!
//! Callers invoke tasks through an [`Engine`](engine::Engine). Every
//! invocation produces a [`TaskResult`](core::result::TaskResult) describing
//! how it finished (success, deliberate skip, or failure) and is registered
//! into a [`Run`](core::run::Run) shared by every nested invocation of the
//! same logical operation. The architecture enforces a strict separation:
//!
//! - **[`core`]**: The result state machine, faults and run aggregation.
//!   No I/O, fully testable in isolation.
//! - **[`params`]**: Parameter declaration trees, coercion, validators and
//!   the validation pipeline feeding the result's failure path.
//! - **[`io`]**: Side-effecting operations (configuration files).
//!
//! Orchestration modules ([`engine`], [`batch`], [`task`]) tie parameter
//! validation, task bodies and fault propagation together.

pub mod batch;
pub mod core;
pub mod engine;
pub mod error;
pub mod io;
pub mod locale;
pub mod logging;
pub mod params;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::batch::Batch;
pub use crate::core::context::{Context, Metadata};
pub use crate::core::descriptor::TaskType;
pub use crate::core::fault::{Fault, FaultClass, FaultKind, FaultMatcher, Rescue};
pub use crate::core::result::TaskResult;
pub use crate::core::run::Run;
pub use crate::core::types::{Outcome, State, Status, TaskKind};
pub use crate::engine::{Engine, Execution};
pub use crate::error::{DeclarationError, TaskError, UsageError};
pub use crate::task::{Invocable, Task};
