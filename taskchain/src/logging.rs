//! Tracing setup and the result logging hook.
//!
//! # Separation of Concerns
//!
//! - **Tracing ([`init`])**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Engine internals emit `debug!`/`trace!` events under the `taskchain`
//!   target.
//!
//! - **Result logging ([`ResultLogger`])**: One record per finished
//!   invocation, with a severity derived from its status. An engine without a
//!   logger makes no logging calls.

use anyhow::Context as _;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::result::TaskResult;
use crate::core::types::Status;

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=taskchain=debug cargo test
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Like [`init`], but reports an already-installed subscriber instead of
/// panicking.
pub fn try_init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .context("install tracing subscriber")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl From<Status> for Severity {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => Severity::Info,
            Status::Skipped => Severity::Warn,
            Status::Failed => Severity::Error,
        }
    }
}

pub trait ResultLogger: Send + Sync {
    fn log(&self, result: &TaskResult, severity: Severity);
}

/// Emits one `tracing` event per result under `taskchain::result`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ResultLogger for TracingLogger {
    fn log(&self, result: &TaskResult, severity: Severity) {
        let task = result.task().name();
        let index = result.index();
        let run_id = result.run_id();
        let state = result.state();
        let status = result.status();
        let runtime_ms = result.runtime().map(|d| d.as_secs_f64() * 1000.0);
        let reason = result.reason();
        match severity {
            Severity::Info => info!(
                target: "taskchain::result",
                task,
                ?index,
                ?run_id,
                %state,
                %status,
                ?runtime_ms,
                "task finished"
            ),
            Severity::Warn => warn!(
                target: "taskchain::result",
                task,
                ?index,
                ?run_id,
                %state,
                %status,
                ?runtime_ms,
                ?reason,
                "task skipped"
            ),
            Severity::Error => error!(
                target: "taskchain::result",
                task,
                ?index,
                ?run_id,
                %state,
                %status,
                ?runtime_ms,
                ?reason,
                "task failed"
            ),
        }
    }
}

/// Hand `result` to `logger` with its derived severity.
///
/// Returns the severity used, or `None` when no logger is configured.
pub fn dispatch(logger: Option<&dyn ResultLogger>, result: &TaskResult) -> Option<Severity> {
    let logger = logger?;
    let severity = Severity::from(result.status());
    logger.log(result, severity);
    Some(severity)
}
