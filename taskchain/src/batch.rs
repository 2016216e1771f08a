//! Ordered sequence of tasks sharing one context and one run.

use std::fmt;

use tracing::debug;

use crate::core::context::Metadata;
use crate::core::types::TaskKind;
use crate::engine::Execution;
use crate::error::TaskError;
use crate::task::{Invocable, Task};

/// Runs members in order on the batch's context.
///
/// A member whose status is listed in `batch_halt` stops the batch; its
/// result is thrown into the batch result, so a failed member leaves the
/// batch `interrupted`/`failed` and a halting skip leaves it
/// `complete`/`skipped`.
pub struct Batch {
    name: String,
    tasks: Vec<Box<dyn Invocable>>,
    tags: Vec<String>,
}

impl Batch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn then(mut self, task: impl Invocable + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<String> = self
            .tasks
            .iter()
            .map(|task| task.descriptor().name().to_string())
            .collect();
        f.debug_struct("Batch")
            .field("name", &self.name)
            .field("tasks", &members)
            .finish()
    }
}

impl Task for Batch {
    fn call(&self, exec: &mut Execution<'_>) -> Result<(), TaskError> {
        for task in &self.tasks {
            let result = exec.call_shared(task.as_ref())?;
            if exec.engine().config().halts_batch(result.status()) {
                debug!(
                    batch = %self.name,
                    member = %result.task().name(),
                    status = %result.status(),
                    "batch halted"
                );
                return Err(exec.throw(&result, Metadata::new()));
            }
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Batch
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }
}
