//! Identity of the task that produced a result.

use std::any::{TypeId, type_name};
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::core::types::TaskKind;

/// Runtime tag for a task type.
///
/// Equality is by `TypeId`; the name is the last path segment of the Rust type
/// name and is only used for display.
#[derive(Debug, Clone, Copy)]
pub struct TaskType {
    id: TypeId,
    name: &'static str,
}

impl TaskType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_name(type_name::<T>()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TaskType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskType {}

impl std::hash::Hash for TaskType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `my_crate::orders::CreateOrder<T>` -> `CreateOrder`.
fn short_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Static description of the task behind an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    name: String,
    kind: TaskKind,
    task_type: TaskType,
    lineage: Vec<TaskType>,
    tags: Vec<String>,
}

impl TaskDescriptor {
    pub fn new(name: impl Into<String>, kind: TaskKind, task_type: TaskType) -> Self {
        Self {
            name: name.into(),
            kind,
            task_type,
            lineage: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Additional task types this task is considered an instance of.
    pub fn with_lineage(mut self, lineage: Vec<TaskType>) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn lineage(&self) -> &[TaskType] {
        &self.lineage
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Exact type or any declared ancestor.
    pub fn is_a(&self, task_type: TaskType) -> bool {
        self.task_type == task_type || self.lineage.contains(&task_type)
    }
}

/// Serialization projection of a task invocation wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub index: Option<usize>,
    pub run_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub class: String,
    pub id: Uuid,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CreateOrder;
    struct Wrapper<T>(T);
    struct Audited;

    #[test]
    fn short_name_strips_path_and_generics() {
        assert_eq!(TaskType::of::<CreateOrder>().name(), "CreateOrder");
        assert_eq!(TaskType::of::<Wrapper<CreateOrder>>().name(), "Wrapper");
    }

    #[test]
    fn is_a_checks_exact_type_and_lineage() {
        let descriptor = TaskDescriptor::new("CreateOrder", TaskKind::Task, TaskType::of::<CreateOrder>())
            .with_lineage(vec![TaskType::of::<Audited>()]);
        assert!(descriptor.is_a(TaskType::of::<CreateOrder>()));
        assert!(descriptor.is_a(TaskType::of::<Audited>()));
        assert!(!descriptor.is_a(TaskType::of::<Wrapper<CreateOrder>>()));
    }
}
