//! Task declaration.
//!
//! A task type declares its parameters once ([`Task::declare`]) and
//! implements its body ([`Task::call`]). The engine works with the
//! object-safe [`Invocable`] view, implemented for every `Task`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::core::descriptor::{TaskDescriptor, TaskType};
use crate::core::types::TaskKind;
use crate::engine::Execution;
use crate::error::{DeclarationError, TaskError};
use crate::params::tree::{ParamTree, ParamsBuilder};

pub trait Task: Send + Sync + 'static {
    /// Declare parameters for this task type. Called once per type.
    fn declare(_params: &mut ParamsBuilder)
    where
        Self: Sized,
    {
    }

    /// Task body. Runs only after parameters validated.
    ///
    /// Return `Err(exec.skip(..))` or `Err(exec.fail(..))` to halt
    /// deliberately; `?` on a strict nested call propagates (and adopts) the
    /// nested fault.
    fn call(&self, exec: &mut Execution<'_>) -> Result<(), TaskError>;

    fn name(&self) -> String {
        TaskType::of::<Self>().name().to_string()
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Task
    }

    /// Other task types this task should be matched as.
    fn lineage(&self) -> Vec<TaskType> {
        Vec::new()
    }

    fn tags(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Object-safe view of a task used by the engine and batches.
pub trait Invocable: Send + Sync {
    fn descriptor(&self) -> TaskDescriptor;

    fn parameters(&self) -> Result<Arc<ParamTree>, DeclarationError>;

    fn invoke(&self, exec: &mut Execution<'_>) -> Result<(), TaskError>;
}

impl<T: Task> Invocable for T {
    fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor::new(self.name(), self.kind(), TaskType::of::<T>())
            .with_lineage(self.lineage())
            .with_tags(self.tags())
    }

    fn parameters(&self) -> Result<Arc<ParamTree>, DeclarationError> {
        parameters_of::<T>()
    }

    fn invoke(&self, exec: &mut Execution<'_>) -> Result<(), TaskError> {
        self.call(exec)
    }
}

static PARAMETERS: LazyLock<RwLock<HashMap<TypeId, Arc<ParamTree>>>> =
    LazyLock::new(Default::default);

/// Shared parameter tree for `T`, built on first use.
///
/// Declaration errors are not cached; every lookup reports them again.
pub fn parameters_of<T: Task>() -> Result<Arc<ParamTree>, DeclarationError> {
    let id = TypeId::of::<T>();
    if let Some(tree) = PARAMETERS.read().get(&id) {
        return Ok(Arc::clone(tree));
    }
    let mut builder = ParamsBuilder::new();
    T::declare(&mut builder);
    let tree = Arc::new(builder.build()?);
    let mut registry = PARAMETERS.write();
    Ok(Arc::clone(registry.entry(id).or_insert(tree)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::node::{Param, ParamType};

    struct Lookup;

    impl Task for Lookup {
        fn declare(params: &mut ParamsBuilder) {
            params.add(Param::required("sku", ParamType::String));
        }

        fn call(&self, _exec: &mut Execution<'_>) -> Result<(), TaskError> {
            Ok(())
        }

        fn tags(&self) -> Vec<String> {
            vec!["catalog".to_string()]
        }
    }

    struct Broken;

    impl Task for Broken {
        fn declare(params: &mut ParamsBuilder) {
            params.add(Param::required("", ParamType::String));
        }

        fn call(&self, _exec: &mut Execution<'_>) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[test]
    fn parameters_are_built_once_and_shared() {
        let first = parameters_of::<Lookup>().expect("tree");
        let second = Lookup.parameters().expect("tree");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn declaration_errors_surface_on_every_lookup() {
        assert!(matches!(parameters_of::<Broken>(), Err(DeclarationError::EmptyName)));
        assert!(matches!(Broken.parameters(), Err(DeclarationError::EmptyName)));
    }

    #[test]
    fn descriptor_uses_type_name_and_tags() {
        let descriptor = Lookup.descriptor();
        assert_eq!(descriptor.name(), "Lookup");
        assert_eq!(descriptor.kind(), TaskKind::Task);
        assert_eq!(descriptor.tags(), ["catalog"]);
        assert!(descriptor.is_a(TaskType::of::<Lookup>()));
    }
}
