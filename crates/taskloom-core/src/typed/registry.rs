//! TaskRegistry - task name → handler descriptor.
//!
//! Populated at bootstrap, read-mostly afterwards. Unlike a hidden static, the
//! registry is an ordinary value shared through `Arc` and can be `reset()`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::method::{MethodTask, TaskableFn};
use super::unit::TaskUnit;
use crate::domain::ParamConfig;
use crate::error::TaskError;

/// How the handler was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// A hand-written [`TaskUnit`].
    Unit,
    /// A typed function adapted through [`TaskableFn`].
    TaskableMethod,
}

/// How many chains containing the task may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecLimit {
    #[default]
    AllowMultiple,
    AllowSingle,
}

/// Registered handler plus its metadata.
#[derive(Clone)]
pub struct TaskHandlerDescriptor {
    name: String,
    description: String,
    component: Option<String>,
    kind: HandlerKind,
    params: Vec<ParamConfig>,
    schedulable: bool,
    limit: ExecLimit,
    unit: Arc<dyn TaskUnit>,
}

impl TaskHandlerDescriptor {
    /// Descriptor for a hand-written unit.
    pub fn unit(name: impl Into<String>, unit: impl TaskUnit + 'static) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            component: None,
            kind: HandlerKind::Unit,
            params: Vec::new(),
            schedulable: false,
            limit: ExecLimit::default(),
            unit: Arc::new(unit),
        }
    }

    /// Adapt a typed function.
    ///
    /// # 検証
    /// - `params.len()` must equal the function arity (`MismatchedParams`)
    /// - each declared type must fit the argument type (`IncompatibleParamType`)
    pub fn taskable_method<F, Args>(
        name: impl Into<String>,
        component: impl Into<String>,
        method: F,
        params: Vec<ParamConfig>,
    ) -> Result<Self, TaskError>
    where
        F: TaskableFn<Args>,
        Args: 'static,
    {
        let name = name.into();
        let arg_types = F::param_types();
        if arg_types.len() != params.len() {
            return Err(TaskError::MismatchedParams {
                task: name,
                declared: params.len(),
                expected: arg_types.len(),
            });
        }

        for (pc, arg_type) in params.iter().zip(arg_types) {
            if !pc.param_type.is_assignable_to(arg_type) {
                return Err(TaskError::IncompatibleParamType {
                    task: name,
                    param: pc.name.clone(),
                    declared: pc.param_type,
                    expected: arg_type,
                });
            }
        }

        let names = params.iter().map(|pc| pc.name.clone()).collect();
        Ok(Self {
            description: name.clone(),
            name,
            component: Some(component.into()),
            kind: HandlerKind::TaskableMethod,
            params,
            schedulable: false,
            limit: ExecLimit::default(),
            unit: Arc::new(MethodTask::new(method, names)),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Declare a parameter on a hand-written unit.
    pub fn with_param(mut self, param: ParamConfig) -> Self {
        self.params.push(param);
        self
    }

    pub fn schedulable(mut self, schedulable: bool) -> Self {
        self.schedulable = schedulable;
        self
    }

    pub fn with_limit(mut self, limit: ExecLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn is_taskable_method(&self) -> bool {
        self.kind == HandlerKind::TaskableMethod
    }

    pub fn params(&self) -> &[ParamConfig] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_schedulable(&self) -> bool {
        self.schedulable
    }

    pub fn limit(&self) -> ExecLimit {
        self.limit
    }

    /// The executable behind this descriptor.
    pub fn handler(&self) -> &Arc<dyn TaskUnit> {
        &self.unit
    }
}

impl fmt::Debug for TaskHandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandlerDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("component", &self.component)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("schedulable", &self.schedulable)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

/// Process-wide lookup from task name to descriptor.
#[derive(Default)]
pub struct TaskRegistry {
    handlers: RwLock<HashMap<String, Arc<TaskHandlerDescriptor>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; the name must be new.
    pub fn register(&self, descriptor: TaskHandlerDescriptor) -> Result<(), TaskError> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.contains_key(descriptor.name()) {
            return Err(TaskError::DuplicateHandler(descriptor.name().to_string()));
        }
        tracing::debug!(task = descriptor.name(), kind = ?descriptor.kind(), "registered task handler");
        handlers.insert(descriptor.name().to_string(), Arc::new(descriptor));
        Ok(())
    }

    /// Adapt a typed function and register it under `name`.
    pub fn adapt_method<F, Args>(
        &self,
        component: &str,
        method: F,
        name: &str,
        params: Vec<ParamConfig>,
        schedulable: bool,
    ) -> Result<(), TaskError>
    where
        F: TaskableFn<Args>,
        Args: 'static,
    {
        let descriptor = TaskHandlerDescriptor::taskable_method(name, component, method, params)?
            .schedulable(schedulable);
        self.register(descriptor)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<TaskHandlerDescriptor>, TaskError> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn descriptors(&self) -> Vec<Arc<TaskHandlerDescriptor>> {
        let mut descriptors: Vec<_> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration (tests / hot reload).
    pub fn reset(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
