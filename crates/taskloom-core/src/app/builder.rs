//! EngineBuilder - registry / manager / launcher を一度に組み立てる
//!
//! - 登録（unit と taskable method の型検査）は呼んだその場で失敗する
//! - runtime は借りる（`runtime_handle`）か、manager が自前で持つ
//! - status logger は build 時に manager へ渡す

use std::sync::Arc;

use tokio::runtime::Handle;

use super::launcher::TaskLauncher;
use super::manager::TaskManager;
use super::monitor::TaskMonitor;
use crate::config::EngineConfig;
use crate::domain::{ParamConfig, TaskSetup};
use crate::error::TaskError;
use crate::ports::TaskStatusLogger;
use crate::typed::{TaskHandlerDescriptor, TaskRegistry, TaskableFn};

/// Collects task handlers, loggers and runtime settings, then builds an [`Engine`].
///
/// ```ignore
/// let engine = EngineBuilder::new()
///     .runtime_handle(Handle::current())
///     .adapt_method("reports", generate_daily_report, "generatedailyrpt-task", params, true)?
///     .status_logger("audit", audit_logger)
///     .expect_tasks(&["generatedailyrpt-task"])
///     .build()?;
/// ```
///
/// A bad method signature or a duplicate name is reported by the
/// `register` / `adapt_method` call itself. Names listed in `expect_tasks`
/// are checked once more in `build`, so a component that forgot to register
/// something stops the engine from coming up at all.
pub struct EngineBuilder {
    registry: TaskRegistry,
    config: EngineConfig,
    handle: Option<Handle>,
    loggers: Vec<(String, Arc<dyn TaskStatusLogger>)>,
    default_logger: Option<Arc<dyn TaskStatusLogger>>,
    expected_tasks: Option<Vec<String>>,
}

/// Why an engine could not be built.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("expected tasks not registered: {}", .0.join(", "))]
    MissingTasks(Vec<String>),

    #[error("registration failed: {0}")]
    Registry(#[from] TaskError),

    #[error("cannot start worker runtime: {0}")]
    Runtime(#[source] TaskError),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            config: EngineConfig::default(),
            handle: None,
            loggers: Vec::new(),
            default_logger: None,
            expected_tasks: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run on an existing tokio runtime instead of creating one.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn register(self, descriptor: TaskHandlerDescriptor) -> Result<Self, BuildError> {
        self.registry.register(descriptor)?;
        Ok(self)
    }

    /// Register a typed function as a taskable method.
    pub fn adapt_method<F, Args>(
        self,
        component: &str,
        method: F,
        name: &str,
        params: Vec<ParamConfig>,
        schedulable: bool,
    ) -> Result<Self, BuildError>
    where
        F: TaskableFn<Args>,
        Args: 'static,
    {
        self.registry
            .adapt_method(component, method, name, params, schedulable)?;
        Ok(self)
    }

    pub fn status_logger(
        mut self,
        name: impl Into<String>,
        logger: Arc<dyn TaskStatusLogger>,
    ) -> Self {
        self.loggers.push((name.into(), logger));
        self
    }

    pub fn default_status_logger(mut self, logger: Arc<dyn TaskStatusLogger>) -> Self {
        self.default_logger = Some(logger);
        self
    }

    /// Task names that must be registered by the time `build` runs.
    pub fn expect_tasks(mut self, task_names: &[&str]) -> Self {
        self.expected_tasks = Some(task_names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Fails with [`BuildError::MissingTasks`] before any runtime is created if
    /// an expected name is missing. Loggers are installed on the manager here.
    pub fn build(self) -> Result<Engine, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let missing_tasks: Vec<String> = expected_tasks
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTasks(missing_tasks));
            }
        }

        let registry = Arc::new(self.registry);
        let manager = match self.handle {
            Some(handle) => TaskManager::with_handle(Arc::clone(&registry), self.config, handle),
            None => TaskManager::new(Arc::clone(&registry), self.config)
                .map_err(BuildError::Runtime)?,
        };
        for (name, logger) in self.loggers {
            manager.add_status_logger(name, logger);
        }
        if let Some(logger) = self.default_logger {
            manager.set_default_status_logger(logger);
        }

        let manager = Arc::new(manager);
        tracing::info!(tasks = ?registry.names(), "engine built");
        Ok(Engine {
            launcher: TaskLauncher::new(Arc::clone(&manager)),
            registry,
            manager,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine は registry / manager / launcher の束
#[derive(Clone)]
pub struct Engine {
    registry: Arc<TaskRegistry>,
    manager: Arc<TaskManager>,
    launcher: TaskLauncher,
}

impl Engine {
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<TaskManager> {
        &self.manager
    }

    pub fn launcher(&self) -> &TaskLauncher {
        &self.launcher
    }

    pub fn launch_task(&self, setup: &TaskSetup) -> Result<TaskMonitor, TaskError> {
        self.launcher.launch_task(setup)
    }
}
