//! TaskLauncher - TaskSetup を受け取ってチェーンを起動する入口

use std::sync::Arc;

use super::manager::TaskManager;
use super::monitor::TaskMonitor;
use crate::domain::TaskSetup;
use crate::error::TaskError;

/// Entry point for submitting a [`TaskSetup`].
///
/// Validation happens before anything is scheduled: an empty setup or an
/// unknown task name fails here and no task of the setup runs.
#[derive(Clone)]
pub struct TaskLauncher {
    manager: Arc<TaskManager>,
}

impl TaskLauncher {
    pub fn new(manager: Arc<TaskManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<TaskManager> {
        &self.manager
    }

    /// Start the setup now, or after its delay, and return its monitor.
    pub fn launch_task(&self, setup: &TaskSetup) -> Result<TaskMonitor, TaskError> {
        if setup.is_empty() {
            return Err(TaskError::EmptyTaskSetup);
        }
        let registry = self.manager.registry();
        if let Some(missing) = setup.task_names().find(|name| !registry.contains(name)) {
            tracing::warn!(task = missing, "launch rejected: unknown task");
            return Err(TaskError::UnknownTask(missing.to_string()));
        }
        self.manager.submit(setup)
    }
}
