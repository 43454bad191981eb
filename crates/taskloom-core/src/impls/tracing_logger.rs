//! TracingStatusLogger - tracing へ状態を流すデフォルト実装

use crate::app::monitor::TaskMonitor;
use crate::domain::TaskParams;
use crate::error::TaskError;
use crate::ports::{LoggerError, TaskStatusLogger};

/// Default status logger: one `info` event per status change, one `error`
/// event per fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusLogger;

impl TracingStatusLogger {
    pub fn new() -> Self {
        Self
    }
}

impl TaskStatusLogger for TracingStatusLogger {
    fn log_task_status(
        &self,
        monitor: &TaskMonitor,
        params: &TaskParams,
    ) -> Result<(), LoggerError> {
        let index = monitor.current_task_index();
        tracing::info!(
            monitor = %monitor.id(),
            task = monitor.task_name(index).unwrap_or_default(),
            index,
            status = ?monitor.task_status(index),
            params = %serde_json::Value::Object(params.clone()),
            "task status"
        );
        Ok(())
    }

    fn log_task_exception(
        &self,
        monitor: &TaskMonitor,
        error: &TaskError,
    ) -> Result<(), LoggerError> {
        let index = monitor.current_task_index();
        tracing::error!(
            monitor = %monitor.id(),
            task = monitor.task_name(index).unwrap_or_default(),
            index,
            error = %error,
            "task faulted"
        );
        Ok(())
    }
}
