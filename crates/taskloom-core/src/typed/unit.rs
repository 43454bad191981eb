//! TaskUnit trait - the smallest unit of executable work.

use crate::app::monitor::TaskMonitor;
use crate::domain::{TaskInput, TaskOutput};
use crate::error::TaskError;

/// TaskUnit は 1 タスク分の処理を同期的に実行する
///
/// Runs on a worker thread. Blocking (I/O etc.) is fine. Units may push progress
/// messages to the monitor and should poll [`TaskMonitor::is_cancel_requested`]
/// when they run long; the engine never interrupts them.
///
/// Object-safe so it can live in the registry as `Arc<dyn TaskUnit>`.
pub trait TaskUnit: Send + Sync {
    fn execute(&self, monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError>;
}

impl<F> TaskUnit for F
where
    F: Fn(&TaskMonitor, &TaskInput) -> Result<TaskOutput, TaskError> + Send + Sync,
{
    fn execute(&self, monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
        self(monitor, input)
    }
}
