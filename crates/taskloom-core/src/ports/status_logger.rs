//! TaskStatusLogger port - タスク状態の外部記録
//!
//! The manager calls a logger after every status change and on every fault.
//! Implementations may write anywhere (tracing, a database, a message bus).
//! Their failures never affect the chain: the manager logs and drops them.

use std::error::Error;

use crate::app::monitor::TaskMonitor;
use crate::domain::TaskParams;
use crate::error::TaskError;

/// Error a logger may report back. Only ever logged.
pub type LoggerError = Box<dyn Error + Send + Sync>;

/// TaskStatusLogger は状態遷移と例外を記録する
///
/// Called from the worker thread, never while the monitor lock is held, so an
/// implementation may freely read the monitor.
pub trait TaskStatusLogger: Send + Sync {
    /// After each status change. `params` are the task's input parameters.
    fn log_task_status(&self, monitor: &TaskMonitor, params: &TaskParams)
    -> Result<(), LoggerError>;

    /// When a task faults.
    fn log_task_exception(&self, monitor: &TaskMonitor, error: &TaskError)
    -> Result<(), LoggerError>;
}
