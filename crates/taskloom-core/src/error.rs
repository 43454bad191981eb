use thiserror::Error;

use crate::domain::ParamType;

/// Engine error.
///
/// Synchronous variants (`UnknownTask`, `DuplicateHandler`, `EmptyTaskSetup`, ...)
/// are returned straight to the caller. Everything a task unit raises while running
/// ends up on the monitor instead.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unknown task name={0}")]
    UnknownTask(String),

    #[error("duplicate handler for task name={0}")]
    DuplicateHandler(String),

    #[error("task setup has no tasks")]
    EmptyTaskSetup,

    #[error("task name={0} allows a single execution and is already running")]
    TaskAlreadyRunning(String),

    #[error("periodic schedule needs a non-zero period")]
    InvalidPeriod,

    #[error("unknown task status logger name={0}")]
    UnknownStatusLogger(String),

    #[error("taskable method {task} declares {declared} parameter(s) but takes {expected}")]
    MismatchedParams {
        task: String,
        declared: usize,
        expected: usize,
    },

    #[error(
        "parameter {param} of task {task} is declared as {declared:?} but the method takes {expected:?}"
    )]
    IncompatibleParamType {
        task: String,
        param: String,
        declared: ParamType,
        expected: ParamType,
    },

    #[error("invalid value for parameter {name}: {message}")]
    InvalidParam { name: String, message: String },

    #[error("result {name} cannot be converted: {source}")]
    ResultConversion {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("worker runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl TaskError {
    /// Shorthand for failing a task unit with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Is this an error raised while a task was executing (as opposed to a
    /// submission/registration error)?
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            TaskError::Failed(_)
                | TaskError::Panicked(_)
                | TaskError::InvalidParam { .. }
                | TaskError::ResultConversion { .. }
        )
    }
}
