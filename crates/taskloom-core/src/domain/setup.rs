//! TaskSetup - declarative description of a task chain.
//!
//! A setup is built once by the caller and never mutated after submission.
//! It is serde-friendly so setups can be loaded from JSON.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::params::TaskParams;

/// One named task with its own parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_name: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: TaskParams,
}

impl TaskSpec {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            parameters: TaskParams::new(),
        }
    }
}

fn default_fail_fast() -> bool {
    true
}

/// Ordered list of tasks submitted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSetup {
    tasks: Vec<TaskSpec>,

    /// Retain progress messages on the monitor.
    #[serde(default)]
    log_messages: bool,

    /// Stop the chain at the first fault (default).
    #[serde(default = "default_fail_fast")]
    fail_fast: bool,

    /// Name of a status logger registered on the manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status_logger: Option<String>,

    /// Delay before the first task starts.
    #[serde(default)]
    delay_ms: u64,
}

impl TaskSetup {
    pub fn new_builder() -> TaskSetupBuilder {
        TaskSetupBuilder::default()
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.task_name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn log_messages(&self) -> bool {
        self.log_messages
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    pub fn status_logger(&self) -> Option<&str> {
        self.status_logger.as_deref()
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Fluent builder for [`TaskSetup`].
///
/// ```ignore
/// let setup = TaskSetup::new_builder()
///     .add_task("computegalactic-task")
///     .set_param("name", "Earth")
///     .set_param("factor", 0.25)
///     .build();
/// ```
///
/// `set_param` targets the most recently added task. Parameters set before the
/// first `add_task` are shared by every task; a task's own value wins.
#[derive(Debug, Clone)]
pub struct TaskSetupBuilder {
    tasks: Vec<TaskSpec>,
    common: TaskParams,
    log_messages: bool,
    fail_fast: bool,
    status_logger: Option<String>,
    delay_ms: u64,
}

impl Default for TaskSetupBuilder {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            common: TaskParams::new(),
            log_messages: false,
            fail_fast: true,
            status_logger: None,
            delay_ms: 0,
        }
    }
}

impl TaskSetupBuilder {
    pub fn add_task(mut self, task_name: impl Into<String>) -> Self {
        self.tasks.push(TaskSpec::new(task_name));
        self
    }

    pub fn set_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let target = match self.tasks.last_mut() {
            Some(spec) => &mut spec.parameters,
            None => &mut self.common,
        };
        target.insert(name.into(), value.into());
        self
    }

    pub fn set_params(mut self, params: TaskParams) -> Self {
        let target = match self.tasks.last_mut() {
            Some(spec) => &mut spec.parameters,
            None => &mut self.common,
        };
        target.extend(params);
        self
    }

    pub fn log_messages(mut self) -> Self {
        self.log_messages = true;
        self
    }

    /// Keep running later tasks after a fault.
    pub fn run_independently(mut self) -> Self {
        self.fail_fast = false;
        self
    }

    pub fn use_status_logger(mut self, name: impl Into<String>) -> Self {
        self.status_logger = Some(name.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn delay_millis(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Delay until `time`; a time in the past means no delay.
    pub fn delay_until(mut self, time: DateTime<Utc>) -> Self {
        let millis = (time - Utc::now()).num_milliseconds();
        self.delay_ms = u64::try_from(millis).unwrap_or(0);
        self
    }

    pub fn build(self) -> TaskSetup {
        let common = self.common;
        let tasks = self
            .tasks
            .into_iter()
            .map(|mut spec| {
                for (k, v) in &common {
                    if !spec.parameters.contains_key(k) {
                        spec.parameters.insert(k.clone(), v.clone());
                    }
                }
                spec
            })
            .collect();

        TaskSetup {
            tasks,
            log_messages: self.log_messages,
            fail_fast: self.fail_fast,
            status_logger: self.status_logger,
            delay_ms: self.delay_ms,
        }
    }
}
