//! Shared test fixtures: sample task units, taskable methods and loggers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::app::monitor::TaskMonitor;
use crate::domain::{ParamConfig, ParamType, TaskInput, TaskOutput, TaskParams, TaskStatus};
use crate::error::TaskError;
use crate::ports::{LoggerError, TaskStatusLogger};
use crate::typed::{ExecLimit, TaskHandlerDescriptor, TaskRegistry};

pub const TASKABLE_COMPONENT: &str = "test-taskablecomponent";

// ────────────────────────────────────────────────────────────────────────────
// taskable methods
// ────────────────────────────────────────────────────────────────────────────

pub fn compute_galactic(monitor: &TaskMonitor, name: String, factor: f64) -> Result<i64, TaskError> {
    if name.is_empty() {
        return Ok(0);
    }
    monitor.add_message(format!("computing for {name}"));
    Ok((factor * 1_000_000.0).floor() as i64)
}

pub fn get_one(_monitor: &TaskMonitor) -> Result<i64, TaskError> {
    Ok(1)
}

pub fn generate_daily_report(
    monitor: &TaskMonitor,
    report_base: String,
    working_dt: DateTime<Utc>,
) -> Result<String, TaskError> {
    let report = format!("{report_base}-{}", working_dt.format("%Y%m%d"));
    monitor.add_message(format!("generated {report}"));
    Ok(report)
}

pub fn register_taskable_component(registry: &TaskRegistry) -> Result<(), TaskError> {
    registry.register(
        TaskHandlerDescriptor::taskable_method(
            "computegalactic-task",
            TASKABLE_COMPONENT,
            compute_galactic,
            vec![
                ParamConfig::new("name", ParamType::String),
                ParamConfig::new("factor", ParamType::Decimal),
            ],
        )?
        .with_description("Galactic Calculator"),
    )?;

    registry.register(
        TaskHandlerDescriptor::taskable_method("getone-task", TASKABLE_COMPONENT, get_one, vec![])?
            .with_description("Get One Task"),
    )?;

    registry.register(
        TaskHandlerDescriptor::taskable_method(
            "generatedailyrpt-task",
            TASKABLE_COMPONENT,
            generate_daily_report,
            vec![
                ParamConfig::new("reportBase", ParamType::String)
                    .with_description("Report Base")
                    .with_editor("!ui-text"),
                ParamConfig::new("workingDt", ParamType::Date)
                    .with_description("Working Date")
                    .with_editor("!ui-date"),
            ],
        )?
        .with_description("Generate Daily Report")
        .schedulable(true),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// hand-written units
// ────────────────────────────────────────────────────────────────────────────

fn echo_param(param: &'static str) -> impl Fn(&TaskMonitor, &TaskInput) -> Result<TaskOutput, TaskError> {
    move |monitor: &TaskMonitor, input: &TaskInput| {
        let value: String = input.get_or_default(param)?;
        monitor.add_message(format!("{} received {value}", input.task_name()));
        TaskOutput::new().with_result("message", value)
    }
}

fn always_fails(_monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
    Err(TaskError::failed(format!("{} failed", input.task_name())))
}

fn panics(_monitor: &TaskMonitor, _input: &TaskInput) -> Result<TaskOutput, TaskError> {
    panic!("unit exploded")
}

fn alphanumeric(_monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
    let text: String = input.get_or_default("text")?;
    let cleaned: String = text.chars().filter(char::is_ascii_alphanumeric).collect();
    TaskOutput::new().with_result("result", cleaned)
}

/// Runs until cancellation is requested (or `maxMillis`, default 10s, passes).
fn wait_for_cancel(monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
    let max_millis: u64 = input.get("maxMillis")?.unwrap_or(10_000);
    let deadline = Instant::now() + Duration::from_millis(max_millis);
    let mut ticks = 0u64;
    while !monitor.is_cancel_requested() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
        ticks += 1;
    }
    TaskOutput::new().with_result("ticks", ticks)
}

/// Sleeps `millis` (default 10) then completes.
fn sleeper(monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
    let millis: u64 = input.get("millis")?.unwrap_or(10);
    thread::sleep(Duration::from_millis(millis));
    monitor.add_message(format!("slept {millis}ms"));
    TaskOutput::new().with_result("slept", millis)
}

fn chatty(monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
    let count: usize = input.get_or_default("count")?;
    for i in 0..count {
        monitor.add_message(format!("message {i}"));
    }
    Ok(TaskOutput::new())
}

pub fn register_units(registry: &TaskRegistry) -> Result<(), TaskError> {
    registry.register(TaskHandlerDescriptor::unit("test-taska", echo_param("paramA")))?;
    registry.register(TaskHandlerDescriptor::unit("test-taskb", echo_param("paramB")))?;
    registry.register(TaskHandlerDescriptor::unit("test-taskc", always_fails))?;
    registry.register(TaskHandlerDescriptor::unit("panic-task", panics))?;
    registry.register(TaskHandlerDescriptor::unit("alphanumeric-task", alphanumeric))?;
    registry.register(TaskHandlerDescriptor::unit("wait-for-cancel-task", wait_for_cancel))?;
    registry.register(TaskHandlerDescriptor::unit("sleep-task", sleeper))?;
    registry.register(TaskHandlerDescriptor::unit("chatty-task", chatty))?;
    registry.register(
        TaskHandlerDescriptor::unit("exclusive-task", wait_for_cancel)
            .with_limit(ExecLimit::AllowSingle),
    )
}

/// Registry with every fixture registered.
pub fn registry() -> Arc<TaskRegistry> {
    let registry = TaskRegistry::new();
    register_taskable_component(&registry).expect("taskable component registers");
    register_units(&registry).expect("units register");
    Arc::new(registry)
}

/// Unit that counts its invocations.
#[derive(Clone, Default)]
pub struct CountingUnit {
    calls: Arc<AtomicUsize>,
}

impl CountingUnit {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl crate::typed::TaskUnit for CountingUnit {
    fn execute(&self, _monitor: &TaskMonitor, _input: &TaskInput) -> Result<TaskOutput, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TaskOutput::new())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// loggers
// ────────────────────────────────────────────────────────────────────────────

/// Records `(task name, status)` for each status call and error text for each
/// exception call.
#[derive(Default)]
pub struct RecordingLogger {
    statuses: Mutex<Vec<(String, TaskStatus)>>,
    exceptions: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn statuses(&self) -> Vec<(String, TaskStatus)> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().unwrap().clone()
    }
}

impl TaskStatusLogger for RecordingLogger {
    fn log_task_status(&self, monitor: &TaskMonitor, _params: &TaskParams) -> Result<(), LoggerError> {
        let index = monitor.current_task_index();
        let name = monitor.task_name(index).unwrap_or_default().to_string();
        let status = monitor.task_status(index).unwrap_or(TaskStatus::Pending);
        self.statuses.lock().unwrap().push((name, status));
        Ok(())
    }

    fn log_task_exception(&self, _monitor: &TaskMonitor, error: &TaskError) -> Result<(), LoggerError> {
        self.exceptions.lock().unwrap().push(error.to_string());
        Ok(())
    }
}

/// Errors on status calls, panics on exception calls.
#[derive(Default)]
pub struct BrokenLogger;

impl TaskStatusLogger for BrokenLogger {
    fn log_task_status(&self, _monitor: &TaskMonitor, _params: &TaskParams) -> Result<(), LoggerError> {
        Err("status sink unavailable".into())
    }

    fn log_task_exception(&self, _monitor: &TaskMonitor, _error: &TaskError) -> Result<(), LoggerError> {
        panic!("exception sink exploded")
    }
}
