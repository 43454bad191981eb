//! TaskMonitor - shared handle for observing a task chain.
//!
//! # 実装詳細
//! - Mutex で全状態を保護（status / output / messages / done / cancel）
//! - Condvar で終端遷移を通知（await_done はビジーループしない）
//! - tokio Notify で遅延開始中のキャンセルを即座に伝える
//!
//! The worker is the only writer of task state; callers read, append messages
//! and request cancellation. Every mutation happens under the one lock, so a
//! reader never sees a half-applied transition.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::domain::{MonitorId, TaskOutput, TaskParams, TaskStatus};

const DETACHED_MAX_MESSAGES: usize = 256;

#[derive(Debug, Clone)]
struct TaskSlot {
    status: TaskStatus,
    output: TaskOutput,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TaskSlot {
    fn new() -> Self {
        Self {
            status: TaskStatus::Pending,
            output: TaskOutput::new(),
            started_at: None,
            finished_at: None,
        }
    }

    fn advance(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_advance_to(next) {
            tracing::warn!(from = ?self.status, to = ?next, "ignored backward status transition");
            return false;
        }
        let now = Utc::now();
        if next == TaskStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.status = next;
        true
    }
}

#[derive(Debug)]
struct MonitorState {
    tasks: Vec<TaskSlot>,
    messages: VecDeque<String>,
    errors: Vec<String>,
    current: usize,
    started: bool,
    done: bool,
    cancel_requested: bool,
}

struct MonitorInner {
    id: MonitorId,
    names: Vec<String>,
    log_messages: bool,
    max_messages: usize,
    state: Mutex<MonitorState>,
    done_cv: Condvar,
    cancel_notify: Notify,
}

/// Shared, thread-safe view of a submitted task chain.
///
/// Cloning is cheap (`Arc`); every clone observes the same chain.
#[derive(Clone)]
pub struct TaskMonitor {
    inner: Arc<MonitorInner>,
}

impl TaskMonitor {
    pub(crate) fn new(names: Vec<String>, log_messages: bool, max_messages: usize) -> Self {
        let tasks = names.iter().map(|_| TaskSlot::new()).collect();
        Self {
            inner: Arc::new(MonitorInner {
                id: MonitorId::generate(),
                names,
                log_messages,
                max_messages: max_messages.max(1),
                state: Mutex::new(MonitorState {
                    tasks,
                    messages: VecDeque::new(),
                    errors: Vec::new(),
                    current: 0,
                    started: false,
                    done: false,
                    cancel_requested: false,
                }),
                done_cv: Condvar::new(),
                cancel_notify: Notify::new(),
            }),
        }
    }

    /// A monitor not attached to any manager, with message logging on.
    ///
    /// Handy for driving a [`crate::typed::TaskUnit`] by hand in tests.
    pub fn detached(task_names: &[&str]) -> Self {
        Self::new(
            task_names.iter().map(|n| n.to_string()).collect(),
            true,
            DETACHED_MAX_MESSAGES,
        )
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> MonitorId {
        self.inner.id
    }

    pub fn task_count(&self) -> usize {
        self.inner.names.len()
    }

    pub fn task_name(&self, index: usize) -> Option<&str> {
        self.inner.names.get(index).map(String::as_str)
    }

    pub fn task_names(&self) -> &[String] {
        &self.inner.names
    }

    /// Non-blocking: has the chain finished (or been aborted)?
    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Worker has picked the chain up and not finished yet.
    pub fn is_running(&self) -> bool {
        let state = self.lock();
        state.started && !state.done
    }

    /// Block until done.
    ///
    /// Returns `false` if `timeout` elapsed first. A timeout does not cancel
    /// anything; call [`TaskMonitor::request_cancel`] for that.
    pub fn await_done(&self, timeout: Option<Duration>) -> bool {
        let guard = self.lock();
        match timeout {
            None => {
                let guard = self
                    .inner
                    .done_cv
                    .wait_while(guard, |s| !s.done)
                    .unwrap_or_else(PoisonError::into_inner);
                guard.done
            }
            Some(timeout) => {
                let (guard, _) = self
                    .inner
                    .done_cv
                    .wait_timeout_while(guard, timeout, |s| !s.done)
                    .unwrap_or_else(PoisonError::into_inner);
                guard.done
            }
        }
    }

    pub fn task_status(&self, index: usize) -> Option<TaskStatus> {
        self.lock().tasks.get(index).map(|t| t.status)
    }

    pub fn task_statuses(&self) -> Vec<TaskStatus> {
        self.lock().tasks.iter().map(|t| t.status).collect()
    }

    pub fn task_output(&self, index: usize) -> Option<TaskOutput> {
        self.lock().tasks.get(index).map(|t| t.output.clone())
    }

    pub fn current_task_index(&self) -> usize {
        self.lock().current
    }

    pub fn current_task_status(&self) -> Option<TaskStatus> {
        let state = self.lock();
        state.tasks.get(state.current).map(|t| t.status)
    }

    /// Ask the running chain to stop. No-op once done.
    pub fn request_cancel(&self) {
        {
            let mut state = self.lock();
            if state.done || state.cancel_requested {
                return;
            }
            state.cancel_requested = true;
        }
        tracing::debug!(monitor = %self.id(), "cancel requested");
        self.inner.cancel_notify.notify_one();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Append a progress message (kept only when the setup logs messages).
    pub fn add_message(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(monitor = %self.id(), "{message}");
        if self.inner.log_messages {
            let mut state = self.lock();
            self.push_message(&mut state, message);
        }
    }

    fn push_message(&self, state: &mut MonitorState, message: String) {
        if state.messages.len() >= self.inner.max_messages {
            state.messages.pop_front();
        }
        state.messages.push_back(message);
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.iter().cloned().collect()
    }

    pub fn last_message(&self) -> Option<String> {
        self.lock().messages.back().cloned()
    }

    pub fn clear_messages(&self) {
        self.lock().messages.clear();
    }

    /// Error text of every faulted task, in order.
    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.lock().errors.is_empty()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.lock();
        MonitorSnapshot {
            id: self.inner.id,
            done: state.done,
            cancel_requested: state.cancel_requested,
            current_task_index: state.current,
            tasks: self
                .inner
                .names
                .iter()
                .zip(&state.tasks)
                .map(|(name, slot)| TaskSnapshot {
                    name: name.clone(),
                    status: slot.status,
                    started_at: slot.started_at,
                    finished_at: slot.finished_at,
                    output: slot.output.values().clone(),
                })
                .collect(),
            messages: state.messages.iter().cloned().collect(),
            errors: state.errors.clone(),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // worker side
    // ────────────────────────────────────────────────────────────────────────

    pub(crate) fn begin(&self) {
        self.lock().started = true;
    }

    /// Pending -> Running, unless cancellation was already requested, in which
    /// case the task goes straight to Canceled and `false` is returned.
    pub(crate) fn start_task(&self, index: usize) -> bool {
        let mut state = self.lock();
        state.current = index;
        let cancel = state.cancel_requested;
        let Some(slot) = state.tasks.get_mut(index) else {
            return false;
        };
        if cancel {
            slot.advance(TaskStatus::Canceled);
            drop(state);
            self.inner.done_cv.notify_all();
            return false;
        }
        slot.advance(TaskStatus::Running)
    }

    /// Running -> Completed / Canceled, keeping the output.
    pub(crate) fn complete_task(&self, index: usize, output: TaskOutput) -> TaskStatus {
        let mut state = self.lock();
        let next = if state.cancel_requested {
            TaskStatus::Canceled
        } else {
            TaskStatus::Completed
        };
        let status = match state.tasks.get_mut(index) {
            Some(slot) => {
                if slot.advance(next) {
                    slot.output = output;
                }
                slot.status
            }
            None => next,
        };
        drop(state);
        self.inner.done_cv.notify_all();
        status
    }

    /// Running -> Faulted. The error is always recorded as a message.
    pub(crate) fn fault_task(&self, index: usize, error: String) {
        let mut state = self.lock();
        if let Some(slot) = state.tasks.get_mut(index) {
            slot.advance(TaskStatus::Faulted);
        }
        state.errors.push(error.clone());
        self.push_message(&mut state, error);
        drop(state);
        self.inner.done_cv.notify_all();
    }

    /// Idempotent; `done` never reverts.
    pub(crate) fn mark_done(&self) {
        {
            let mut state = self.lock();
            if state.done {
                return;
            }
            state.done = true;
        }
        self.inner.done_cv.notify_all();
    }

    /// Resolves once cancellation has been requested.
    pub(crate) async fn cancelled(&self) {
        if self.is_cancel_requested() {
            return;
        }
        // notify_one は permit を保存するので取りこぼさない
        self.inner.cancel_notify.notified().await;
    }
}

impl fmt::Debug for TaskMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TaskMonitor")
            .field("id", &self.inner.id)
            .field("tasks", &self.inner.names)
            .field("done", &state.done)
            .field("cancel_requested", &state.cancel_requested)
            .finish()
    }
}

/// Serializable point-in-time view of a monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub id: MonitorId,
    pub done: bool,
    pub cancel_requested: bool,
    pub current_task_index: usize,
    pub tasks: Vec<TaskSnapshot>,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub output: TaskParams,
}
