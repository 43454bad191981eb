//! PeriodicRun - 周期実行のハンドル
//!
//! Each run of a periodic schedule gets its own [`TaskMonitor`], so statuses on
//! any one monitor still only move forward. The handle collects those monitors
//! and stops the schedule on cancel.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use super::monitor::TaskMonitor;

#[derive(Debug, Default)]
struct ScheduleState {
    runs: Vec<TaskMonitor>,
    cancel_requested: bool,
    done: bool,
}

struct PeriodicInner {
    task_names: Vec<String>,
    times: u32,
    state: Mutex<ScheduleState>,
    done_cv: Condvar,
    cancel_notify: Notify,
}

/// Shared handle to a periodic schedule. Cheap to clone.
#[derive(Clone)]
pub struct PeriodicRun {
    inner: Arc<PeriodicInner>,
}

impl PeriodicRun {
    pub(crate) fn new(task_names: Vec<String>, times: u32) -> Self {
        Self {
            inner: Arc::new(PeriodicInner {
                task_names,
                times,
                state: Mutex::new(ScheduleState::default()),
                done_cv: Condvar::new(),
                cancel_notify: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScheduleState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn task_names(&self) -> &[String] {
        &self.inner.task_names
    }

    /// Planned number of runs; `None` means until cancelled.
    pub fn times(&self) -> Option<u32> {
        match self.inner.times {
            0 => None,
            n => Some(n),
        }
    }

    /// Runs started so far.
    pub fn run_count(&self) -> usize {
        self.lock().runs.len()
    }

    /// Monitors of every started run, oldest first.
    pub fn runs(&self) -> Vec<TaskMonitor> {
        self.lock().runs.clone()
    }

    pub fn latest(&self) -> Option<TaskMonitor> {
        self.lock().runs.last().cloned()
    }

    /// Stop scheduling further runs and cancel the current one.
    pub fn request_cancel(&self) {
        let current = {
            let mut state = self.lock();
            if state.done || state.cancel_requested {
                return;
            }
            state.cancel_requested = true;
            state.runs.last().cloned()
        };
        tracing::debug!(tasks = ?self.inner.task_names, "periodic schedule cancel requested");
        self.inner.cancel_notify.notify_one();
        if let Some(monitor) = current {
            monitor.request_cancel();
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// No further runs will start and the last one has finished.
    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Block until the schedule is done. `false` on timeout.
    pub fn await_done(&self, timeout: Option<Duration>) -> bool {
        let guard = self.lock();
        match timeout {
            None => {
                self.inner
                    .done_cv
                    .wait_while(guard, |s| !s.done)
                    .unwrap_or_else(PoisonError::into_inner)
                    .done
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

    /// Record a new run. Refused once cancellation was requested.
    pub(crate) fn push_run(&self, monitor: TaskMonitor) -> bool {
        let mut state = self.lock();
        if state.cancel_requested || state.done {
            return false;
        }
        state.runs.push(monitor);
        true
    }

    pub(crate) fn finish(&self) {
        {
            let mut state = self.lock();
            if state.done {
                return;
            }
            state.done = true;
        }
        self.inner.done_cv.notify_all();
    }

    pub(crate) async fn cancelled(&self) {
        if self.is_cancel_requested() {
            return;
        }
        self.inner.cancel_notify.notified().await;
    }
}

impl fmt::Debug for PeriodicRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("PeriodicRun")
            .field("tasks", &self.inner.task_names)
            .field("times", &self.inner.times)
            .field("runs", &state.runs.len())
            .field("cancel_requested", &state.cancel_requested)
            .field("done", &state.done)
            .finish()
    }
}
