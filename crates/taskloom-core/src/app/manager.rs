//! TaskManager - タスクチェーンの実行管理
//!
//! # 実行モデル
//! - TaskUnit は同期処理なので `spawn_blocking` 上で実行
//! - 同時実行数は Semaphore（permit = max_threads）で制限
//! - 遅延開始は tokio timer で待つ（待機中は permit を持たない）
//! - キャンセルは協調的: フラグを立てるだけで、実行中の unit は止めない
//! - 周期実行は `tokio::time::interval` で刻み、回ごとに新しい monitor を作る
//!   （前の回が終わるまで次の回は始まらない）
//!
//! # 失敗の扱い
//! - 同期エラー（UnknownTask, TaskAlreadyRunning, ...）は呼び出し元へ返す
//! - 実行中のエラーは monitor と status logger にだけ現れる

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior};

use super::monitor::TaskMonitor;
use super::periodic::PeriodicRun;
use crate::config::EngineConfig;
use crate::domain::{ParamConfig, TaskInput, TaskParams, TaskSetup, TaskStatus};
use crate::error::TaskError;
use crate::impls::TracingStatusLogger;
use crate::ports::{LoggerError, TaskStatusLogger};
use crate::typed::{ExecLimit, TaskHandlerDescriptor, TaskRegistry};

/// Bookkeeping shared between the manager and its in-flight chains.
#[derive(Default)]
struct ChainBook {
    /// Names of `AllowSingle` tasks currently inside a chain.
    exclusive: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
}

impl ChainBook {
    fn reserve(&self, names: &BTreeSet<String>) -> Result<(), TaskError> {
        let mut running = self.exclusive.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(busy) = names.iter().find(|n| running.contains(*n)) {
            return Err(TaskError::TaskAlreadyRunning(busy.clone()));
        }
        running.extend(names.iter().cloned());
        Ok(())
    }

    fn release(&self, names: &BTreeSet<String>) {
        let mut running = self.exclusive.lock().unwrap_or_else(PoisonError::into_inner);
        for name in names {
            running.remove(name);
        }
    }
}

#[derive(Clone)]
struct Step {
    descriptor: Arc<TaskHandlerDescriptor>,
    input: TaskInput,
}

/// A resolved and validated setup. Stamps out one chain per run.
#[derive(Clone)]
struct ChainPlan {
    steps: Vec<Step>,
    fail_fast: bool,
    log_messages: bool,
    max_messages: usize,
    logger: Arc<dyn TaskStatusLogger>,
    /// `AllowSingle` task names the caller must reserve.
    exclusive: BTreeSet<String>,
}

impl ChainPlan {
    /// New chain with a fresh monitor; `exclusive` is released when it drops.
    fn chain(&self, exclusive: BTreeSet<String>, book: &Arc<ChainBook>) -> Chain {
        let names = self
            .steps
            .iter()
            .map(|s| s.descriptor.name().to_string())
            .collect();
        book.in_flight.fetch_add(1, Ordering::SeqCst);
        Chain {
            monitor: TaskMonitor::new(names, self.log_messages, self.max_messages),
            steps: self.steps.clone(),
            fail_fast: self.fail_fast,
            logger: Arc::clone(&self.logger),
            exclusive,
            book: Arc::clone(book),
        }
    }
}

/// One submitted setup, owned by whichever worker runs it.
///
/// Dropping a chain (after running, or unrun on runtime shutdown) releases its
/// reservations and marks the monitor done.
struct Chain {
    monitor: TaskMonitor,
    steps: Vec<Step>,
    fail_fast: bool,
    logger: Arc<dyn TaskStatusLogger>,
    exclusive: BTreeSet<String>,
    book: Arc<ChainBook>,
}

impl Chain {
    fn run(&self) {
        self.monitor.begin();
        for (index, step) in self.steps.iter().enumerate() {
            if !self.monitor.start_task(index) {
                tracing::debug!(monitor = %self.monitor.id(), task = step.input.task_name(), "canceled before start");
                self.log_status(step);
                break;
            }
            self.log_status(step);

            let result = catch_unwind(AssertUnwindSafe(|| {
                step.descriptor.handler().execute(&self.monitor, &step.input)
            }))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload))));

            match result {
                Ok(output) => {
                    let status = self.monitor.complete_task(index, output);
                    self.log_status(step);
                    if status == TaskStatus::Canceled {
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        monitor = %self.monitor.id(),
                        task = step.input.task_name(),
                        error = %error,
                        "task faulted"
                    );
                    self.monitor.fault_task(index, error.to_string());
                    self.log_status(step);
                    self.log_exception(&error);
                    if self.fail_fast {
                        break;
                    }
                }
            }
        }
    }

    fn log_status(&self, step: &Step) {
        self.call_logger(|logger| logger.log_task_status(&self.monitor, step.input.params()));
    }

    fn log_exception(&self, error: &TaskError) {
        self.call_logger(|logger| logger.log_task_exception(&self.monitor, error));
    }

    // logger の失敗・panic はチェーンに影響させない
    fn call_logger<F>(&self, call: F)
    where
        F: FnOnce(&dyn TaskStatusLogger) -> Result<(), LoggerError>,
    {
        match catch_unwind(AssertUnwindSafe(|| call(self.logger.as_ref()))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(monitor = %self.monitor.id(), error = %error, "status logger failed");
            }
            Err(payload) => {
                tracing::warn!(
                    monitor = %self.monitor.id(),
                    panic = %panic_message(payload),
                    "status logger panicked"
                );
            }
        }
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        self.book.release(&self.exclusive);
        self.book.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.monitor.mark_done();
    }
}

/// Holds a periodic schedule's reservations for as long as its driver lives.
struct ScheduleGuard {
    schedule: PeriodicRun,
    exclusive: BTreeSet<String>,
    book: Arc<ChainBook>,
}

impl Drop for ScheduleGuard {
    fn drop(&mut self) {
        self.book.release(&self.exclusive);
        self.schedule.finish();
    }
}

/// Run a chain on the blocking pool once a permit is free.
async fn run_on_pool(permits: Arc<Semaphore>, chain: Chain) {
    // Semaphore は close しないので Err は来ない。来たら chain の drop で done になる
    let Ok(permit) = permits.acquire_owned().await else {
        return;
    };

    let monitor_id = chain.monitor.id();
    let joined = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        chain.run();
    })
    .await;
    if let Err(error) = joined {
        tracing::error!(monitor = %monitor_id, error = %error, "task chain worker failed");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn single_task(name: &str, params: TaskParams, log_messages: bool) -> TaskSetup {
    let builder = TaskSetup::new_builder().add_task(name).set_params(params);
    if log_messages {
        builder.log_messages().build()
    } else {
        builder.build()
    }
}

fn task_list(names: &[&str], params: TaskParams, log_messages: bool, fail_fast: bool) -> TaskSetup {
    let mut builder = TaskSetup::new_builder().set_params(params);
    for name in names {
        builder = builder.add_task(*name);
    }
    if log_messages {
        builder = builder.log_messages();
    }
    if !fail_fast {
        builder = builder.run_independently();
    }
    builder.build()
}

/// TaskManager はタスクチェーンを受け付けて実行する
///
/// Either owns a tokio runtime ([`TaskManager::new`]) or runs on a borrowed
/// one ([`TaskManager::with_handle`]).
pub struct TaskManager {
    registry: Arc<TaskRegistry>,
    config: EngineConfig,
    runtime: Option<Runtime>,
    handle: Handle,
    permits: Arc<Semaphore>,
    book: Arc<ChainBook>,
    loggers: RwLock<HashMap<String, Arc<dyn TaskStatusLogger>>>,
    default_logger: RwLock<Arc<dyn TaskStatusLogger>>,
}

impl TaskManager {
    /// Build a manager with its own multi-threaded runtime.
    pub fn new(registry: Arc<TaskRegistry>, config: EngineConfig) -> Result<Self, TaskError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.effective_timer_threads())
            .max_blocking_threads(config.effective_max_threads())
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::assemble(registry, config, Some(runtime), handle))
    }

    /// Build a manager on an existing runtime.
    pub fn with_handle(registry: Arc<TaskRegistry>, config: EngineConfig, handle: Handle) -> Self {
        Self::assemble(registry, config, None, handle)
    }

    fn assemble(
        registry: Arc<TaskRegistry>,
        config: EngineConfig,
        runtime: Option<Runtime>,
        handle: Handle,
    ) -> Self {
        tracing::debug!(
            max_threads = config.effective_max_threads(),
            owned_runtime = runtime.is_some(),
            "task manager created"
        );
        Self {
            permits: Arc::new(Semaphore::new(config.effective_max_threads())),
            registry,
            config,
            runtime,
            handle,
            book: Arc::new(ChainBook::default()),
            loggers: RwLock::new(HashMap::new()),
            default_logger: RwLock::new(Arc::new(TracingStatusLogger::new())),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Chains submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.book.in_flight.load(Ordering::SeqCst)
    }

    /// Register a named logger that setups can select with `use_status_logger`.
    pub fn add_status_logger(&self, name: impl Into<String>, logger: Arc<dyn TaskStatusLogger>) {
        let name = name.into();
        tracing::debug!(logger = %name, "status logger registered");
        self.loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, logger);
    }

    /// Logger used by setups that do not name one.
    pub fn set_default_status_logger(&self, logger: Arc<dyn TaskStatusLogger>) {
        *self.default_logger.write().unwrap_or_else(PoisonError::into_inner) = logger;
    }

    // ────────────────────────────────────────────────────────────────────────
    // 単一タスク
    // ────────────────────────────────────────────────────────────────────────

    /// Run one task off the caller's thread; the monitor is live immediately.
    pub fn execute_task(
        &self,
        name: &str,
        params: TaskParams,
        log_messages: bool,
    ) -> Result<TaskMonitor, TaskError> {
        self.submit(&single_task(name, params, log_messages))
    }

    /// Run one task on the caller's thread and return once it is terminal.
    pub fn execute_task_synchronously(
        &self,
        name: &str,
        params: TaskParams,
        log_messages: bool,
    ) -> Result<TaskMonitor, TaskError> {
        let chain = self.prepare(&single_task(name, params, log_messages))?;
        let monitor = chain.monitor.clone();
        chain.run();
        drop(chain);
        Ok(monitor)
    }

    pub fn start_task(
        &self,
        name: &str,
        params: TaskParams,
        log_messages: bool,
    ) -> Result<TaskMonitor, TaskError> {
        self.submit(&single_task(name, params, log_messages))
    }

    /// Returns a Pending monitor; the task starts after `delay_ms`.
    pub fn schedule_task_to_run_after(
        &self,
        name: &str,
        params: TaskParams,
        log_messages: bool,
        delay_ms: u64,
    ) -> Result<TaskMonitor, TaskError> {
        self.submit_after(
            &single_task(name, params, log_messages),
            Duration::from_millis(delay_ms),
        )
    }

    // ────────────────────────────────────────────────────────────────────────
    // 複数タスク（params は全タスク共通）
    // ────────────────────────────────────────────────────────────────────────

    pub fn execute_tasks(
        &self,
        names: &[&str],
        params: TaskParams,
        log_messages: bool,
        fail_fast: bool,
    ) -> Result<TaskMonitor, TaskError> {
        self.submit(&task_list(names, params, log_messages, fail_fast))
    }

    pub fn start_tasks(
        &self,
        names: &[&str],
        params: TaskParams,
        log_messages: bool,
        fail_fast: bool,
    ) -> Result<TaskMonitor, TaskError> {
        self.submit(&task_list(names, params, log_messages, fail_fast))
    }

    pub fn schedule_tasks_to_run_after(
        &self,
        names: &[&str],
        params: TaskParams,
        log_messages: bool,
        fail_fast: bool,
        delay_ms: u64,
    ) -> Result<TaskMonitor, TaskError> {
        self.submit_after(
            &task_list(names, params, log_messages, fail_fast),
            Duration::from_millis(delay_ms),
        )
    }

    // ────────────────────────────────────────────────────────────────────────
    // 周期実行（times = 0 は cancel されるまで）
    // ────────────────────────────────────────────────────────────────────────

    /// Run one task every `period_ms` after `initial_delay_ms`, `times` runs in
    /// total. Each run reports through its own monitor on the returned handle.
    pub fn schedule_task_to_run_periodically(
        &self,
        name: &str,
        params: TaskParams,
        log_messages: bool,
        initial_delay_ms: u64,
        period_ms: u64,
        times: u32,
    ) -> Result<PeriodicRun, TaskError> {
        self.submit_periodically(
            &single_task(name, params, log_messages),
            Duration::from_millis(initial_delay_ms),
            Duration::from_millis(period_ms),
            times,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn schedule_tasks_to_run_periodically(
        &self,
        names: &[&str],
        params: TaskParams,
        log_messages: bool,
        fail_fast: bool,
        initial_delay_ms: u64,
        period_ms: u64,
        times: u32,
    ) -> Result<PeriodicRun, TaskError> {
        self.submit_periodically(
            &task_list(names, params, log_messages, fail_fast),
            Duration::from_millis(initial_delay_ms),
            Duration::from_millis(period_ms),
            times,
        )
    }

    /// Submit a setup to run repeatedly. The setup's own delay is ignored in
    /// favour of `initial_delay`.
    ///
    /// `AllowSingle` tasks stay reserved from submission until the schedule
    /// finishes, including the gaps between runs.
    pub fn submit_periodically(
        &self,
        setup: &TaskSetup,
        initial_delay: Duration,
        period: Duration,
        times: u32,
    ) -> Result<PeriodicRun, TaskError> {
        if period.is_zero() {
            return Err(TaskError::InvalidPeriod);
        }
        let plan = self.plan(setup)?;
        self.book.reserve(&plan.exclusive)?;

        let schedule = PeriodicRun::new(setup.task_names().map(str::to_string).collect(), times);
        tracing::info!(
            tasks = ?schedule.task_names(),
            initial_delay_ms = u64::try_from(initial_delay.as_millis()).unwrap_or(u64::MAX),
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            times,
            "periodic schedule submitted"
        );
        self.dispatch_periodic(plan, schedule.clone(), initial_delay, period);
        Ok(schedule)
    }

    // ────────────────────────────────────────────────────────────────────────
    // setup 単位
    // ────────────────────────────────────────────────────────────────────────

    /// Submit a setup, honouring its own delay.
    pub fn submit(&self, setup: &TaskSetup) -> Result<TaskMonitor, TaskError> {
        self.submit_after(setup, setup.delay())
    }

    /// Submit a setup to start after `delay` (zero = as soon as a worker is free).
    pub fn submit_after(&self, setup: &TaskSetup, delay: Duration) -> Result<TaskMonitor, TaskError> {
        let chain = self.prepare(setup)?;
        let monitor = chain.monitor.clone();
        tracing::info!(
            monitor = %monitor.id(),
            tasks = ?monitor.task_names(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "task chain submitted"
        );
        self.dispatch(chain, delay);
        Ok(monitor)
    }

    /// Resolve, validate and reserve everything before any work starts.
    fn prepare(&self, setup: &TaskSetup) -> Result<Chain, TaskError> {
        let plan = self.plan(setup)?;
        self.book.reserve(&plan.exclusive)?;
        Ok(plan.chain(plan.exclusive.clone(), &self.book))
    }

    fn plan(&self, setup: &TaskSetup) -> Result<ChainPlan, TaskError> {
        if setup.is_empty() {
            return Err(TaskError::EmptyTaskSetup);
        }

        let descriptors = setup
            .task_names()
            .map(|name| self.registry.resolve(name))
            .collect::<Result<Vec<_>, _>>()?;

        let logger = self.resolve_logger(setup.status_logger())?;

        let exclusive = descriptors
            .iter()
            .filter(|d| d.limit() == ExecLimit::AllowSingle)
            .map(|d| d.name().to_string())
            .collect();

        let steps = descriptors
            .into_iter()
            .zip(setup.tasks())
            .map(|(descriptor, spec)| Step {
                input: TaskInput::from_declared(
                    descriptor.name(),
                    descriptor.params(),
                    &spec.parameters,
                ),
                descriptor,
            })
            .collect();

        Ok(ChainPlan {
            steps,
            fail_fast: setup.fail_fast(),
            log_messages: setup.log_messages(),
            max_messages: self.config.max_monitor_messages,
            logger,
            exclusive,
        })
    }

    fn resolve_logger(&self, name: Option<&str>) -> Result<Arc<dyn TaskStatusLogger>, TaskError> {
        match name {
            None => Ok(Arc::clone(
                &self.default_logger.read().unwrap_or_else(PoisonError::into_inner),
            )),
            Some(name) => self
                .loggers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned()
                .ok_or_else(|| TaskError::UnknownStatusLogger(name.to_string())),
        }
    }

    fn dispatch(&self, chain: Chain, delay: Duration) {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            if !delay.is_zero() {
                // キャンセルされたら待機を打ち切る（タスクは Canceled になる）
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = chain.monitor.cancelled() => {}
                }
            }

            run_on_pool(permits, chain).await;
        });
    }

    fn dispatch_periodic(
        &self,
        plan: ChainPlan,
        schedule: PeriodicRun,
        initial_delay: Duration,
        period: Duration,
    ) {
        let permits = Arc::clone(&self.permits);
        let book = Arc::clone(&self.book);
        let guard = ScheduleGuard {
            schedule: schedule.clone(),
            exclusive: plan.exclusive.clone(),
            book: Arc::clone(&self.book),
        };
        self.handle.spawn(async move {
            let _guard = guard;
            let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
            // 実行が周期より長引いたら、取りこぼした回はまとめず後ろへずらす
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = schedule.cancelled() => break,
                }

                // 予約は schedule 全体で持つので、各回の chain は何も解放しない
                let chain = plan.chain(BTreeSet::new(), &book);
                if !schedule.push_run(chain.monitor.clone()) {
                    break;
                }
                tracing::debug!(
                    monitor = %chain.monitor.id(),
                    run = schedule.run_count(),
                    "periodic run started"
                );
                run_on_pool(Arc::clone(&permits), chain).await;

                if schedule
                    .times()
                    .is_some_and(|times| schedule.run_count() >= times as usize)
                {
                    break;
                }
            }
            tracing::debug!(tasks = ?schedule.task_names(), runs = schedule.run_count(), "periodic schedule finished");
        });
    }

    // ────────────────────────────────────────────────────────────────────────
    // introspection
    // ────────────────────────────────────────────────────────────────────────

    /// `false` for a hand-written unit, `UnknownTask` if nothing is registered.
    pub fn is_taskable_method(&self, name: &str) -> Result<bool, TaskError> {
        Ok(self.registry.resolve(name)?.is_taskable_method())
    }

    /// Descriptor of a taskable method. Fails for hand-written units as well.
    pub fn get_taskable_method_config(
        &self,
        name: &str,
    ) -> Result<Arc<TaskHandlerDescriptor>, TaskError> {
        let descriptor = self.registry.resolve(name)?;
        if !descriptor.is_taskable_method() {
            return Err(TaskError::UnknownTask(name.to_string()));
        }
        Ok(descriptor)
    }

    pub fn get_all_taskable_method_configs(&self) -> Vec<Arc<TaskHandlerDescriptor>> {
        self.registry
            .descriptors()
            .into_iter()
            .filter(|d| d.is_taskable_method())
            .collect()
    }

    pub fn get_task_parameters(&self, name: &str) -> Result<Vec<ParamConfig>, TaskError> {
        Ok(self.registry.resolve(name)?.params().to_vec())
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            tracing::debug!(in_flight = self.in_flight(), "shutting down task manager runtime");
            runtime.shutdown_background();
        }
    }
}
