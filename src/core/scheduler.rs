//! # Scheduler: the planning loop and its host-facing surface.
//!
//! The [`Scheduler`] owns the task registry, the notification broker, and
//! the control loop that repeatedly plans the next wake-up, sleeps until it,
//! and fires the due tasks.
//!
//! ## High-level architecture
//! ```text
//! Registry mutations (any thread):          Control loop (one logical task):
//!   add_task / remove_task /                  loop {
//!   update_task / remove_all_tasks              plan    = next_fire(registry, now)
//!        │                                      delay   = plan.at - now (rounded up)
//!        │ lock ──► mutate registry             select! {
//!        └────────► reset():                      interrupt.cancelled() ─► re-plan
//!                     interrupt.cancel()          sleep(delay)          ─► fire
//!                     interrupt = fresh         }
//!                     (child of external)       revalidate due set under lock
//!                                               publish ScheduledEvent ─► Broker
//!                                               execute due tasks, one at a time
//!                                             }
//! ```
//!
//! ## Rules
//! - One mutex guards the registry, the run flags, and the current
//!   interrupt token; it is never held across an await.
//! - The timed sleep is the loop's only suspension point. Every mutation
//!   while running cancels-and-replaces the interrupt token, so the loop
//!   wakes early and re-plans instead of honouring a stale deadline.
//! - A wake caused by a reset never executes the due set computed before
//!   the sleep; only a timer-elapsed wake fires, and even then the due set
//!   is re-validated against the live registry first.
//! - Task failures and panics are contained per task; the loop only ends
//!   via [`stop`](Scheduler::stop), external cancellation, or
//!   [`dispose`](Scheduler::dispose).
//!
//! ## Example
//! ```no_run
//! use cronvisor::Scheduler;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), cronvisor::SchedulerError> {
//!     let scheduler = Scheduler::new();
//!
//!     scheduler.add_fn("0 0 * * * *", |_ctx| {
//!         println!("hourly tick");
//!         Ok(())
//!     })?;
//!
//!     let _watch = scheduler.subscribe(|event| {
//!         println!("firing {} task(s) at {}", event.task_ids().len(), event.signal_time());
//!     })?;
//!
//!     let cancellation = CancellationToken::new();
//!     scheduler.run(cancellation).await
//! }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::core::registry::TaskRegistry;
use crate::core::{executor, planner, timing};
use crate::error::{SchedulerError, TaskError};
use crate::events::{Broker, ScheduledEvent, Subscription};
use crate::tasks::{Task, TaskId};

/// Mutable state shared between the loop and the mutation API.
struct State {
    registry: TaskRegistry,
    /// Whole-run cancellation signal, recorded at start.
    external: CancellationToken,
    /// Per-sleep-interval interrupt, child of `external`, replaced on every
    /// reset so each sleep has its own disposable wake signal.
    interrupt: CancellationToken,
    running: bool,
    disposed: bool,
}

/// Cron-driven in-process task scheduler.
///
/// Cheap to clone; clones are handles onto the same registry, loop state,
/// and notification channel, which is how the non-blocking
/// [`start`](Scheduler::start) hands the loop to a background tokio task
/// while the caller keeps mutating the registry.
#[derive(Clone)]
pub struct Scheduler {
    cfg: SchedulerConfig,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<State>>,
    broker: Broker<ScheduledEvent>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler with default configuration and the system clock.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a scheduler with the given configuration.
    pub fn with_config(cfg: SchedulerConfig) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    /// Creates a scheduler with an injected clock, for deterministic tests
    /// or hosts with their own time source.
    pub fn with_clock(cfg: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            clock,
            state: Arc::new(Mutex::new(State {
                registry: TaskRegistry::new(),
                external: CancellationToken::new(),
                interrupt: CancellationToken::new(),
                running: false,
                disposed: false,
            })),
            broker: Broker::new(),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Whether the loop is currently running.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    // ---------------------------
    // Registry surface
    // ---------------------------

    /// Adds a task to the registry.
    ///
    /// Fails with [`SchedulerError::DuplicateTask`] if the id is already
    /// registered. If the loop is running it wakes and re-plans, so a task
    /// due sooner than the current deadline takes effect promptly.
    pub fn add_task(&self, task: Task) -> Result<(), SchedulerError> {
        debug!(task = %self.cfg.logging.label(task.id(), task.name()), "add task");
        self.with_registry(|registry| match registry.add(task) {
            Ok(()) => (Ok(()), true),
            Err(err) => (Err(err), false),
        })
    }

    /// Parses `expression` and registers a synchronous callback under a
    /// generated id, which is returned.
    pub fn add_fn<F>(&self, expression: &str, f: F) -> Result<TaskId, SchedulerError>
    where
        F: Fn(CancellationToken) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        let schedule: Schedule = expression.parse()?;
        let task = Task::new(schedule, f);
        let id = task.id();
        self.add_task(task)?;
        Ok(id)
    }

    /// Parses `expression` and registers an asynchronous callback under a
    /// generated id, which is returned.
    pub fn add_async_fn<F, Fut>(&self, expression: &str, f: F) -> Result<TaskId, SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let schedule: Schedule = expression.parse()?;
        let task = Task::new_async(schedule, f);
        let id = task.id();
        self.add_task(task)?;
        Ok(id)
    }

    /// Removes a task, returning whether it was present. Never fails for
    /// unknown ids.
    pub fn remove_task(&self, id: TaskId) -> bool {
        debug!(task_id = %id, "remove task");
        let removed = self.with_registry(|registry| {
            let removed = registry.remove(id);
            (removed, removed)
        });
        if !removed {
            warn!(task_id = %id, "remove task: id not found");
        }
        removed
    }

    /// Removes a batch of tasks, reporting the per-id outcome in input
    /// order. The result has one entry per input id; ids that were not
    /// registered report `false`.
    pub fn remove_tasks(&self, ids: &[TaskId]) -> Vec<(TaskId, bool)> {
        self.with_registry(|registry| {
            let results = registry.remove_many(ids);
            let changed = results.iter().any(|(_, removed)| *removed);
            (results, changed)
        })
    }

    /// Empties the registry.
    pub fn remove_all_tasks(&self) {
        self.with_registry(|registry| {
            let dropped = registry.clear();
            debug!(count = dropped, "removed all tasks");
            ((), true)
        })
    }

    /// Replaces the schedule of a registered task.
    ///
    /// Fails with [`SchedulerError::TaskNotFound`] for unknown ids.
    pub fn update_task(&self, id: TaskId, schedule: Schedule) -> Result<(), SchedulerError> {
        debug!(task_id = %id, "update task schedule");
        self.with_registry(|registry| match registry.update(id, schedule) {
            Ok(()) => (Ok(()), true),
            Err(err) => (Err(err), false),
        })
    }

    /// Returns a clone of the task with the given id, if registered.
    pub fn get_task_by_id(&self, id: TaskId) -> Option<Task> {
        self.state.lock().registry.get(id).cloned()
    }

    /// Returns a snapshot of all registered tasks, safe to iterate while
    /// the registry keeps mutating.
    pub fn get_tasks(&self) -> Vec<Task> {
        self.state.lock().registry.snapshot()
    }

    /// Runs a registry mutation under the state lock and resets the loop
    /// when the mutation changed anything while the loop is running.
    fn with_registry<R>(&self, f: impl FnOnce(&mut TaskRegistry) -> (R, bool)) -> R {
        let mut state = self.state.lock();
        let (out, changed) = f(&mut state.registry);
        if changed && state.running {
            Self::reset_locked(&mut state);
        }
        out
    }

    /// Cancels the current sleep interval and installs a fresh interrupt
    /// token, forcing the loop to re-plan.
    fn reset_locked(state: &mut State) {
        state.interrupt.cancel();
        state.interrupt = state.external.child_token();
        debug!("scheduler reset");
    }

    // ---------------------------
    // Notification surface
    // ---------------------------

    /// Registers a handler invoked right before each batch executes.
    ///
    /// Keep the returned guard alive for as long as the handler should
    /// receive events, or [`Subscription::detach`] it.
    pub fn subscribe(
        &self,
        handler: impl Fn(&ScheduledEvent) + Send + Sync + 'static,
    ) -> Result<Subscription<ScheduledEvent>, SchedulerError> {
        self.broker.subscribe(handler)
    }

    /// Registers a handler gated by a filter predicate, e.g. on
    /// [`ScheduledEvent::contains`] for a single task's firings.
    pub fn subscribe_filtered(
        &self,
        handler: impl Fn(&ScheduledEvent) + Send + Sync + 'static,
        filter: impl Fn(&ScheduledEvent) -> bool + Send + Sync + 'static,
    ) -> Result<Subscription<ScheduledEvent>, SchedulerError> {
        self.broker.subscribe_filtered(handler, filter)
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Runs the loop until `cancellation` fires or [`stop`](Scheduler::stop)
    /// is called. Blocks the caller for the whole run.
    ///
    /// Termination through either path is the expected outcome and returns
    /// `Ok(())`; the only errors are [`SchedulerError::AlreadyRunning`] and
    /// [`SchedulerError::Disposed`], raised before the loop starts.
    pub async fn run(&self, cancellation: CancellationToken) -> Result<(), SchedulerError> {
        self.begin(cancellation)?;
        self.run_loop().await;
        Ok(())
    }

    /// Launches the loop on a background tokio task and returns
    /// immediately. State checks happen synchronously, so the error cases
    /// match [`run`](Scheduler::run).
    pub fn start(
        &self,
        cancellation: CancellationToken,
    ) -> Result<tokio::task::JoinHandle<()>, SchedulerError> {
        self.begin(cancellation)?;
        let scheduler = self.clone();
        Ok(tokio::spawn(async move { scheduler.run_loop().await }))
    }

    /// Halts the loop without waiting for in-flight task callbacks.
    ///
    /// Fails with [`SchedulerError::NotRunning`] when the loop is not
    /// running. The scheduler can be started again afterwards with a fresh
    /// cancellation token.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        info!("stopping scheduler");
        let mut state = self.state.lock();
        if !state.running {
            return Err(SchedulerError::NotRunning);
        }
        state.interrupt.cancel();
        state.running = false;
        Ok(())
    }

    /// Terminal cleanup: stops the loop if running, empties the registry,
    /// and detaches all subscribers. Idempotent; repeated calls are no-ops.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.registry.clear();
            if state.running {
                state.interrupt.cancel();
                state.running = false;
            }
            state.disposed = true;
        }
        self.broker.dispose();
        debug!("scheduler disposed");
    }

    fn begin(&self, external: CancellationToken) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(SchedulerError::Disposed);
        }
        if state.running {
            return Err(SchedulerError::AlreadyRunning);
        }
        state.interrupt = external.child_token();
        state.external = external;
        state.running = true;
        debug!("scheduler started");
        Ok(())
    }

    // ---------------------------
    // The loop
    // ---------------------------

    async fn run_loop(&self) {
        loop {
            let (tasks, external, interrupt) = {
                let state = self.state.lock();
                if !state.running {
                    break;
                }
                (
                    state.registry.snapshot(),
                    state.external.clone(),
                    state.interrupt.clone(),
                )
            };

            if external.is_cancelled() {
                debug!("cancellation requested");
                break;
            }

            let now = self.clock.now_utc();
            let plan = planner::next_fire(&tasks, now, self.cfg.time_kind);

            let fired = match &plan {
                None => {
                    info!("scheduler is waiting for tasks; add a task to begin scheduling");
                    interrupt.cancelled().await;
                    false
                }
                Some(plan) => {
                    let delay = (plan.at - now).to_std().unwrap_or(Duration::ZERO);
                    let delay = timing::round_up(delay, self.cfg.max_rounding);
                    info!(
                        next_occurrence = %plan.at,
                        delay_ms = delay.as_millis() as u64,
                        due = plan.due.len(),
                        "scheduling next event"
                    );
                    tokio::select! {
                        biased;
                        _ = interrupt.cancelled() => false,
                        _ = tokio::time::sleep(delay) => true,
                    }
                }
            };

            if !self.state.lock().running {
                break;
            }
            if external.is_cancelled() {
                debug!("cancellation requested");
                break;
            }
            if !fired {
                // woken by a reset: the registry changed, the pre-sleep due
                // set no longer applies and must not fire early
                continue;
            }
            let Some(plan) = plan else {
                continue;
            };

            // revalidate: tasks removed while the loop slept must not run
            let due: Vec<Task> = {
                let state = self.state.lock();
                state
                    .registry
                    .tasks()
                    .iter()
                    .filter(|task| plan.due.contains(&task.id()))
                    .cloned()
                    .collect()
            };
            if due.is_empty() {
                continue;
            }

            self.run_batch(&due, &interrupt).await;
        }

        let mut state = self.state.lock();
        state.running = false;
        debug!("scheduler stopped");
    }

    /// Publishes the notification and executes one batch of due tasks
    /// sequentially, stopping early if the batch's interrupt token fires.
    async fn run_batch(&self, due: &[Task], interrupt: &CancellationToken) {
        let started = self.clock.now_utc();
        let ids: Vec<TaskId> = due.iter().map(Task::id).collect();
        debug!(signal_time = %started, count = due.len(), "starting scheduled batch");

        self.broker.publish(&ScheduledEvent::new(started, ids));

        for task in due {
            if interrupt.is_cancelled() {
                debug!("batch interrupted");
                break;
            }
            executor::execute(task, interrupt.clone(), &self.cfg.logging).await;
        }

        let elapsed = (self.clock.now_utc() - started).to_std().unwrap_or_default();
        if elapsed > self.cfg.duration_warning {
            warn!(elapsed_ms = elapsed.as_millis() as u64, "batch execution finished slowly");
        } else {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "batch execution finished");
        }
    }

    // ---------------------------
    // Preview
    // ---------------------------

    /// Returns the planned execution instants and the tasks firing at each,
    /// grouped by instant and sorted ascending.
    ///
    /// With `end`, every occurrence in `[start, end)` is listed; without,
    /// only the single next occurrence per task. `start` defaults to now.
    /// Purely observational; the loop never consults this.
    pub fn next_occurrences(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<(DateTime<Utc>, Vec<Task>)> {
        let tasks = self.get_tasks();
        let start = start.unwrap_or_else(|| self.clock.now_utc());
        let kind = self.cfg.time_kind;

        let mut grouped: BTreeMap<DateTime<Utc>, Vec<Task>> = BTreeMap::new();
        for task in tasks {
            match end {
                Some(end) => {
                    for at in planner::occurrences_between(task.schedule(), start, end, kind) {
                        grouped.entry(at).or_default().push(task.clone());
                    }
                }
                None => {
                    if let Some(at) = planner::next_occurrence(task.schedule(), start, kind) {
                        grouped.entry(at).or_default().push(task.clone());
                    }
                }
            }
        }
        grouped.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute_task() -> Task {
        Task::new("0 * * * * *".parse().unwrap(), |_| Ok(()))
    }

    fn at(iso: &str) -> DateTime<Utc> {
        iso.parse().unwrap()
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let scheduler = Scheduler::new();
        let id = TaskId::new();
        scheduler.add_task(minute_task().with_id(id)).unwrap();

        let err = scheduler.add_task(minute_task().with_id(id)).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateTask { .. }));
        assert_eq!(scheduler.get_tasks().len(), 1);
    }

    #[test]
    fn test_add_fn_rejects_bad_expression() {
        let scheduler = Scheduler::new();
        let err = scheduler.add_fn("not a cron line", |_| Ok(())).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
        assert!(scheduler.get_tasks().is_empty());
    }

    #[test]
    fn test_update_unknown_id_errors() {
        let scheduler = Scheduler::new();
        let err = scheduler
            .update_task(TaskId::new(), "0 * * * * *".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound { .. }));
    }

    #[test]
    fn test_remove_tasks_reports_mixed_outcomes() {
        let scheduler = Scheduler::new();
        let a = minute_task();
        let b = minute_task();
        let (a_id, b_id) = (a.id(), b.id());
        scheduler.add_task(a).unwrap();
        scheduler.add_task(b).unwrap();

        let missing = TaskId::new();
        let results = scheduler.remove_tasks(&[a_id, missing, b_id]);

        assert_eq!(results.len(), 3);
        assert_eq!(results, vec![(a_id, true), (missing, false), (b_id, true)]);
        assert!(scheduler.get_tasks().is_empty());
    }

    #[test]
    fn test_stop_when_stopped_errors() {
        let scheduler = Scheduler::new();
        assert!(matches!(scheduler.stop(), Err(SchedulerError::NotRunning)));
    }

    #[test]
    fn test_dispose_is_idempotent_and_terminal() {
        let scheduler = Scheduler::new();
        scheduler.add_task(minute_task()).unwrap();

        scheduler.dispose();
        assert!(scheduler.get_tasks().is_empty());

        scheduler.dispose();
        assert!(scheduler.get_tasks().is_empty());

        assert!(matches!(
            scheduler.subscribe(|_| {}),
            Err(SchedulerError::ChannelDisposed)
        ));
    }

    #[tokio::test]
    async fn test_run_after_dispose_rejected() {
        let scheduler = Scheduler::new();
        scheduler.dispose();
        let err = scheduler.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Disposed));
    }

    #[test]
    fn test_next_occurrences_groups_ties() {
        let scheduler = Scheduler::new();
        let a = minute_task();
        let b = minute_task();
        let hourly = Task::new("0 0 * * * *".parse().unwrap(), |_| Ok(()));
        let (a_id, b_id, hourly_id) = (a.id(), b.id(), hourly.id());
        scheduler.add_task(a).unwrap();
        scheduler.add_task(b).unwrap();
        scheduler.add_task(hourly).unwrap();

        let upcoming = scheduler.next_occurrences(Some(at("2000-01-01T12:30:30Z")), None);

        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].0, at("2000-01-01T12:31:00Z"));
        let minute_ids: Vec<TaskId> = upcoming[0].1.iter().map(Task::id).collect();
        assert_eq!(minute_ids, vec![a_id, b_id]);
        assert_eq!(upcoming[1].0, at("2000-01-01T13:00:00Z"));
        assert_eq!(upcoming[1].1[0].id(), hourly_id);
    }

    #[test]
    fn test_next_occurrences_between_lists_each_firing() {
        let scheduler = Scheduler::new();
        scheduler.add_task(minute_task()).unwrap();

        let upcoming = scheduler.next_occurrences(
            Some(at("2000-01-01T12:00:00Z")),
            Some(at("2000-01-01T12:05:00Z")),
        );

        let instants: Vec<DateTime<Utc>> = upcoming.iter().map(|(at, _)| *at).collect();
        assert_eq!(
            instants,
            vec![
                at("2000-01-01T12:01:00Z"),
                at("2000-01-01T12:02:00Z"),
                at("2000-01-01T12:03:00Z"),
                at("2000-01-01T12:04:00Z"),
            ]
        );
    }
}
