//! # The schedulable unit.
//!
//! A [`Task`] pairs a cron [`Schedule`] with a callback and a process-unique
//! [`TaskId`]. The callback is a tagged union, [`Callback`]: either a
//! synchronous closure or an asynchronous closure producing a fresh future
//! per invocation. Exactly one kind per task, fixed at construction; the
//! schedule (and the optional display name) may be changed later, which is
//! how live rescheduling works.
//!
//! Callbacks receive a [`CancellationToken`] scoped to the batch they run
//! in and should check it to stop cooperatively during shutdown or resets.
//!
//! ## Example
//! ```
//! use cronvisor::{Task, TaskError};
//! use tokio_util::sync::CancellationToken;
//!
//! let schedule = "0 30 9 * * *".parse().unwrap();
//! let task = Task::new(schedule, |ctx: CancellationToken| {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     // do work...
//!     Ok(())
//! })
//! .with_name("morning-report");
//!
//! assert_eq!(task.name(), Some("morning-report"));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use cron::Schedule;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::TaskError;

/// Process-unique task identifier.
///
/// Newtype over a v4 [`Uuid`]; callers may supply their own via
/// [`Task::with_id`] or let the constructor generate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Synchronous callback shape: runs to completion on the loop.
pub type SyncCallback = dyn Fn(CancellationToken) -> Result<(), TaskError> + Send + Sync;

/// Asynchronous callback shape: produces a fresh future per firing.
pub type AsyncCallback =
    dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync;

/// The two callback kinds a task can carry.
///
/// The loop switches on the variant once per execution; there is no trait
/// dispatch behind this.
#[derive(Clone)]
pub enum Callback {
    /// Invoked inline on the loop.
    Sync(Arc<SyncCallback>),
    /// Invoked and awaited; due tasks are awaited sequentially within a
    /// batch, so concurrency inside a batch is up to the callback itself.
    Async(Arc<AsyncCallback>),
}

impl Callback {
    /// Short label for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Callback::Sync(_) => "sync",
            Callback::Async(_) => "async",
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// A unit of schedulable work.
///
/// Cloning a task is cheap: the schedule is copied, the callback is shared.
/// Registry snapshots rely on this.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    name: Option<String>,
    schedule: Schedule,
    callback: Callback,
}

impl Task {
    /// Creates a task with a synchronous callback and a generated id.
    pub fn new<F>(schedule: Schedule, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        Self {
            id: TaskId::new(),
            name: None,
            schedule,
            callback: Callback::Sync(Arc::new(f)),
        }
    }

    /// Creates a task with an asynchronous callback and a generated id.
    ///
    /// The closure is called once per firing and must return a fresh future
    /// each time; shared state belongs in an explicit `Arc` inside it.
    pub fn new_async<F, Fut>(schedule: Schedule, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            id: TaskId::new(),
            name: None,
            schedule,
            callback: Callback::Async(Arc::new(move |ctx| Box::pin(f(ctx)))),
        }
    }

    /// Replaces the generated id with a caller-assigned one.
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Attaches a human-readable name, used only for diagnostics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renames the task.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Returns the current schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Replaces the schedule.
    ///
    /// On a registered task this takes effect through
    /// [`Scheduler::update_task`](crate::Scheduler::update_task); mutating a
    /// snapshot clone has no effect on scheduling.
    pub fn set_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }

    /// Returns the callback.
    pub fn callback(&self) -> &Callback {
        &self.callback
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("callback", &self.callback)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute_schedule() -> Schedule {
        "0 * * * * *".parse().unwrap()
    }

    #[test]
    fn test_new_generates_unique_ids() {
        let a = Task::new(minute_schedule(), |_| Ok(()));
        let b = Task::new(minute_schedule(), |_| Ok(()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_builder_overrides() {
        let id = TaskId::new();
        let task = Task::new(minute_schedule(), |_| Ok(()))
            .with_id(id)
            .with_name("demo");
        assert_eq!(task.id(), id);
        assert_eq!(task.name(), Some("demo"));
    }

    #[test]
    fn test_callback_kinds() {
        let sync = Task::new(minute_schedule(), |_| Ok(()));
        let asynchronous = Task::new_async(minute_schedule(), |_| async { Ok(()) });
        assert_eq!(sync.callback().kind(), "sync");
        assert_eq!(asynchronous.callback().kind(), "async");
    }

    #[test]
    fn test_clone_shares_callback() {
        let task = Task::new(minute_schedule(), |_| Ok(()));
        let copy = task.clone();
        let (Callback::Sync(a), Callback::Sync(b)) = (task.callback(), copy.callback()) else {
            panic!("expected sync callbacks");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_set_schedule_replaces() {
        let mut task = Task::new(minute_schedule(), |_| Ok(()));
        let hourly: Schedule = "0 0 * * * *".parse().unwrap();
        task.set_schedule(hourly);
        let now: chrono::DateTime<chrono::Utc> = "2000-01-01T12:00:01Z".parse().unwrap();
        let next = task.schedule().after(&now).next().unwrap();
        assert_eq!(next, "2000-01-01T13:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
    }
}
