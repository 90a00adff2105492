//! Error types used by the scheduler and by scheduled task callbacks.
//!
//! This module defines two main error enums:
//!
//! - [`SchedulerError`] — errors raised by the scheduler API itself
//!   (lifecycle misuse, unknown or colliding task ids, bad cron expressions).
//! - [`TaskError`] — errors returned by individual task callbacks.
//!
//! Both types provide an `as_label` helper returning a short stable
//! snake_case label for logs and metrics.

use thiserror::Error;

use crate::tasks::TaskId;

/// # Errors produced by the scheduler API.
///
/// These are surfaced synchronously to the caller of the offending
/// operation; they never terminate a running scheduler loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// `run`/`start` was called while the loop is already running.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// `stop` was called while the loop is not running.
    #[error("scheduler is not running")]
    NotRunning,

    /// `run`/`start` was called after `dispose`.
    #[error("scheduler has been disposed")]
    Disposed,

    /// `update_task` referenced an id that is not in the registry.
    #[error("task with id={id} could not be found")]
    TaskNotFound {
        /// The id that was looked up.
        id: TaskId,
    },

    /// `add_task` was called with an id that is already registered.
    ///
    /// Duplicate ids are rejected; re-register under a fresh id or remove
    /// the existing task first.
    #[error("task with id={id} is already registered")]
    DuplicateTask {
        /// The colliding id.
        id: TaskId,
    },

    /// `subscribe` was called on a disposed notification channel.
    #[error("notification channel has been disposed")]
    ChannelDisposed,

    /// A cron expression could not be parsed.
    #[error("invalid cron expression: {0}")]
    InvalidSchedule(#[from] cron::error::Error),
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cronvisor::SchedulerError;
    ///
    /// assert_eq!(SchedulerError::AlreadyRunning.as_label(), "scheduler_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::AlreadyRunning => "scheduler_already_running",
            SchedulerError::NotRunning => "scheduler_not_running",
            SchedulerError::Disposed => "scheduler_disposed",
            SchedulerError::TaskNotFound { .. } => "task_not_found",
            SchedulerError::DuplicateTask { .. } => "task_duplicate",
            SchedulerError::ChannelDisposed => "channel_disposed",
            SchedulerError::InvalidSchedule(_) => "invalid_schedule",
        }
    }
}

/// # Errors produced by task callbacks.
///
/// A callback returning `Err` is caught inside the loop, logged with the
/// task's identity, and never stops the rest of the batch or the loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed cancellation and gave up.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from any displayable error.
    ///
    /// # Example
    /// ```
    /// use cronvisor::TaskError;
    ///
    /// let err = TaskError::fail("connection refused");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }
}
