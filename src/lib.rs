//! # cronvisor
//!
//! **Cronvisor** is a cron-driven in-process task scheduler for Rust.
//!
//! Callers register tasks paired with cron schedules; the scheduler keeps
//! computing which registered task(s) fire next, sleeps until that instant,
//! fires them, and repeats. It is designed to be embedded inside a host
//! process (service, daemon, web server) as a library component.
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │     Task     │   │     Task     │   │     Task     │
//!     │ (cron + sync │   │ (cron + async│   │ (cron + sync │
//!     │   callback)  │   │   callback)  │   │   callback)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                        │
//! │  - TaskRegistry (tasks by id, one mutex with the loop)            │
//! │  - planner (earliest next occurrence + exact-instant ties)        │
//! │  - control loop (plan → interruptible sleep → revalidate → fire)  │
//! │  - Broker (fan-out of ScheduledEvent to subscribers)              │
//! └──────┬──────────────────────────────┬─────────────────────────────┘
//!        │ per batch                    │ before each batch
//!        ▼                              ▼
//!   executor::execute()          Broker::publish(ScheduledEvent)
//!   (sync inline / async awaited,       ┌─────────┼─────────┐
//!    errors + panics contained)         ▼         ▼         ▼
//!                                   handler1  handler2  handlerN
//!                                   (filters optional, panics isolated)
//! ```
//!
//! Any thread may mutate the registry at any time — including while the
//! loop sleeps. Every mutation cancels the loop's current sleep interval
//! (a [`CancellationToken`](tokio_util::sync::CancellationToken) child of
//! the run-wide token) so the loop re-plans promptly instead of honouring a
//! stale deadline. Tasks tied at exactly the same instant fire together in
//! one batch and one notification event.
//!
//! ## Features
//! | Area              | Description                                                      | Key types                                |
//! |-------------------|------------------------------------------------------------------|------------------------------------------|
//! | **Tasks**         | Sync or async callbacks on cron schedules, live rescheduling.    | [`Task`], [`Callback`], [`TaskId`]       |
//! | **Scheduling**    | Run/start/stop lifecycle, precise interruptible sleeps.          | [`Scheduler`]                            |
//! | **Notifications** | Filtered fan-out of "about to fire" events.                      | [`ScheduledEvent`], [`Subscription`]     |
//! | **Configuration** | Time kind, log identifiers, rounding, slow-batch warnings.       | [`SchedulerConfig`], [`TimeKind`]        |
//! | **Errors**        | Typed API errors and task-callback errors.                       | [`SchedulerError`], [`TaskError`]        |
//! | **Testing**       | Injectable wall clock.                                           | [`Clock`], [`SystemClock`]               |
//!
//! Schedule expressions use the [`cron`] crate's format (seconds field
//! first): `"0 30 9 * * *"` fires daily at 09:30:00.
//!
//! ## Example
//! ```no_run
//! use cronvisor::{Scheduler, Task, TaskError};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), cronvisor::SchedulerError> {
//!     let scheduler = Scheduler::new();
//!
//!     // A synchronous task, every minute on the minute.
//!     let tick = scheduler.add_fn("0 * * * * *", |_ctx| {
//!         println!("tick");
//!         Ok(())
//!     })?;
//!
//!     // An asynchronous task under a caller-chosen name.
//!     let schedule = "0 0 3 * * *".parse()?;
//!     scheduler.add_task(
//!         Task::new_async(schedule, |ctx: CancellationToken| async move {
//!             if ctx.is_cancelled() {
//!                 return Err(TaskError::Canceled);
//!             }
//!             // nightly work...
//!             Ok(())
//!         })
//!         .with_name("nightly-cleanup"),
//!     )?;
//!
//!     // Observe batches as they fire.
//!     let watch = scheduler.subscribe(|event| {
//!         println!("{} task(s) firing at {}", event.task_ids().len(), event.signal_time());
//!     })?;
//!
//!     // Run until the host cancels.
//!     let cancellation = CancellationToken::new();
//!     let handle = scheduler.start(cancellation.clone())?;
//!
//!     // ... host runs; the registry stays mutable the whole time:
//!     scheduler.remove_task(tick);
//!
//!     cancellation.cancel();
//!     let _ = handle.await;
//!     drop(watch);
//!     scheduler.dispose();
//!     Ok(())
//! }
//! ```

mod clock;
mod config;
mod core;
mod error;
mod events;
mod tasks;

// ---- Public re-exports ----

pub use clock::{Clock, SystemClock};
pub use config::{LogIdentifier, LoggingOptions, SchedulerConfig, TimeKind};
pub use core::Scheduler;
pub use error::{SchedulerError, TaskError};
pub use events::{Broker, ScheduledEvent, Subscription};
pub use tasks::{AsyncCallback, Callback, SyncCallback, Task, TaskId};

/// The cron evaluator's schedule type, re-exported for convenience.
pub use cron::Schedule;
