//! # Wall-clock abstraction.
//!
//! [`Clock`] is the single source of "now" for the scheduler. The loop does
//! all interval arithmetic on the UTC instants it returns; the local variant
//! exists for cron evaluation and display when the scheduler is configured
//! with [`TimeKind::Local`](crate::TimeKind).
//!
//! The trait is public so hosts and tests can inject a deterministic clock:
//!
//! ```
//! use std::sync::Arc;
//! use chrono::{DateTime, Utc};
//! use cronvisor::{Clock, Scheduler, SchedulerConfig};
//!
//! #[derive(Debug)]
//! struct FixedClock(DateTime<Utc>);
//!
//! impl Clock for FixedClock {
//!     fn now_utc(&self) -> DateTime<Utc> {
//!         self.0
//!     }
//! }
//!
//! let epoch = "2000-01-01T12:00:00Z".parse().unwrap();
//! let scheduler = Scheduler::with_clock(SchedulerConfig::default(), Arc::new(FixedClock(epoch)));
//! assert!(!scheduler.is_running());
//! ```

use chrono::{DateTime, Local, Utc};

/// Source of the current wall-clock time.
///
/// Implementations must be cheap to call; the loop reads the clock once per
/// planning pass and twice per executed batch.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current instant in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Returns the current instant in the system's local zone.
    ///
    /// The default derives from [`now_utc`](Clock::now_utc); override only
    /// when the two must diverge (e.g. zone-transition tests).
    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }
}

/// The process clock. This is what [`Scheduler::new`](crate::Scheduler::new)
/// installs by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}
