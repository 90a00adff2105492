//! # Scheduler configuration.
//!
//! [`SchedulerConfig`] controls how "now" is interpreted for cron
//! evaluation, how tasks are identified in log output, how sleep delays are
//! rounded, and when a slow batch is escalated to a warning.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use cronvisor::{LogIdentifier, SchedulerConfig, TimeKind};
//!
//! let mut cfg = SchedulerConfig::default();
//! cfg.time_kind = TimeKind::Local;
//! cfg.logging.identifier = LogIdentifier::TaskNameAndId;
//! cfg.duration_warning = Duration::from_secs(30);
//!
//! assert_eq!(cfg.time_kind, TimeKind::Local);
//! ```

use std::time::Duration;

use crate::tasks::TaskId;

/// Which clock cron expressions are evaluated against.
///
/// Internal scheduler arithmetic always runs on UTC instants in order to
/// behave consistently across daylight-saving transitions; the kind only
/// decides the zone in which occurrence calendars are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeKind {
    /// Evaluate schedules in UTC. The default.
    #[default]
    Utc,
    /// Evaluate schedules in the system's local zone.
    Local,
}

/// How a task is rendered in diagnostic output.
///
/// Purely cosmetic; has no effect on scheduling. Since a task's name is
/// optional, name-based variants fall back to the id for unnamed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogIdentifier {
    /// Use the task id.
    TaskId,
    /// Use the task name (id if unnamed). The default.
    #[default]
    TaskName,
    /// Use the id, followed by the name if available.
    TaskIdAndName,
    /// Use the name if available, followed by the id.
    TaskNameAndId,
}

/// Log formatting preferences.
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Identifier preference for task references in log output.
    pub identifier: LogIdentifier,
}

impl LoggingOptions {
    /// Formats a task reference according to the configured identifier.
    pub(crate) fn label(&self, id: TaskId, name: Option<&str>) -> String {
        let named = name.filter(|n| !n.is_empty());
        match (self.identifier, named) {
            (LogIdentifier::TaskId, _) | (_, None) => id.to_string(),
            (LogIdentifier::TaskName, Some(name)) => name.to_string(),
            (LogIdentifier::TaskIdAndName, Some(name)) => format!("{id} ({name})"),
            (LogIdentifier::TaskNameAndId, Some(name)) => format!("{name} ({id})"),
        }
    }
}

/// Global configuration for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Clock kind used when evaluating cron occurrences.
    pub time_kind: TimeKind,
    /// Log formatting preferences.
    pub logging: LoggingOptions,
    /// Upper bound on how far a sleep delay may be rounded up toward the
    /// next whole second. Rounding only ever lengthens a delay.
    pub max_rounding: Duration,
    /// Batches running longer than this are logged at warn level.
    pub duration_warning: Duration,
}

impl Default for SchedulerConfig {
    /// Provides a default configuration:
    /// - `time_kind = TimeKind::Utc`
    /// - `logging.identifier = LogIdentifier::TaskName`
    /// - `max_rounding = 200ms`
    /// - `duration_warning = 60s`
    fn default() -> Self {
        Self {
            time_kind: TimeKind::default(),
            logging: LoggingOptions::default(),
            max_rounding: Duration::from_millis(200),
            duration_warning: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.time_kind, TimeKind::Utc);
        assert_eq!(cfg.logging.identifier, LogIdentifier::TaskName);
        assert_eq!(cfg.max_rounding, Duration::from_millis(200));
        assert_eq!(cfg.duration_warning, Duration::from_secs(60));
    }

    #[test]
    fn test_label_variants() {
        let id = TaskId::new();
        let opts = |identifier| LoggingOptions { identifier };

        assert_eq!(
            opts(LogIdentifier::TaskId).label(id, Some("nightly")),
            id.to_string()
        );
        assert_eq!(opts(LogIdentifier::TaskName).label(id, Some("nightly")), "nightly");
        assert_eq!(
            opts(LogIdentifier::TaskIdAndName).label(id, Some("nightly")),
            format!("{id} (nightly)")
        );
        assert_eq!(
            opts(LogIdentifier::TaskNameAndId).label(id, Some("nightly")),
            format!("nightly ({id})")
        );
    }

    #[test]
    fn test_label_falls_back_to_id_for_unnamed_tasks() {
        let id = TaskId::new();
        for identifier in [
            LogIdentifier::TaskId,
            LogIdentifier::TaskName,
            LogIdentifier::TaskIdAndName,
            LogIdentifier::TaskNameAndId,
        ] {
            let opts = LoggingOptions { identifier };
            assert_eq!(opts.label(id, None), id.to_string());
            assert_eq!(opts.label(id, Some("")), id.to_string());
        }
    }
}
