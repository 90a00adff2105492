//! # Next-fire resolution.
//!
//! Pure planning over a registry snapshot: ask the cron evaluator for every
//! task's next occurrence strictly after "now", keep the minimum, and
//! accumulate every task tied at exactly that instant. The result is stale
//! the moment the registry mutates, which is why the loop re-runs this after
//! every wake-up.
//!
//! Occurrences are evaluated in the configured [`TimeKind`] and normalized
//! to UTC instants, so all downstream interval arithmetic stays on one
//! consistent clock across daylight-saving transitions.

use chrono::{DateTime, Local, Utc};
use cron::Schedule;

use crate::config::TimeKind;
use crate::tasks::{Task, TaskId};

/// Outcome of one planning pass: the earliest upcoming instant and every
/// task tied at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Plan {
    pub(crate) at: DateTime<Utc>,
    pub(crate) due: Vec<TaskId>,
}

/// Resolves the earliest next occurrence across `tasks`.
///
/// Returns `None` when no task will ever fire again (or there are no
/// tasks), meaning the loop should wait indefinitely for a registry change.
pub(crate) fn next_fire(tasks: &[Task], now: DateTime<Utc>, kind: TimeKind) -> Option<Plan> {
    let mut plan: Option<Plan> = None;

    for task in tasks {
        let Some(next) = next_occurrence(task.schedule(), now, kind) else {
            continue;
        };

        match &mut plan {
            None => {
                plan = Some(Plan {
                    at: next,
                    due: vec![task.id()],
                });
            }
            Some(best) => {
                if next < best.at {
                    best.at = next;
                    best.due.clear();
                    best.due.push(task.id());
                } else if next == best.at {
                    best.due.push(task.id());
                }
            }
        }
    }

    plan
}

/// Next occurrence of `schedule` strictly after `now`, as a UTC instant,
/// or `None` if the schedule can never fire again.
pub(crate) fn next_occurrence(
    schedule: &Schedule,
    now: DateTime<Utc>,
    kind: TimeKind,
) -> Option<DateTime<Utc>> {
    match kind {
        TimeKind::Utc => schedule.after(&now).next(),
        TimeKind::Local => schedule
            .after(&now.with_timezone(&Local))
            .next()
            .map(|at| at.with_timezone(&Utc)),
    }
}

/// Every occurrence of `schedule` in `[start, end)`, as UTC instants.
///
/// Backs the occurrence-preview helper only; the loop itself never looks
/// further ahead than the single next occurrence.
pub(crate) fn occurrences_between(
    schedule: &Schedule,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    kind: TimeKind,
) -> Vec<DateTime<Utc>> {
    match kind {
        TimeKind::Utc => schedule.after(&start).take_while(|at| *at < end).collect(),
        TimeKind::Local => schedule
            .after(&start.with_timezone(&Local))
            .map(|at| at.with_timezone(&Utc))
            .take_while(|at| *at < end)
            .collect(),
    }
}
