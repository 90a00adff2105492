//! # The "tasks about to fire" notification record.

use chrono::{DateTime, Utc};

use crate::tasks::TaskId;

/// Immutable record of one wake cycle with a non-empty due set.
///
/// Published to subscribers immediately before the due tasks execute.
/// `signal_time` is the wall-clock instant observed at wake-up; `task_ids`
/// are the tasks that passed revalidation and will run in this batch, in no
/// promised order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    signal_time: DateTime<Utc>,
    task_ids: Vec<TaskId>,
}

impl ScheduledEvent {
    /// Creates a new event.
    pub fn new(signal_time: DateTime<Utc>, task_ids: Vec<TaskId>) -> Self {
        Self {
            signal_time,
            task_ids,
        }
    }

    /// The instant the batch was signalled.
    pub fn signal_time(&self) -> DateTime<Utc> {
        self.signal_time
    }

    /// The ids firing in this batch.
    pub fn task_ids(&self) -> &[TaskId] {
        &self.task_ids
    }

    /// Whether a given task is part of this batch. Convenient for
    /// per-task subscription filters.
    pub fn contains(&self, id: TaskId) -> bool {
        self.task_ids.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let a = TaskId::new();
        let b = TaskId::new();
        let event = ScheduledEvent::new("2000-01-01T12:01:00Z".parse().unwrap(), vec![a]);
        assert!(event.contains(a));
        assert!(!event.contains(b));
        assert_eq!(event.task_ids(), &[a]);
    }
}
