//! # The mutable task collection.
//!
//! Plain collection keyed by [`TaskId`]; all synchronization lives in the
//! scheduler, which guards the registry and its own planning sections with
//! one mutex so that a mutation can never interleave with "decide what to
//! run next". Reads hand out clones, so callers iterate snapshots while the
//! live collection keeps changing.
//!
//! Insertion order is the iteration order, but that is an implementation
//! detail, not a contract.

use cron::Schedule;

use crate::error::SchedulerError;
use crate::tasks::{Task, TaskId};

#[derive(Default)]
pub(crate) struct TaskRegistry {
    tasks: Vec<Task>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a task. Duplicate ids are rejected.
    pub(crate) fn add(&mut self, task: Task) -> Result<(), SchedulerError> {
        let id = task.id();
        if self.contains(id) {
            return Err(SchedulerError::DuplicateTask { id });
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Removes a task, reporting whether it was present.
    pub(crate) fn remove(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id() != id);
        self.tasks.len() != before
    }

    /// Removes a batch of ids, reporting the per-id outcome in input order.
    /// Ids not present report `false` with no side effect.
    pub(crate) fn remove_many(&mut self, ids: &[TaskId]) -> Vec<(TaskId, bool)> {
        ids.iter().map(|&id| (id, self.remove(id))).collect()
    }

    /// Empties the registry, returning how many tasks were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        count
    }

    /// Replaces the schedule of the task with the given id.
    pub(crate) fn update(&mut self, id: TaskId, schedule: Schedule) -> Result<(), SchedulerError> {
        match self.tasks.iter_mut().find(|t| t.id() == id) {
            Some(task) => {
                task.set_schedule(schedule);
                Ok(())
            }
            None => Err(SchedulerError::TaskNotFound { id }),
        }
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Copy-on-read snapshot of the current tasks.
    pub(crate) fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub(crate) fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}
