//! Task model: identifiers, callbacks, and the schedulable unit.

mod task;

pub use task::{AsyncCallback, Callback, SyncCallback, Task, TaskId};
