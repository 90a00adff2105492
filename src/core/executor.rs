//! # Task execution wrapper.
//!
//! Invokes one due task's callback with the batch's cancellation token and
//! contains whatever comes back: an `Err` from the callback and a panic are
//! both logged against the task's identity and go no further. One task's
//! failure can never stop the rest of the batch or the loop.
//!
//! Synchronous callbacks run inline on the loop; asynchronous callbacks are
//! awaited to completion. Due tasks execute one at a time — a host wanting
//! intra-batch concurrency dispatches its own background work inside the
//! callback.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::LoggingOptions;
use crate::error::TaskError;
use crate::tasks::{Callback, Task};

/// Runs one task callback to completion, containing errors and panics.
pub(crate) async fn execute(task: &Task, ctx: CancellationToken, logging: &LoggingOptions) {
    let label = logging.label(task.id(), task.name());
    debug!(task = %label, kind = task.callback().kind(), "starting task");

    let outcome: Result<Result<(), TaskError>, Box<dyn Any + Send>> = match task.callback() {
        Callback::Sync(callback) => {
            std::panic::catch_unwind(AssertUnwindSafe(|| callback(ctx)))
        }
        Callback::Async(callback) => AssertUnwindSafe(callback(ctx)).catch_unwind().await,
    };

    match outcome {
        Ok(Ok(())) => debug!(task = %label, "task finished"),
        Ok(Err(err)) => {
            error!(task = %label, error = %err, label = err.as_label(), "task failed")
        }
        Err(panic) => {
            error!(task = %label, panic = %panic_message(panic.as_ref()), "task panicked")
        }
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
