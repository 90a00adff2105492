//! # Subscription broker: fan-out of scheduled events to handlers.
//!
//! [`Broker`] keeps a lock-protected, index-stable free-list of
//! (handler, optional filter) pairs. Subscribing hands back a
//! [`Subscription`] guard that removes exactly its own slot on drop, in
//! O(1), without disturbing other subscribers — even while a publish is in
//! flight, because publish iterates a snapshot taken under the lock.
//!
//! ## Rules
//! - **Synchronous dispatch**: `publish` runs handlers on the caller,
//!   no buffering or queueing.
//! - **Isolation**: a panicking handler is caught and logged; remaining
//!   handlers still receive the event.
//! - **Filters**: an entry's filter decides per event whether the handler
//!   sees it; entries without a filter see everything.
//! - **Disposal**: `dispose` detaches all handlers; later subscribe calls
//!   fail with [`SchedulerError::ChannelDisposed`].

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::core::executor::panic_message;
use crate::error::SchedulerError;

type Handler<M> = Box<dyn Fn(&M) + Send + Sync>;
type Filter<M> = Box<dyn Fn(&M) -> bool + Send + Sync>;

struct Entry<M> {
    handler: Handler<M>,
    filter: Option<Filter<M>>,
}

struct Slots<M> {
    entries: Vec<Option<Arc<Entry<M>>>>,
    free: VecDeque<usize>,
    disposed: bool,
}

impl<M> Slots<M> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: VecDeque::new(),
            disposed: false,
        }
    }
}

/// Fan-out broker for messages of type `M`.
///
/// Cheap to clone; clones share the same subscriber list.
pub struct Broker<M> {
    slots: Arc<Mutex<Slots<M>>>,
}

impl<M> Clone for Broker<M> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<M> Default for Broker<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Broker<M> {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::new())),
        }
    }

    /// Registers a handler for every published message.
    ///
    /// The returned [`Subscription`] unsubscribes on drop; keep it alive
    /// for as long as the handler should receive messages (or call
    /// [`Subscription::detach`] to keep it registered permanently).
    pub fn subscribe(
        &self,
        handler: impl Fn(&M) + Send + Sync + 'static,
    ) -> Result<Subscription<M>, SchedulerError> {
        self.attach(Entry {
            handler: Box::new(handler),
            filter: None,
        })
    }

    /// Registers a handler gated by a filter predicate.
    ///
    /// The handler is only invoked for messages the filter accepts.
    pub fn subscribe_filtered(
        &self,
        handler: impl Fn(&M) + Send + Sync + 'static,
        filter: impl Fn(&M) -> bool + Send + Sync + 'static,
    ) -> Result<Subscription<M>, SchedulerError> {
        self.attach(Entry {
            handler: Box::new(handler),
            filter: Some(Box::new(filter)),
        })
    }

    fn attach(&self, entry: Entry<M>) -> Result<Subscription<M>, SchedulerError> {
        let mut slots = self.slots.lock();
        if slots.disposed {
            return Err(SchedulerError::ChannelDisposed);
        }

        let entry = Arc::new(entry);
        let key = match slots.free.pop_front() {
            Some(key) => {
                slots.entries[key] = Some(entry);
                key
            }
            None => {
                slots.entries.push(Some(entry));
                slots.entries.len() - 1
            }
        };

        Ok(Subscription {
            slots: Arc::clone(&self.slots),
            key,
            armed: true,
        })
    }

    /// Delivers a message to every live subscriber whose filter accepts it.
    ///
    /// Handlers run synchronously on the caller. A panicking handler is
    /// caught, logged, and does not block delivery to the remaining
    /// handlers. Publishing on a disposed broker is a no-op.
    pub fn publish(&self, message: &M) {
        let snapshot: Vec<Arc<Entry<M>>> = {
            let slots = self.slots.lock();
            slots.entries.iter().flatten().cloned().collect()
        };

        for entry in snapshot {
            if let Some(filter) = &entry.filter {
                if !filter(message) {
                    continue;
                }
            }
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(message)))
            {
                error!(panic = %panic_message(panic.as_ref()), "notification handler panicked");
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().entries.iter().flatten().count()
    }

    /// Detaches every handler and rejects further subscribe calls.
    ///
    /// Idempotent. Outstanding [`Subscription`] guards become inert.
    pub fn dispose(&self) {
        let mut slots = self.slots.lock();
        slots.disposed = true;
        slots.entries.clear();
        slots.free.clear();
    }
}

/// Guard for one broker subscription.
///
/// Dropping it removes exactly this subscription; other subscribers are
/// unaffected.
pub struct Subscription<M> {
    slots: Arc<Mutex<Slots<M>>>,
    key: usize,
    armed: bool,
}

impl<M> Subscription<M> {
    /// Consumes the guard, leaving the handler registered for the broker's
    /// remaining lifetime.
    pub fn detach(mut self) {
        self.armed = false;
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.slots.lock();
        if slots.disposed {
            return;
        }
        slots.entries[self.key] = None;
        slots.free.push_back(self.key);
    }
}
