//! Single-slot trigger buffer.
//!
//! [`TriggerCoalescer`] holds at most one pending trigger. Posting while a
//! trigger is already pending does nothing, so a burst of note events wakes
//! the consumer exactly once. Consumers block in
//! [`TriggerCoalescer::wait_and_consume`] until a trigger arrives or the
//! coalescer is closed.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Slot {
    pending: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Collapses bursts of triggers into at most one pending wake.
///
/// Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct TriggerCoalescer {
    inner: Arc<Inner>,
}

impl TriggerCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.inner.slot.lock().expect("Coalescer lock poisoned")
    }

    /// Mark a trigger as pending.
    ///
    /// Never blocks. A no-op if a trigger is already pending or the
    /// coalescer is closed.
    pub fn post(&self) {
        let mut slot = self.slot();
        if slot.pending || slot.closed {
            return;
        }
        slot.pending = true;
        drop(slot);
        // A pausing player shares the condvar with consumers
        self.inner.ready.notify_all();
    }

    /// Block until a trigger is pending, then consume it.
    ///
    /// Returns `false` once the coalescer has been closed.
    pub fn wait_and_consume(&self) -> bool {
        let mut slot = self.slot();
        loop {
            if slot.closed {
                return false;
            }
            if slot.pending {
                slot.pending = false;
                return true;
            }
            slot = self
                .inner
                .ready
                .wait(slot)
                .expect("Coalescer lock poisoned");
        }
    }

    /// Sleep for `duration`, waking early if the coalescer is closed.
    ///
    /// Returns `false` if the coalescer is (or becomes) closed. Pending
    /// triggers are left in place.
    pub fn sleep_unless_closed(&self, duration: Duration) -> bool {
        let slot = self.slot();
        let (slot, _) = self
            .inner
            .ready
            .wait_timeout_while(slot, duration, |s| !s.closed)
            .expect("Coalescer lock poisoned");
        !slot.closed
    }

    /// Consume a pending trigger without blocking.
    pub fn try_consume(&self) -> bool {
        let mut slot = self.slot();
        let was_pending = slot.pending && !slot.closed;
        slot.pending = false;
        was_pending
    }

    /// Check whether a trigger is waiting to be consumed.
    pub fn is_pending(&self) -> bool {
        self.slot().pending
    }

    /// Close the coalescer and wake every waiter.
    ///
    /// Further posts are ignored and waits return `false`.
    pub fn close(&self) {
        self.slot().closed = true;
        self.inner.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot().closed
    }
}
