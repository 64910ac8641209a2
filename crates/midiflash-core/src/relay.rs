//! Bounded, drop-newest log line relay.
//!
//! The decode loop pushes formatted lines with [`MessageRelay::enqueue`],
//! which never blocks: when the queue is full the new line is discarded and
//! counted. A single [`RelayReceiver`] drains the queue in FIFO order and
//! forwards each line to the UI thread's log display.

use crate::ui::{LogSink, UiHandle};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default queue depth.
pub const DEFAULT_RELAY_CAPACITY: usize = 50;

/// Counters shared by every producer handle.
#[derive(Debug, Default)]
pub struct RelayStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl RelayStats {
    /// Lines accepted into the queue.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Lines discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer side of the relay.
///
/// The drain loop ends once every clone of this handle has been dropped.
#[derive(Debug, Clone)]
pub struct MessageRelay {
    tx: Sender<String>,
    stats: Arc<RelayStats>,
}

/// Consumer side of the relay.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: Receiver<String>,
}

/// Create a relay holding at most `capacity` lines (minimum 1).
pub fn message_relay(capacity: usize) -> (MessageRelay, RelayReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        MessageRelay {
            tx,
            stats: Arc::new(RelayStats::default()),
        },
        RelayReceiver { rx },
    )
}

impl MessageRelay {
    /// Queue a line without blocking.
    ///
    /// Returns `false` if the line was dropped (queue full or drain loop
    /// gone).
    pub fn enqueue(&self, line: impl Into<String>) -> bool {
        match self.tx.try_send(line.into()) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::debug!("[RELAY] queue full, dropped line ({} total)", dropped);
                false
            }
        }
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Maximum number of queued lines.
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(DEFAULT_RELAY_CAPACITY)
    }
}

impl RelayReceiver {
    /// Forward lines to `sink` until every producer is dropped.
    ///
    /// Stops early if `sink` returns `false`.
    pub fn drain_with<F>(self, mut sink: F)
    where
        F: FnMut(String) -> bool,
    {
        for line in self.rx.iter() {
            if !sink(line) {
                log::debug!("[RELAY] sink closed, stopping drain");
                return;
            }
        }
        log::debug!("[RELAY] all producers gone, drain finished");
    }

    /// Forward lines to the log display on the UI thread.
    pub fn drain_loop<S>(self, ui: UiHandle<S>)
    where
        S: LogSink + 'static,
    {
        self.drain_with(|line| ui.submit(move |sink: &mut S| sink.append(&line)));
    }

    /// Run [`drain_loop`](Self::drain_loop) on a dedicated thread.
    pub fn spawn<S>(self, ui: UiHandle<S>) -> std::io::Result<JoinHandle<()>>
    where
        S: LogSink + 'static,
    {
        thread::Builder::new()
            .name("midiflash-relay".to_string())
            .spawn(move || self.drain_loop(ui))
    }
}
