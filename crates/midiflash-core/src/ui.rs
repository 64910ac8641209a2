//! UI-thread marshaling.
//!
//! The visual surface and the log display belong to a single UI thread.
//! Worker threads never touch them directly; they submit closures through a
//! [`UiHandle`], and the UI thread runs them in order from its [`UiInbox`].

use crate::policy::Rgba;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// A surface whose color can be changed.
pub trait VisualSink {
    fn set_color(&mut self, color: Rgba);

    /// Request that the surface be repainted with its current color.
    fn redraw(&mut self);
}

/// Append-only text display.
pub trait LogSink {
    fn append(&mut self, line: &str);
}

/// A unit of work to run on the UI thread.
pub type UiTask<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Submission side of the UI task queue.
///
/// Tasks from one handle run in submission order, each exactly once.
pub struct UiHandle<S> {
    tx: Sender<UiTask<S>>,
}

impl<S> Clone for UiHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> UiHandle<S> {
    /// Schedule `task` to run on the UI thread.
    ///
    /// Returns `false` if the UI thread has gone away; the task is dropped.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

/// Receiving side of the UI task queue, owned by the UI thread.
pub struct UiInbox<S> {
    rx: Receiver<UiTask<S>>,
}

/// Create a connected handle/inbox pair.
pub fn ui_channel<S>() -> (UiHandle<S>, UiInbox<S>) {
    let (tx, rx) = unbounded();
    (UiHandle { tx }, UiInbox { rx })
}

impl<S> UiInbox<S> {
    /// Run every task queued so far. Returns the number of tasks run.
    ///
    /// Intended to be called once per frame from the UI loop.
    pub fn run_pending(&self, state: &mut S) -> usize {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task(state);
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return count,
            }
        }
    }

    /// Wait up to `timeout` for the first task, then run everything queued.
    ///
    /// Returns `None` once all handles are dropped and the queue is empty.
    pub fn run_for(&self, state: &mut S, timeout: Duration) -> Option<usize> {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task(state);
                Some(1 + self.run_pending(state))
            }
            Err(RecvTimeoutError::Timeout) => Some(0),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Run tasks until every handle has been dropped.
    pub fn run_until_closed(&self, state: &mut S) {
        for task in self.rx.iter() {
            task(state);
        }
    }
}
