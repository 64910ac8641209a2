//! Timed flash playback.
//!
//! The [`FlashPlayer`] loop blocks on the [`TriggerCoalescer`]. Each wake
//! takes one snapshot of the [`SharedPolicy`] and plays
//! `policy.repetitions` on/off cycles with it. A policy swap during a
//! sequence only affects the next wake.
//!
//! Every surface change is submitted to the UI thread; the player never
//! touches the surface itself.

use crate::coalescer::TriggerCoalescer;
use crate::policy::{FlashPolicy, Rgba, SharedPolicy};
use crate::ui::{UiHandle, VisualSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Plays flash sequences on a UI-owned surface.
pub struct FlashPlayer<S> {
    coalescer: TriggerCoalescer,
    policy: SharedPolicy,
    ui: UiHandle<S>,
    idle_color: Rgba,
    sequences: Arc<AtomicU64>,
}

impl<S: VisualSink + 'static> FlashPlayer<S> {
    pub fn new(coalescer: TriggerCoalescer, policy: SharedPolicy, ui: UiHandle<S>) -> Self {
        Self {
            coalescer,
            policy,
            ui,
            idle_color: Rgba::BLACK,
            sequences: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Set the color shown between flashes (black by default).
    pub fn with_idle_color(mut self, color: Rgba) -> Self {
        self.idle_color = color;
        self
    }

    /// Counter of completed sequences, readable from other threads.
    pub fn sequence_counter(&self) -> Arc<AtomicU64> {
        self.sequences.clone()
    }

    fn paint(&self, color: Rgba) -> bool {
        self.ui.submit(move |surface: &mut S| {
            surface.set_color(color);
            surface.redraw();
        })
    }

    /// Play one full sequence with `policy`.
    ///
    /// Returns `false` if playback was cut short because the coalescer was
    /// closed or the UI thread is gone. Closing interrupts the on and gap
    /// waits.
    pub fn play_sequence(&self, policy: &FlashPolicy) -> bool {
        for _ in 0..policy.repetitions {
            if self.coalescer.is_closed() {
                return false;
            }
            if !self.paint(policy.color) {
                return false;
            }
            if !self.coalescer.sleep_unless_closed(policy.on_duration()) {
                // Leave the surface idle on the way out
                self.paint(self.idle_color);
                return false;
            }
            if !self.paint(self.idle_color) {
                return false;
            }
            if !self.coalescer.sleep_unless_closed(policy.gap()) {
                return false;
            }
        }
        true
    }

    /// Serve triggers until the coalescer is closed.
    pub fn run(self) {
        log::debug!("[FLASH] player started");
        while self.coalescer.wait_and_consume() {
            // One snapshot per wake
            let policy = self.policy.snapshot();
            log::debug!(
                "[FLASH] playing {}x {}ms on / {}ms gap in {}",
                policy.repetitions,
                policy.on_duration_ms,
                policy.gap_ms,
                policy.color
            );
            if !self.play_sequence(&policy) {
                break;
            }
            self.sequences.fetch_add(1, Ordering::Relaxed);
        }
        log::debug!("[FLASH] player stopped");
    }

    /// Run the player loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("midiflash-player".to_string())
            .spawn(move || self.run())
    }
}
