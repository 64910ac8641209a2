//! Wiring of the whole trigger-to-flash pipeline.
//!
//! [`Coordinator::start`] creates the coalescer, relay and shared policy,
//! spawns the flash player, the relay drain loop and the session control
//! thread, and returns a handle that owns all of them. Shutting down (or
//! dropping) the coordinator stops the active MIDI session, closes the
//! coalescer, lets the relay drain, and joins every thread.

use crate::coalescer::TriggerCoalescer;
use crate::control::{spawn_session_thread, SessionHandle};
use crate::player::FlashPlayer;
use crate::policy::{FlashPolicy, Rgba, SharedPolicy};
use crate::relay::{message_relay, RelayStats, DEFAULT_RELAY_CAPACITY};
use crate::session::{EventFanout, RelayMode, SourceSessionManager, DEFAULT_SETTLE_DELAY};
use crate::source::InputProvider;
use crate::ui::{LogSink, UiHandle, VisualSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Settings for [`Coordinator::start`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub policy: FlashPolicy,
    pub idle_color: Rgba,
    pub relay_capacity: usize,
    pub relay_mode: RelayMode,
    pub settle_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            policy: FlashPolicy::default(),
            idle_color: Rgba::BLACK,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            relay_mode: RelayMode::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Running pipeline. Owns every worker thread.
pub struct Coordinator {
    policy: SharedPolicy,
    session: SessionHandle,
    coalescer: TriggerCoalescer,
    relay_stats: Arc<RelayStats>,
    sequences: Arc<AtomicU64>,
    threads: Vec<(&'static str, JoinHandle<()>)>,
}

impl Coordinator {
    /// Start the pipeline.
    ///
    /// `ui` is the submission side of the UI thread's task queue; the
    /// surface type `S` is both the flash surface and the log display.
    pub fn start<P, S>(provider: P, ui: UiHandle<S>, config: CoordinatorConfig) -> std::io::Result<Self>
    where
        P: InputProvider + 'static,
        S: VisualSink + LogSink + 'static,
    {
        let policy = SharedPolicy::new(config.policy);
        let coalescer = TriggerCoalescer::new();
        let (relay, receiver) = message_relay(config.relay_capacity);
        let relay_stats = relay.stats().clone();

        let player = FlashPlayer::new(coalescer.clone(), policy.clone(), ui.clone())
            .with_idle_color(config.idle_color);
        let sequences = player.sequence_counter();
        let mut threads = vec![("player", player.spawn()?)];
        threads.push(("relay", receiver.spawn(ui)?));

        let fanout = EventFanout::new(coalescer.clone(), relay, config.relay_mode);
        let manager = SourceSessionManager::new(provider, fanout).with_settle_delay(config.settle_delay);
        let (session, session_thread) = match spawn_session_thread(manager) {
            Ok(spawned) => spawned,
            Err(e) => {
                // Player and relay threads are already running
                coalescer.close();
                for (_, thread) in threads {
                    let _ = thread.join();
                }
                return Err(e);
            }
        };
        threads.insert(0, ("session", session_thread));

        log::info!(
            "Flash coordinator started ({} relay slots, {:?} settle delay)",
            config.relay_capacity,
            config.settle_delay
        );

        Ok(Self {
            policy,
            session,
            coalescer,
            relay_stats,
            sequences,
            threads,
        })
    }

    /// Shared flash policy; replace it to change timing or color.
    pub fn policy(&self) -> &SharedPolicy {
        &self.policy
    }

    /// Handle to the session control thread.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn relay_stats(&self) -> &Arc<RelayStats> {
        &self.relay_stats
    }

    /// Number of flash sequences played so far.
    pub fn sequences_played(&self) -> u64 {
        self.sequences.load(Ordering::Relaxed)
    }

    /// Fire a flash by hand, as if a note on had arrived.
    pub fn trigger(&self) {
        self.coalescer.post();
    }

    /// Stop everything and wait for the worker threads.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        log::info!("Shutting down flash coordinator");

        // Session first: stops the driver and drops the last relay producers
        self.session.shutdown();
        self.coalescer.close();

        for (name, thread) in self.threads.drain(..) {
            if thread.join().is_err() {
                log::warn!("{} thread panicked", name);
            }
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DecodedEvent;
    use crate::session::SessionState;
    use crate::source::VirtualProvider;
    use crate::testing::{pump_until, RecordingSurface};
    use crate::ui::ui_channel;

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            policy: FlashPolicy {
                on_duration_ms: 20,
                repetitions: 2,
                gap_ms: 10,
                color: Rgba::CYAN,
            },
            settle_delay: Duration::from_millis(20),
            ..CoordinatorConfig::default()
        }
    }

    #[test]
    fn test_note_on_flashes_and_logs() {
        let provider = VirtualProvider::with_inputs(["Pads"]);
        let (ui, inbox) = ui_channel::<RecordingSurface>();
        let coordinator = Coordinator::start(provider.clone(), ui, config()).unwrap();

        coordinator.session().switch_to("Pads").unwrap();
        for key in 60..64 {
            provider.send("Pads", DecodedEvent::note_on(1, key, 100));
        }

        let mut surface = RecordingSurface::default();
        assert!(pump_until(&inbox, &mut surface, Duration::from_secs(2), |s| {
            s.lines.len() == 4 && coordinator.sequences_played() >= 1
        }));
        assert_eq!(
            surface.lines,
            vec![
                "NoteOn: C4 Ch:1 Vel:100",
                "NoteOn: C#4 Ch:1 Vel:100",
                "NoteOn: D4 Ch:1 Vel:100",
                "NoteOn: D#4 Ch:1 Vel:100",
            ]
        );

        // Let a second, collapsed sequence finish before shutting down
        std::thread::sleep(Duration::from_millis(200));
        coordinator.shutdown();
        inbox.run_pending(&mut surface);
        // The burst produced at most two sequences, each with two flashes
        let flashes = surface.colors().iter().filter(|c| **c == Rgba::CYAN).count();
        assert!(flashes == 2 || flashes == 4, "saw {} flashes", flashes);
        assert_eq!(provider.live_listeners(), 0);
    }

    #[test]
    fn test_failed_switch_leaves_pipeline_idle() {
        let provider = VirtualProvider::with_inputs(["A", "B"]);
        provider.fail_open("B");
        let (ui, inbox) = ui_channel::<RecordingSurface>();
        let coordinator = Coordinator::start(provider.clone(), ui, config()).unwrap();

        coordinator.session().switch_to("A").unwrap();
        assert!(coordinator.session().switch_to("B").is_err());
        assert_eq!(coordinator.session().status().state, SessionState::Idle);

        // Nobody is listening, so nothing reaches the surface
        assert!(!provider.send("A", DecodedEvent::note_on(0, 60, 100)));
        let mut surface = RecordingSurface::default();
        assert!(!pump_until(&inbox, &mut surface, Duration::from_millis(100), |s| {
            !s.mutations.is_empty()
        }));

        drop(coordinator);
        inbox.run_pending(&mut surface);
        assert!(surface.lines.is_empty());
    }

    #[test]
    fn test_manual_trigger_and_policy_update() {
        let provider = VirtualProvider::default();
        let (ui, inbox) = ui_channel::<RecordingSurface>();
        let coordinator = Coordinator::start(provider, ui, config()).unwrap();

        coordinator.policy().update(|p| FlashPolicy {
            repetitions: 1,
            color: Rgba::YELLOW,
            ..*p
        });
        coordinator.trigger();

        let mut surface = RecordingSurface::default();
        assert!(pump_until(&inbox, &mut surface, Duration::from_secs(1), |_| {
            coordinator.sequences_played() == 1
        }));
        inbox.run_pending(&mut surface);
        assert_eq!(surface.colors(), vec![Rgba::YELLOW, Rgba::BLACK]);
        assert_eq!(coordinator.relay_stats().dropped(), 0);
    }
}
