//! Source session management.
//!
//! [`SourceSessionManager`] owns at most one listening session on an
//! [`InputProvider`]. Switching to another input stops the current
//! listener, waits a settle delay so the driver can release the device, and
//! then opens the new input. Each decoded note on is fanned out to the
//! trigger coalescer and the message relay by an [`EventFanout`].
//!
//! Failures leave the manager idle and are returned to the caller. The
//! previous input is never reopened automatically.

use crate::coalescer::TriggerCoalescer;
use crate::error::{Result, SessionError};
use crate::event::{DecodedEvent, EventKind};
use crate::relay::MessageRelay;
use crate::source::{InputProvider, PortListing, SourceDescriptor, StopHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

/// Pause between stopping one input and opening the next.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Lifecycle of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Opening,
    Listening,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Opening => write!(f, "opening"),
            SessionState::Listening => write!(f, "listening"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Which decoded events become log lines.
///
/// Only note on events ever trigger a flash, whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Log note on events only
    #[default]
    #[serde(alias = "note_on_only")]
    NoteOn,
    /// Also log note off, SysEx and other messages
    #[serde(alias = "all_events")]
    All,
}

/// Routes decoded events to the coalescer and the relay.
///
/// Runs on the provider's callback thread, so nothing here blocks.
#[derive(Debug, Clone)]
pub struct EventFanout {
    coalescer: TriggerCoalescer,
    relay: MessageRelay,
    mode: RelayMode,
}

impl EventFanout {
    pub fn new(coalescer: TriggerCoalescer, relay: MessageRelay, mode: RelayMode) -> Self {
        Self {
            coalescer,
            relay,
            mode,
        }
    }

    /// Handle one decoded event.
    pub fn dispatch(&self, event: &DecodedEvent) {
        match (event.kind, self.mode) {
            (EventKind::NoteOn, _) => {
                self.coalescer.post();
                let line = event.log_line();
                log::info!("{}", line);
                self.relay.enqueue(line);
            }
            (_, RelayMode::All) => {
                self.relay.enqueue(event.log_line());
            }
            (_, RelayMode::NoteOn) => {}
        }
    }
}

/// Result of a successful switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The requested input was already active; nothing was touched
    Unchanged,
    /// Now listening on the requested input
    Started {
        /// Input that was stopped to make room, if any
        previous: Option<String>,
    },
}

/// Snapshot of the manager's state, published at every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub active: Option<String>,
    /// Error from the most recent failed switch, cleared on success
    pub last_error: Option<String>,
}

/// Shared, readable-from-anywhere [`SessionStatus`].
pub type StatusCell = Arc<RwLock<SessionStatus>>;

struct Session {
    source: SourceDescriptor,
    stop: Box<dyn StopHandle>,
}

/// Owns the single active listening session.
pub struct SourceSessionManager<P: InputProvider> {
    provider: P,
    fanout: EventFanout,
    settle_delay: Duration,
    state: SessionState,
    active: Option<Session>,
    status: StatusCell,
}

impl<P: InputProvider> SourceSessionManager<P> {
    pub fn new(provider: P, fanout: EventFanout) -> Self {
        Self {
            provider,
            fanout,
            settle_delay: DEFAULT_SETTLE_DELAY,
            state: SessionState::Idle,
            active: None,
            status: StatusCell::default(),
        }
    }

    /// Override the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Id of the input currently listened to.
    pub fn active_source(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.source.id.as_str())
    }

    /// Status cell updated at every state change, including mid-switch.
    pub fn status_cell(&self) -> StatusCell {
        self.status.clone()
    }

    /// Record the outcome of the last switch in the published status.
    pub fn set_last_error(&self, last_error: Option<String>) {
        self.status.write().expect("Status lock poisoned").last_error = last_error;
    }

    fn transition(&mut self, state: SessionState) {
        self.state = state;
        let mut status = self.status.write().expect("Status lock poisoned");
        status.state = state;
        status.active = self.active.as_ref().map(|s| s.source.id.clone());
    }

    /// Enumerate inputs and outputs.
    pub fn list_ports(&self) -> Result<PortListing> {
        self.provider.list_ports()
    }

    /// Listen on `source_id` instead of the current input.
    ///
    /// A no-op if `source_id` is already active. The id is checked against
    /// the provider's current inputs before anything is stopped, so an
    /// unknown id leaves the active session as it was. Once the old
    /// session is stopped, a failure to open or listen leaves the manager
    /// idle.
    pub fn switch_to(&mut self, source_id: &str) -> Result<SwitchOutcome> {
        if self.active_source() == Some(source_id) {
            log::debug!("Already listening on {}", source_id);
            return Ok(SwitchOutcome::Unchanged);
        }

        let source = self.resolve(source_id)?;

        let previous = self.stop_active();
        if previous.is_some() {
            thread::sleep(self.settle_delay);
        }

        self.transition(SessionState::Opening);
        log::info!("Opening MIDI input: {}", source.id);
        match self.open_and_listen(&source) {
            Ok(stop) => {
                self.active = Some(Session { source, stop });
                self.transition(SessionState::Listening);
                Ok(SwitchOutcome::Started { previous })
            }
            Err(e) => {
                self.transition(SessionState::Idle);
                log::warn!("{}", e);
                Err(e)
            }
        }
    }

    /// Stop the active session, if any.
    pub fn stop(&mut self) {
        self.stop_active();
    }

    fn resolve(&self, source_id: &str) -> Result<SourceDescriptor> {
        self.provider
            .list_inputs()?
            .into_iter()
            .find(|s| s.id == source_id)
            .ok_or_else(|| {
                SessionError::SourceUnavailable(format!("no MIDI input named '{}'", source_id))
            })
    }

    fn open_and_listen(&self, source: &SourceDescriptor) -> Result<Box<dyn StopHandle>> {
        let opened = self.provider.open(source)?;
        let fanout = self.fanout.clone();
        opened.listen(Box::new(move |event| fanout.dispatch(&event)))
    }

    fn stop_active(&mut self) -> Option<String> {
        if self.active.is_none() {
            return None;
        }
        // Still reported as the active input while it is being stopped
        self.transition(SessionState::Stopping);
        let mut session = self.active.take()?;
        log::info!("Stopping MIDI input: {}", session.source.id);
        session.stop.stop();
        self.transition(SessionState::Idle);
        Some(session.source.id)
    }
}

impl<P: InputProvider> Drop for SourceSessionManager<P> {
    fn drop(&mut self) {
        self.stop_active();
    }
}

impl<P: InputProvider> fmt::Debug for SourceSessionManager<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSessionManager")
            .field("state", &self.state)
            .field("active", &self.active_source())
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}
