//! midiflash-core - MIDI triggered flash coordination
//!
//! This crate turns a stream of MIDI note on events into timed flashes on a
//! surface owned by a UI thread, plus a log of the events that caused them.
//!
//! - **Coalescer** - single-slot trigger buffer; bursts collapse to one wake
//! - **Player** - plays `repetitions` on/off cycles per wake
//! - **Relay** - bounded, drop-newest queue of log lines
//! - **Session** - owns the one active MIDI input, switches safely
//! - **UI** - task queue that marshals surface changes onto the UI thread
//!
//! # Architecture
//!
//! ```text
//!  MIDI driver thread ──► EventFanout ──► TriggerCoalescer ──► FlashPlayer ─┐
//!                                   └──► MessageRelay ──────► drain loop ──┤
//!                                                                          ▼
//!                                                          UiHandle ─► UI thread
//! ```
//!
//! [`Coordinator`] wires everything together and owns the worker threads.
//!
//! # Feature Flags
//!
//! - `native` (default) - system MIDI input through midir

pub mod coalescer;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod player;
pub mod policy;
pub mod relay;
pub mod session;
pub mod source;
pub mod ui;

#[cfg(test)]
mod testing;

pub use coalescer::TriggerCoalescer;
pub use control::{spawn_session_thread, SessionCommand, SessionHandle};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{Result, SessionError};
pub use event::{note_name, DecodedEvent, EventKind};
pub use player::FlashPlayer;
pub use policy::{FlashPolicy, PolicyUpdate, Rgba, SharedPolicy, PALETTE};
pub use relay::{message_relay, MessageRelay, RelayReceiver, RelayStats, DEFAULT_RELAY_CAPACITY};
pub use session::{
    EventFanout, RelayMode, SessionState, SessionStatus, SourceSessionManager, StatusCell,
    SwitchOutcome, DEFAULT_SETTLE_DELAY,
};
pub use source::{
    EventCallback, InputProvider, OpenSource, PortListing, SourceDescriptor, StopHandle,
    VirtualProvider,
};
pub use ui::{ui_channel, LogSink, UiHandle, UiInbox, UiTask, VisualSink};

#[cfg(feature = "native")]
pub use source::MidirProvider;
