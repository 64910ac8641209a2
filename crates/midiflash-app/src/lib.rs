//! midiflash-app - Terminal front end for midiflash
//!
//! Flashes a terminal panel whenever a MIDI note on arrives. Features include:
//!
//! - Timed, repeatable flashes in a configurable color
//! - Live switching between MIDI inputs without restarting
//! - Event log of the notes that caused each flash
//! - Configurable via TOML file
//!
//! # Usage as a Library
//!
//! ```no_run
//! use midiflash_app::{App, Config, Screen};
//! use midiflash_core::{ui_channel, Coordinator, MidirProvider};
//!
//! let config = Config::load_or_default();
//! let (ui, inbox) = ui_channel::<Screen>();
//! let coordinator = Coordinator::start(
//!     MidirProvider::new(config.midi.client_name.clone()),
//!     ui,
//!     config.to_coordinator_config(),
//! )
//! .unwrap();
//!
//! let mut app = App::new(coordinator, config);
//! app.refresh();
//! app.poll();
//!
//! let mut screen = Screen::default();
//! inbox.run_pending(&mut screen);
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod logger;
pub mod screen;
pub mod ui;

// Re-export main types
pub use app::{action_for_key, Action, App};
pub use config::{Config, FlashSettings, MidiSettings, RelaySettings};
pub use error::{Error, Result};
pub use screen::Screen;
