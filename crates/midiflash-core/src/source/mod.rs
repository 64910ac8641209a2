//! Input source providers.
//!
//! A provider enumerates MIDI endpoints and opens inputs for listening.
//! Listening hands every decoded message to a callback on the provider's
//! own thread until the returned [`StopHandle`] is stopped.
//!
//! - [`midir_port`] - hardware and ALSA/CoreMIDI/WinMM ports via midir
//! - [`virtual_port`] - in-memory ports driven by the caller

use crate::error::Result;
use crate::event::DecodedEvent;
use std::fmt;

#[cfg(feature = "native")]
pub mod midir_port;
pub mod virtual_port;

#[cfg(feature = "native")]
pub use midir_port::MidirProvider;
pub use virtual_port::{ProviderCall, VirtualProvider};

/// Callback receiving decoded events, invoked on the provider's thread.
pub type EventCallback = Box<dyn FnMut(DecodedEvent) + Send + 'static>;

/// An enumerated MIDI endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Port name as reported by the system; used as the source id
    pub id: String,
    /// Position in the provider's port list at enumeration time
    pub index: usize,
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Inputs and outputs reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortListing {
    pub inputs: Vec<SourceDescriptor>,
    /// Display only; outputs are never opened
    pub outputs: Vec<SourceDescriptor>,
}

/// Enumerates and opens MIDI inputs.
pub trait InputProvider: Send {
    fn list_inputs(&self) -> Result<Vec<SourceDescriptor>>;

    fn list_outputs(&self) -> Result<Vec<SourceDescriptor>>;

    /// Open an input for listening.
    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn OpenSource>>;

    /// Enumerate inputs and outputs together.
    fn list_ports(&self) -> Result<PortListing> {
        Ok(PortListing {
            inputs: self.list_inputs()?,
            outputs: self.list_outputs()?,
        })
    }
}

/// An opened input that has not started streaming yet.
pub trait OpenSource {
    /// Start delivering events to `callback`.
    fn listen(self: Box<Self>, callback: EventCallback) -> Result<Box<dyn StopHandle>>;
}

/// Stops a running listener.
pub trait StopHandle: Send {
    /// Stop delivery. Once this returns the callback will not run again.
    /// Calling it more than once is harmless.
    fn stop(&mut self);
}
