//! MIDI input via midir (ALSA on Linux, CoreMIDI, WinMM).

use super::{EventCallback, InputProvider, OpenSource, SourceDescriptor, StopHandle};
use crate::error::{Result, SessionError};
use crate::event::DecodedEvent;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort, MidiOutput};

/// Provider backed by the system MIDI API.
#[derive(Debug, Clone)]
pub struct MidirProvider {
    client_name: String,
}

impl Default for MidirProvider {
    fn default() -> Self {
        Self::new("midi-flash")
    }
}

impl MidirProvider {
    /// Create a provider that registers with the system under `client_name`.
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn input(&self, suffix: &str) -> Result<MidiInput> {
        MidiInput::new(&format!("{}-{}", self.client_name, suffix)).map_err(|e| {
            SessionError::SourceUnavailable(format!("Failed to create MIDI input: {}", e))
        })
    }
}

impl InputProvider for MidirProvider {
    fn list_inputs(&self) -> Result<Vec<SourceDescriptor>> {
        let midi_in = self.input("scan")?;
        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| SourceDescriptor {
                id: midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index)),
                index,
            })
            .collect())
    }

    fn list_outputs(&self) -> Result<Vec<SourceDescriptor>> {
        let midi_out = MidiOutput::new(&format!("{}-scan", self.client_name)).map_err(|e| {
            SessionError::SourceUnavailable(format!("Failed to create MIDI output: {}", e))
        })?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| SourceDescriptor {
                id: midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index)),
                index,
            })
            .collect())
    }

    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn OpenSource>> {
        let open_failed = |reason: String| SessionError::OpenFailed {
            source_id: source.id.clone(),
            reason,
        };

        let mut midi_in = MidiInput::new(&self.client_name)
            .map_err(|e| open_failed(format!("Failed to create MIDI input: {}", e)))?;
        // SysEx is delivered too
        midi_in.ignore(Ignore::None);

        // Ports can move between enumeration and open, so match by name
        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).map(|n| n == source.id).unwrap_or(false))
            .ok_or_else(|| open_failed("port disappeared".to_string()))?;

        Ok(Box::new(MidirOpenSource {
            midi_in,
            port,
            name: source.id.clone(),
        }))
    }
}

struct MidirOpenSource {
    midi_in: MidiInput,
    port: MidiInputPort,
    name: String,
}

impl OpenSource for MidirOpenSource {
    fn listen(self: Box<Self>, mut callback: EventCallback) -> Result<Box<dyn StopHandle>> {
        let MidirOpenSource {
            midi_in,
            port,
            name,
        } = *self;

        let connection = midi_in
            .connect(
                &port,
                "midiflash-input",
                move |timestamp, bytes, _| {
                    log::debug!("[MIDI RAW] timestamp={} bytes={:?}", timestamp, bytes);
                    if let Some(event) = DecodedEvent::from_bytes(bytes) {
                        log::debug!("[MIDI PARSED] {:?}", event.kind);
                        callback(event);
                    }
                },
                (),
            )
            .map_err(|e| SessionError::ListenFailed {
                source_id: name.clone(),
                reason: e.to_string(),
            })?;

        log::info!("Listening on MIDI input: {}", name);
        Ok(Box::new(MidirStopHandle {
            connection: Some(connection),
            name,
        }))
    }
}

/// Owns the live midir connection; closing it joins the driver thread.
struct MidirStopHandle {
    connection: Option<MidiInputConnection<()>>,
    name: String,
}

impl StopHandle for MidirStopHandle {
    fn stop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            log::info!("Closed MIDI input: {}", self.name);
        }
    }
}

impl Drop for MidirStopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
