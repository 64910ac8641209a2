//! Decoded MIDI events.
//!
//! Input providers hand every incoming message to the session's decode loop
//! as a [`DecodedEvent`]. Only the fields the coordinator needs are kept:
//! the kind, the channel, key and velocity for note messages, and the raw
//! bytes for everything else.

use std::fmt;

/// Broad classification of a MIDI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Note on with a non-zero velocity
    NoteOn,
    /// Note off, including note on with velocity 0
    NoteOff,
    /// System exclusive message (0xF0 ... 0xF7)
    SysEx,
    /// Anything else (CC, pitch bend, clock, ...)
    Other,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::NoteOn => write!(f, "NoteOn"),
            EventKind::NoteOff => write!(f, "NoteOff"),
            EventKind::SysEx => write!(f, "SysEx"),
            EventKind::Other => write!(f, "Other"),
        }
    }
}

/// A single decoded MIDI message.
///
/// `channel`, `key` and `velocity` are zero for messages that do not carry
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub kind: EventKind,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
    pub raw: Vec<u8>,
}

impl DecodedEvent {
    /// Build a note on event.
    pub fn note_on(channel: u8, key: u8, velocity: u8) -> Self {
        Self {
            kind: EventKind::NoteOn,
            channel: channel & 0x0F,
            key: key & 0x7F,
            velocity: velocity & 0x7F,
            raw: vec![0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F],
        }
    }

    /// Build a note off event.
    pub fn note_off(channel: u8, key: u8) -> Self {
        Self {
            kind: EventKind::NoteOff,
            channel: channel & 0x0F,
            key: key & 0x7F,
            velocity: 0,
            raw: vec![0x80 | (channel & 0x0F), key & 0x7F, 0],
        }
    }

    /// Decode raw MIDI bytes.
    ///
    /// Returns `None` for an empty buffer. Messages that are neither notes
    /// nor SysEx decode as [`EventKind::Other`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;

        if status == 0xF0 {
            return Some(Self::bare(EventKind::SysEx, bytes));
        }

        let channel = status & 0x0F;
        match (status & 0xF0, bytes.get(1), bytes.get(2)) {
            (0x90, Some(&key), Some(&velocity)) => {
                // Note on with velocity 0 is a note off
                let kind = if velocity == 0 {
                    EventKind::NoteOff
                } else {
                    EventKind::NoteOn
                };
                Some(Self {
                    kind,
                    channel,
                    key,
                    velocity,
                    raw: bytes.to_vec(),
                })
            }
            (0x80, Some(&key), Some(&velocity)) => Some(Self {
                kind: EventKind::NoteOff,
                channel,
                key,
                velocity,
                raw: bytes.to_vec(),
            }),
            _ => Some(Self::bare(EventKind::Other, bytes)),
        }
    }

    fn bare(kind: EventKind, bytes: &[u8]) -> Self {
        Self {
            kind,
            channel: 0,
            key: 0,
            velocity: 0,
            raw: bytes.to_vec(),
        }
    }

    /// Format the event as a display log line.
    pub fn log_line(&self) -> String {
        match self.kind {
            EventKind::NoteOn => format!(
                "NoteOn: {} Ch:{} Vel:{}",
                note_name(self.key),
                self.channel,
                self.velocity
            ),
            EventKind::NoteOff => format!("NoteOff: {} Ch:{}", note_name(self.key), self.channel),
            EventKind::SysEx => format!("SysEx: {} bytes", self.raw.len()),
            EventKind::Other => format!("Other: {}", hex_bytes(&self.raw)),
        }
    }
}

/// Get the note name for a MIDI note number (60 is C4).
pub fn note_name(note: u8) -> String {
    let names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i8 - 1;
    let name = names[(note % 12) as usize];
    format!("{}{}", name, octave)
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
