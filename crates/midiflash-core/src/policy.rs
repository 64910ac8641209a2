//! Flash policy and its shared, swap-on-update holder.
//!
//! A [`FlashPolicy`] is an immutable snapshot. [`SharedPolicy`] hands out
//! `Arc` snapshots to readers and replaces the whole value on update, so a
//! reader never observes a half-written policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const RED: Rgba = Rgba::opaque(255, 0, 0);
    pub const GREEN: Rgba = Rgba::opaque(0, 255, 0);
    pub const BLUE: Rgba = Rgba::opaque(0, 0, 255);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const YELLOW: Rgba = Rgba::opaque(255, 255, 0);
    pub const CYAN: Rgba = Rgba::opaque(0, 255, 255);
    pub const MAGENTA: Rgba = Rgba::opaque(255, 0, 255);

    /// Create a fully opaque color.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a color name or `#rrggbb` hex string.
    ///
    /// Accepts the palette names in English and Spanish. Returns `None` for
    /// anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let color = match s.as_str() {
            "red" | "rojo" => Self::RED,
            "green" | "verde" => Self::GREEN,
            "blue" | "azul" => Self::BLUE,
            "white" | "blanco" => Self::WHITE,
            "yellow" | "amarillo" => Self::YELLOW,
            "cyan" | "cian" => Self::CYAN,
            "magenta" => Self::MAGENTA,
            "black" | "negro" => Self::BLACK,
            hex if hex.starts_with('#') && hex.len() == 7 => {
                let channel = |range: std::ops::Range<usize>| {
                    hex.get(range).and_then(|c| u8::from_str_radix(c, 16).ok())
                };
                Self::opaque(channel(1..3)?, channel(3..5)?, channel(5..7)?)
            }
            _ => return None,
        };
        Some(color)
    }

    /// Parse a color name, falling back to red for unknown names.
    pub fn parse_or_red(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::RED)
    }

    /// Name of this color if it is part of the flash palette.
    pub fn palette_name(&self) -> Option<&'static str> {
        PALETTE
            .iter()
            .find(|(_, color)| color == self)
            .map(|(name, _)| *name)
    }

    /// The palette entry after this one, wrapping around.
    ///
    /// Colors outside the palette step to the first entry.
    pub fn next_in_palette(&self) -> Self {
        let index = PALETTE.iter().position(|(_, color)| color == self);
        match index {
            Some(i) => PALETTE[(i + 1) % PALETTE.len()].1,
            None => PALETTE[0].1,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.palette_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b),
        }
    }
}

/// Selectable flash colors, in display order.
pub const PALETTE: [(&str, Rgba); 7] = [
    ("red", Rgba::RED),
    ("green", Rgba::GREEN),
    ("blue", Rgba::BLUE),
    ("white", Rgba::WHITE),
    ("yellow", Rgba::YELLOW),
    ("cyan", Rgba::CYAN),
    ("magenta", Rgba::MAGENTA),
];

/// Default time the flash stays lit.
pub const DEFAULT_ON_MS: u64 = 100;
/// Default number of flashes per trigger.
pub const DEFAULT_REPETITIONS: u32 = 1;
/// Default pause after each flash.
pub const DEFAULT_GAP_MS: u64 = 50;

/// Timing and color of a flash sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashPolicy {
    /// How long the flash color stays on, in milliseconds
    pub on_duration_ms: u64,
    /// Number of on/off cycles per trigger (at least 1)
    pub repetitions: u32,
    /// Pause after each cycle, in milliseconds
    pub gap_ms: u64,
    /// Flash color
    pub color: Rgba,
}

impl Default for FlashPolicy {
    fn default() -> Self {
        Self {
            on_duration_ms: DEFAULT_ON_MS,
            repetitions: DEFAULT_REPETITIONS,
            gap_ms: DEFAULT_GAP_MS,
            color: Rgba::RED,
        }
    }
}

impl FlashPolicy {
    pub fn on_duration(&self) -> Duration {
        Duration::from_millis(self.on_duration_ms)
    }

    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }

    /// Apply user-supplied values.
    ///
    /// Each field is taken only if it is present and valid (`on_ms > 0`,
    /// `repetitions > 0`, `gap_ms >= 0`); otherwise the current value is
    /// kept. Returns the new policy, leaving `self` untouched.
    pub fn with_update(&self, update: &PolicyUpdate) -> Self {
        let mut next = *self;
        if let Some(on_ms) = update.on_ms.filter(|v| *v > 0) {
            next.on_duration_ms = on_ms as u64;
        }
        if let Some(repetitions) = update
            .repetitions
            .filter(|v| *v > 0)
            .and_then(|v| u32::try_from(v).ok())
        {
            next.repetitions = repetitions;
        }
        if let Some(gap_ms) = update.gap_ms.filter(|v| *v >= 0) {
            next.gap_ms = gap_ms as u64;
        }
        if let Some(color) = update.color {
            next.color = color;
        }
        next
    }
}

/// A partial, unvalidated policy change as entered by a user.
///
/// Numeric fields are signed so that out-of-range input can be represented
/// and rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyUpdate {
    pub on_ms: Option<i64>,
    pub repetitions: Option<i64>,
    pub gap_ms: Option<i64>,
    pub color: Option<Rgba>,
}

impl PolicyUpdate {
    /// Build an update from raw text fields.
    ///
    /// Fields that do not parse as integers are left unset.
    pub fn from_text(on_ms: &str, repetitions: &str, gap_ms: &str) -> Self {
        Self {
            on_ms: on_ms.trim().parse().ok(),
            repetitions: repetitions.trim().parse().ok(),
            gap_ms: gap_ms.trim().parse().ok(),
            color: None,
        }
    }
}

/// Thread-safe holder of the current flash policy.
///
/// Cloning shares the same underlying value.
#[derive(Clone, Default)]
pub struct SharedPolicy {
    current: Arc<RwLock<Arc<FlashPolicy>>>,
}

impl SharedPolicy {
    pub fn new(policy: FlashPolicy) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(policy))),
        }
    }

    /// Get the current policy snapshot.
    ///
    /// The read lock is held only long enough to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<FlashPolicy> {
        self.current.read().expect("Policy lock poisoned").clone()
    }

    /// Replace the policy with a new value.
    pub fn replace(&self, policy: FlashPolicy) {
        *self.current.write().expect("Policy lock poisoned") = Arc::new(policy);
    }

    /// Derive a new policy from the current one and swap it in.
    ///
    /// The read-modify-write happens under the write lock so concurrent
    /// updates are not lost.
    pub fn update<F>(&self, f: F) -> FlashPolicy
    where
        F: FnOnce(&FlashPolicy) -> FlashPolicy,
    {
        let mut current = self.current.write().expect("Policy lock poisoned");
        let next = f(&current);
        *current = Arc::new(next);
        next
    }
}

impl fmt::Debug for SharedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPolicy")
            .field("current", &*self.snapshot())
            .finish()
    }
}
