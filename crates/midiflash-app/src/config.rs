//! Configuration file support for midi-flash
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/midi-flash/config.toml`
//! - macOS: `~/Library/Application Support/midi-flash/config.toml`
//! - Windows: `%APPDATA%\midi-flash\config.toml`

use crate::error::{Error, Result};
use directories::ProjectDirs;
use midiflash_core::policy::{DEFAULT_GAP_MS, DEFAULT_ON_MS, DEFAULT_REPETITIONS};
use midiflash_core::{
    CoordinatorConfig, FlashPolicy, PolicyUpdate, RelayMode, Rgba, DEFAULT_RELAY_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Flash timing and color
    pub flash: FlashSettings,
    /// MIDI input configuration
    pub midi: MidiSettings,
    /// Event log configuration
    pub relay: RelaySettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "midi-flash") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r##"# midi-flash configuration file

[flash]
# How long the flash stays lit, in milliseconds (> 0)
on_ms = 100

# Flashes per trigger (>= 1)
repetitions = 1

# Pause after each flash, in milliseconds
gap_ms = 50

# Flash color: red, green, blue, white, yellow, cyan, magenta or "#rrggbb"
color = "red"

# Color shown between flashes
idle_color = "black"

[midi]
# Client name registered with the system MIDI API
client_name = "midi-flash"

# Input to listen on at startup (defaults to the first input)
# port = "Launchpad Mini MIDI 1"

# Pause between closing one input and opening the next, in milliseconds
settle_ms = 200

[relay]
# Log lines buffered for the display; extra lines are dropped
capacity = 50

# "note_on" logs note on events only, "all" logs every message
mode = "note_on"
"##;

        fs::write(path, content)?;
        Ok(())
    }

    /// Flash policy described by this config
    pub fn flash_policy(&self) -> FlashPolicy {
        self.flash.to_policy()
    }

    /// Convert to the coordinator's startup settings
    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            policy: self.flash_policy(),
            idle_color: Rgba::parse(&self.flash.idle_color).unwrap_or(Rgba::BLACK),
            relay_capacity: self.relay.capacity.max(1),
            relay_mode: self.relay.mode,
            settle_delay: Duration::from_millis(self.midi.settle_ms),
        }
    }
}

/// Flash settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashSettings {
    /// Flash on time in milliseconds
    pub on_ms: u64,
    /// Flashes per trigger
    pub repetitions: u32,
    /// Gap after each flash in milliseconds
    pub gap_ms: u64,
    /// Flash color name or hex
    pub color: String,
    /// Color between flashes
    pub idle_color: String,
}

impl Default for FlashSettings {
    fn default() -> Self {
        Self {
            on_ms: DEFAULT_ON_MS,
            repetitions: DEFAULT_REPETITIONS,
            gap_ms: DEFAULT_GAP_MS,
            color: "red".to_string(),
            idle_color: "black".to_string(),
        }
    }
}

impl FlashSettings {
    /// Take timing and color from a running policy.
    pub fn apply_policy(&mut self, policy: &FlashPolicy) {
        self.on_ms = policy.on_duration_ms;
        self.repetitions = policy.repetitions;
        self.gap_ms = policy.gap_ms;
        self.color = policy.color.to_string();
    }

    /// Build a policy, keeping defaults for out-of-range values
    pub fn to_policy(&self) -> FlashPolicy {
        let update = PolicyUpdate {
            on_ms: i64::try_from(self.on_ms).ok(),
            repetitions: Some(self.repetitions as i64),
            gap_ms: i64::try_from(self.gap_ms).ok(),
            color: Some(Rgba::parse_or_red(&self.color)),
        };
        FlashPolicy::default().with_update(&update)
    }
}

/// MIDI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Client name for the system MIDI API
    pub client_name: String,
    /// Preferred input port
    pub port: Option<String>,
    /// Settle delay in milliseconds
    pub settle_ms: u64,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            client_name: "midi-flash".to_string(),
            port: None,
            settle_ms: 200,
        }
    }
}

/// Relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Queue capacity
    pub capacity: usize,
    /// Which events are logged
    pub mode: RelayMode,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RELAY_CAPACITY,
            mode: RelayMode::NoteOn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.flash.on_ms, 100);
        assert_eq!(config.flash.repetitions, 1);
        assert_eq!(config.flash.gap_ms, 50);
        assert_eq!(config.midi.settle_ms, 200);
        assert_eq!(config.relay.capacity, 50);
        assert_eq!(config.flash_policy(), FlashPolicy::default());
    }

    #[test]
    fn test_default_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default_config(&path).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.flash.color, "red");
        assert_eq!(config.relay.mode, RelayMode::NoteOn);
        assert!(config.midi.port.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.flash.color = "cyan".to_string();
        config.midi.port = Some("Pads".to_string());
        config.relay.mode = RelayMode::All;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.flash.color, "cyan");
        assert_eq!(loaded.midi.port.as_deref(), Some("Pads"));
        assert_eq!(loaded.relay.mode, RelayMode::All);
    }

    #[test]
    fn test_partial_file_and_invalid_values() {
        let config: Config = toml::from_str(
            r#"
            [flash]
            on_ms = 0
            repetitions = 0
            color = "not-a-color"

            [relay]
            mode = "all"
            capacity = 0
            "#,
        )
        .unwrap();

        // Invalid flash values fall back to defaults, unknown color to red
        let policy = config.flash_policy();
        assert_eq!(policy.on_duration_ms, 100);
        assert_eq!(policy.repetitions, 1);
        assert_eq!(policy.gap_ms, 50);
        assert_eq!(policy.color, Rgba::RED);

        let coordinator = config.to_coordinator_config();
        assert_eq!(coordinator.relay_mode, RelayMode::All);
        assert_eq!(coordinator.relay_capacity, 1);
        assert_eq!(coordinator.idle_color, Rgba::BLACK);
    }

    #[test]
    fn test_apply_policy_round_trips_color() {
        let mut settings = FlashSettings::default();
        let policy = FlashPolicy {
            on_duration_ms: 250,
            repetitions: 4,
            gap_ms: 0,
            color: Rgba::opaque(255, 128, 0),
        };
        settings.apply_policy(&policy);
        assert_eq!(settings.color, "#ff8000");
        assert_eq!(settings.to_policy(), policy);
    }

    #[test]
    fn test_unknown_relay_mode_is_rejected() {
        let parsed: std::result::Result<Config, _> = toml::from_str("[relay]\nmode = \"loud\"\n");
        assert!(parsed.is_err());
    }
}
