//! Application state and key handling.
//!
//! [`App`] owns the running [`Coordinator`] and translates key presses into
//! policy changes, manual triggers and input switches. Switches and port
//! scans are queued on the session thread and their replies polled once per
//! frame, so the UI never waits out the settle delay.

use crate::config::Config;
use crate::error::Result;
use crossbeam_channel::{Receiver, TryRecvError};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use midiflash_core::{
    Coordinator, FlashPolicy, PolicyUpdate, PortListing, SessionState, SessionStatus,
    SwitchOutcome,
};
use std::path::PathBuf;

/// Milliseconds added or removed per key press.
pub const TIME_STEP_MS: i64 = 10;

/// Something the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextInput,
    Refresh,
    NextColor,
    FlashShorter,
    FlashLonger,
    GapShorter,
    GapLonger,
    FewerRepetitions,
    MoreRepetitions,
    Trigger,
    ClearLog,
    SaveSettings,
}

/// Map a key press to an action.
pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Tab => Action::NextInput,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Char('c') => Action::NextColor,
        KeyCode::Char('[') => Action::FlashShorter,
        KeyCode::Char(']') => Action::FlashLonger,
        KeyCode::Char('-') => Action::GapShorter,
        KeyCode::Char('=') | KeyCode::Char('+') => Action::GapLonger,
        KeyCode::Char('<') | KeyCode::Char(',') => Action::FewerRepetitions,
        KeyCode::Char('>') | KeyCode::Char('.') => Action::MoreRepetitions,
        KeyCode::Char(' ') => Action::Trigger,
        KeyCode::Char('l') => Action::ClearLog,
        KeyCode::Char('s') => Action::SaveSettings,
        _ => return None,
    };
    Some(action)
}

struct PendingSwitch {
    source_id: String,
    reply: Receiver<midiflash_core::Result<SwitchOutcome>>,
}

type PendingScan = Receiver<midiflash_core::Result<PortListing>>;

/// State driven by the UI thread.
pub struct App {
    coordinator: Coordinator,
    config: Config,
    config_path: Option<PathBuf>,
    ports: PortListing,
    pending: Option<PendingSwitch>,
    scanning: Option<PendingScan>,
    status_message: String,
    should_quit: bool,
}

impl App {
    /// `config` supplies the preferred port and is what
    /// [`Action::SaveSettings`] writes back.
    pub fn new(coordinator: Coordinator, config: Config) -> Self {
        Self {
            coordinator,
            config,
            config_path: None,
            ports: PortListing::default(),
            pending: None,
            scanning: None,
            status_message: String::new(),
            should_quit: false,
        }
    }

    /// Save settings to `path` instead of the default config location.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn ports(&self) -> &PortListing {
        &self.ports
    }

    pub fn policy(&self) -> FlashPolicy {
        *self.coordinator.policy().snapshot()
    }

    pub fn session_status(&self) -> SessionStatus {
        self.coordinator.session().status()
    }

    /// Index of the active input in the port listing.
    pub fn selected(&self) -> Option<usize> {
        let active = self.session_status().active?;
        self.ports.inputs.iter().position(|p| p.id == active)
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn is_switching(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.is_some()
    }

    /// Apply one user action. Returns `true` when a log clear was requested.
    pub fn handle(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextInput => self.next_input(),
            Action::Refresh => self.refresh(),
            Action::NextColor => {
                let next = self.coordinator.policy().update(|p| FlashPolicy {
                    color: p.color.next_in_palette(),
                    ..*p
                });
                self.status_message = format!("Color: {}", next.color);
            }
            Action::FlashShorter => self.adjust_on(-TIME_STEP_MS),
            Action::FlashLonger => self.adjust_on(TIME_STEP_MS),
            Action::GapShorter => self.adjust_gap(-TIME_STEP_MS),
            Action::GapLonger => self.adjust_gap(TIME_STEP_MS),
            Action::FewerRepetitions => self.adjust_repetitions(-1),
            Action::MoreRepetitions => self.adjust_repetitions(1),
            Action::Trigger => self.coordinator.trigger(),
            Action::ClearLog => return true,
            Action::SaveSettings => {
                self.status_message = match self.save_settings() {
                    Ok(()) => "Settings saved".to_string(),
                    Err(e) => {
                        log::warn!("Failed to save settings: {}", e);
                        format!("Save failed: {}", e)
                    }
                };
            }
        }
        false
    }

    fn apply(&mut self, update: PolicyUpdate) {
        let next = self.coordinator.policy().update(|p| p.with_update(&update));
        self.status_message = format!(
            "Flash {} ms x{}, gap {} ms",
            next.on_duration_ms, next.repetitions, next.gap_ms
        );
    }

    fn adjust_on(&mut self, delta: i64) {
        let current = self.policy().on_duration_ms as i64;
        self.apply(PolicyUpdate {
            on_ms: Some(current + delta),
            ..PolicyUpdate::default()
        });
    }

    fn adjust_gap(&mut self, delta: i64) {
        let current = self.policy().gap_ms as i64;
        self.apply(PolicyUpdate {
            gap_ms: Some(current + delta),
            ..PolicyUpdate::default()
        });
    }

    fn adjust_repetitions(&mut self, delta: i64) {
        let current = i64::from(self.policy().repetitions);
        self.apply(PolicyUpdate {
            repetitions: Some(current + delta),
            ..PolicyUpdate::default()
        });
    }

    /// Write the current flash policy into the config file.
    pub fn save_settings(&mut self) -> Result<()> {
        let policy = self.policy();
        self.config.flash.apply_policy(&policy);
        match &self.config_path {
            Some(path) => self.config.save_to(path),
            None => self.config.save(),
        }
    }

    /// Queue a port scan; the listing is applied by [`App::poll`].
    pub fn refresh(&mut self) {
        if self.scanning.is_some() {
            return;
        }
        match self.coordinator.session().request_list_ports() {
            Ok(reply) => {
                self.status_message = "Scanning MIDI ports...".to_string();
                self.scanning = Some(reply);
            }
            Err(e) => {
                log::error!("Cannot scan MIDI ports: {}", e);
                self.status_message = e.to_string();
            }
        }
    }

    /// Take a fresh listing.
    ///
    /// While no input is active, start listening on the preferred port if
    /// it exists, else on the first input.
    fn apply_ports(&mut self, ports: PortListing) {
        self.ports = ports;
        log::debug!(
            "Found {} inputs, {} outputs",
            self.ports.inputs.len(),
            self.ports.outputs.len()
        );

        if self.ports.inputs.is_empty() {
            self.status_message = "No MIDI inputs found".to_string();
            return;
        }
        if self.pending.is_some() || self.session_status().state != SessionState::Idle {
            self.status_message = format!("{} MIDI inputs", self.ports.inputs.len());
            return;
        }

        let target = self
            .config
            .midi
            .port
            .as_deref()
            .and_then(|name| self.ports.inputs.iter().find(|p| p.id == name))
            .unwrap_or(&self.ports.inputs[0])
            .id
            .clone();
        self.request_switch(&target);
    }

    fn next_input(&mut self) {
        if self.ports.inputs.is_empty() {
            self.refresh();
            return;
        }
        let next = match self.selected() {
            Some(i) => (i + 1) % self.ports.inputs.len(),
            None => 0,
        };
        let target = self.ports.inputs[next].id.clone();
        self.request_switch(&target);
    }

    fn request_switch(&mut self, source_id: &str) {
        match self.coordinator.session().request_switch(source_id) {
            Ok(reply) => {
                self.status_message = format!("Switching to {}...", source_id);
                self.pending = Some(PendingSwitch {
                    source_id: source_id.to_string(),
                    reply,
                });
            }
            Err(e) => {
                log::error!("Cannot switch MIDI input: {}", e);
                self.status_message = e.to_string();
            }
        }
    }

    /// Collect replies to queued scans and switches that have arrived.
    pub fn poll(&mut self) {
        self.poll_scan();
        self.poll_switch();
    }

    fn poll_scan(&mut self) {
        let Some(scanning) = &self.scanning else {
            return;
        };
        let result = match scanning.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(midiflash_core::SessionError::ControllerGone),
        };
        self.scanning = None;
        match result {
            Ok(ports) => self.apply_ports(ports),
            Err(e) => {
                log::warn!("Failed to list MIDI ports: {}", e);
                self.status_message = format!("Port scan failed: {}", e);
            }
        }
    }

    fn poll_switch(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        let message = match pending.reply.try_recv() {
            Ok(Ok(SwitchOutcome::Unchanged)) => format!("Already on {}", pending.source_id),
            Ok(Ok(SwitchOutcome::Started { .. })) => format!("Listening on {}", pending.source_id),
            Ok(Err(e)) => {
                log::warn!("{}", e);
                format!("Failed: {}", e)
            }
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => "Session controller stopped".to_string(),
        };
        self.status_message = message;
        self.pending = None;
    }

    /// Stop the coordinator and its threads.
    pub fn shutdown(self) {
        self.coordinator.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::Screen;
    use midiflash_core::{ui_channel, Rgba, UiInbox, VirtualProvider};
    use std::time::{Duration, Instant};

    fn start_with(
        provider: &VirtualProvider,
        preferred: Option<&str>,
        settle_ms: u64,
    ) -> (App, UiInbox<Screen>) {
        let mut config = Config::default();
        config.midi.port = preferred.map(str::to_string);
        config.midi.settle_ms = settle_ms;
        let (ui, inbox) = ui_channel::<Screen>();
        let coordinator =
            Coordinator::start(provider.clone(), ui, config.to_coordinator_config()).unwrap();
        (App::new(coordinator, config), inbox)
    }

    fn start(provider: &VirtualProvider, preferred: Option<&str>) -> (App, UiInbox<Screen>) {
        start_with(provider, preferred, 10)
    }

    /// Poll until no scan or switch is outstanding.
    fn settle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while (app.is_switching() || app.is_scanning()) && Instant::now() < deadline {
            app.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!app.is_switching(), "switch did not complete");
        assert!(!app.is_scanning(), "scan did not complete");
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(action_for_key(press(KeyCode::Char('q'))), Some(Action::Quit));
        assert_eq!(action_for_key(press(KeyCode::Esc)), Some(Action::Quit));
        assert_eq!(
            action_for_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(action_for_key(press(KeyCode::Char('c'))), Some(Action::NextColor));
        assert_eq!(action_for_key(press(KeyCode::Tab)), Some(Action::NextInput));
        assert_eq!(action_for_key(press(KeyCode::Char(' '))), Some(Action::Trigger));
        assert_eq!(action_for_key(press(KeyCode::Char('s'))), Some(Action::SaveSettings));
        assert_eq!(action_for_key(press(KeyCode::Char('z'))), None);

        let mut release = press(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(action_for_key(release), None);
    }

    #[test]
    fn test_refresh_selects_preferred_then_cycles() {
        let provider = VirtualProvider::with_inputs(["A", "B", "C"]);
        let (mut app, _inbox) = start(&provider, Some("B"));

        app.refresh();
        settle(&mut app);
        assert_eq!(app.session_status().active.as_deref(), Some("B"));
        assert_eq!(app.selected(), Some(1));
        assert_eq!(app.status_message(), "Listening on B");

        app.handle(Action::NextInput);
        settle(&mut app);
        assert_eq!(app.session_status().active.as_deref(), Some("C"));

        app.handle(Action::NextInput);
        settle(&mut app);
        assert_eq!(app.session_status().active.as_deref(), Some("A"));

        // Refresh while listening keeps the current input
        app.refresh();
        settle(&mut app);
        assert_eq!(app.session_status().active.as_deref(), Some("A"));
        assert_eq!(app.status_message(), "3 MIDI inputs");

        app.shutdown();
        assert_eq!(provider.live_listeners(), 0);
    }

    #[test]
    fn test_refresh_during_switch_does_not_block() {
        let provider = VirtualProvider::with_inputs(["A", "B"]);
        let (mut app, _inbox) = start_with(&provider, None, 400);
        app.refresh();
        settle(&mut app);
        assert_eq!(app.session_status().active.as_deref(), Some("A"));

        // The switch to B sleeps through the settle delay on the session thread
        app.handle(Action::NextInput);
        assert!(app.is_switching());
        let start = Instant::now();
        app.handle(Action::Refresh);
        app.poll();
        assert!(start.elapsed() < Duration::from_millis(100), "took {:?}", start.elapsed());
        assert!(app.is_scanning());

        settle(&mut app);
        assert_eq!(app.session_status().active.as_deref(), Some("B"));
        assert_eq!(app.ports().inputs.len(), 2);
    }

    #[test]
    fn test_refresh_without_inputs() {
        let provider = VirtualProvider::default();
        let (mut app, _inbox) = start(&provider, None);
        app.refresh();
        settle(&mut app);
        assert!(!app.is_switching());
        assert_eq!(app.status_message(), "No MIDI inputs found");
    }

    #[test]
    fn test_scan_failure_is_reported() {
        let provider = VirtualProvider::with_inputs(["A"]);
        provider.fail_enumeration(Some("driver gone"));
        let (mut app, _inbox) = start(&provider, None);
        app.refresh();
        settle(&mut app);
        assert!(app.status_message().starts_with("Port scan failed:"));
        assert!(app.ports().inputs.is_empty());
    }

    #[test]
    fn test_failed_switch_is_reported() {
        let provider = VirtualProvider::with_inputs(["A"]);
        provider.fail_open("A");
        let (mut app, _inbox) = start(&provider, None);

        app.refresh();
        settle(&mut app);
        assert!(app.status_message().starts_with("Failed:"));
        assert_eq!(app.session_status().state, SessionState::Idle);
    }

    #[test]
    fn test_policy_keys_validate() {
        let provider = VirtualProvider::default();
        let (mut app, _inbox) = start(&provider, None);

        app.handle(Action::FlashLonger);
        assert_eq!(app.policy().on_duration_ms, 110);

        // Gap may reach zero but not go below
        for _ in 0..10 {
            app.handle(Action::GapShorter);
        }
        assert_eq!(app.policy().gap_ms, 0);

        // Repetitions stay at least one
        app.handle(Action::FewerRepetitions);
        assert_eq!(app.policy().repetitions, 1);
        app.handle(Action::MoreRepetitions);
        assert_eq!(app.policy().repetitions, 2);

        // On time never reaches zero
        for _ in 0..20 {
            app.handle(Action::FlashShorter);
        }
        assert_eq!(app.policy().on_duration_ms, 10);

        app.handle(Action::NextColor);
        assert_eq!(app.policy().color, Rgba::RED.next_in_palette());

        assert!(app.handle(Action::ClearLog));
        assert!(!app.should_quit());
        app.handle(Action::Quit);
        assert!(app.should_quit());
    }

    #[test]
    fn test_save_settings_writes_current_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let provider = VirtualProvider::default();
        let (app, _inbox) = start(&provider, Some("Pads"));
        let mut app = app.with_config_path(path.clone());

        app.handle(Action::MoreRepetitions);
        app.handle(Action::NextColor);
        app.handle(Action::SaveSettings);
        assert_eq!(app.status_message(), "Settings saved");

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.flash.repetitions, 2);
        assert_eq!(saved.flash.color, "green");
        assert_eq!(saved.midi.port.as_deref(), Some("Pads"));
        assert_eq!(saved.flash_policy(), app.policy());
    }
}
