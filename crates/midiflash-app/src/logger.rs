//! Custom logger that routes messages to the TUI log panel or stderr

use crossbeam_channel::Sender;
use log::{Level, LevelFilter, Metadata, Record};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

static TUI_MODE: AtomicBool = AtomicBool::new(false);
static TUI_LOG: Mutex<Option<Sender<String>>> = Mutex::new(None);

/// Logger that writes to stderr, or to the log panel while the TUI is up.
///
/// In TUI mode only warnings and errors reach the panel; note on lines
/// already arrive there through the message relay.
pub struct TuiLogger;

impl log::Log for TuiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if TUI_MODE.load(Ordering::Relaxed) {
            if record.level() <= Level::Warn {
                send_tui_line(format!("[{}] {}", record.level(), record.args()));
            }
        } else {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn send_tui_line(line: String) {
    if let Ok(guard) = TUI_LOG.lock() {
        if let Some(tx) = guard.as_ref() {
            let _ = tx.try_send(line);
        }
    }
}

fn default_level() -> LevelFilter {
    // Default to Info, but allow override via RUST_LOG
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Initialize the logger in normal mode (logs to stderr)
pub fn init_logger() {
    TUI_MODE.store(false, Ordering::Relaxed);
    if log::set_logger(&TUI_LOGGER).is_ok() {
        log::set_max_level(default_level());
    }
}

/// Switch logging to the TUI; lines are delivered on `tx`.
pub fn enter_tui_mode(tx: Sender<String>) {
    if let Ok(mut guard) = TUI_LOG.lock() {
        *guard = Some(tx);
    }
    TUI_MODE.store(true, Ordering::Relaxed);
}

/// Return to stderr logging, e.g. after the terminal is restored.
pub fn leave_tui_mode() {
    TUI_MODE.store(false, Ordering::Relaxed);
    if let Ok(mut guard) = TUI_LOG.lock() {
        *guard = None;
    }
}

static TUI_LOGGER: TuiLogger = TuiLogger;
