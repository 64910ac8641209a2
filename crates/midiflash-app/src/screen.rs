//! UI-thread state: the flash surface and the event log.

use midiflash_core::{LogSink, Rgba, VisualSink};
use std::collections::VecDeque;

/// Default number of log lines kept for display.
pub const DEFAULT_LOG_LINES: usize = 200;

/// Everything the worker threads mutate, owned by the UI thread.
#[derive(Debug)]
pub struct Screen {
    /// Color currently set on the surface
    pub color: Rgba,
    /// Color last drawn to the terminal
    pub painted: Rgba,
    /// Number of redraws requested so far
    pub redraws: u64,
    log: VecDeque<String>,
    max_lines: usize,
}

impl Screen {
    pub fn new(idle_color: Rgba) -> Self {
        Self::with_capacity(idle_color, DEFAULT_LOG_LINES)
    }

    pub fn with_capacity(idle_color: Rgba, max_lines: usize) -> Self {
        Self {
            color: idle_color,
            painted: idle_color,
            redraws: 0,
            log: VecDeque::with_capacity(max_lines),
            max_lines: max_lines.max(1),
        }
    }

    /// Logged lines, oldest first.
    pub fn log_lines(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new(Rgba::BLACK)
    }
}

impl VisualSink for Screen {
    fn set_color(&mut self, color: Rgba) {
        self.color = color;
    }

    fn redraw(&mut self) {
        self.painted = self.color;
        self.redraws += 1;
    }
}

impl LogSink for Screen {
    fn append(&mut self, line: &str) {
        if self.log.len() == self.max_lines {
            self.log.pop_front();
        }
        self.log.push_back(line.to_string());
    }
}
