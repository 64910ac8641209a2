//! Helpers shared by the unit tests.

use crate::policy::Rgba;
use crate::ui::{LogSink, UiInbox, VisualSink};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Color(Rgba),
    Redraw,
}

/// A UI-owned surface that records everything done to it.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub mutations: Vec<(Instant, Mutation)>,
    pub lines: Vec<String>,
}

impl RecordingSurface {
    /// Colors set so far, in order.
    pub fn colors(&self) -> Vec<Rgba> {
        self.mutations
            .iter()
            .filter_map(|(_, m)| match m {
                Mutation::Color(c) => Some(*c),
                Mutation::Redraw => None,
            })
            .collect()
    }

    /// Timestamps of the color changes.
    pub fn color_times(&self) -> Vec<Instant> {
        self.mutations
            .iter()
            .filter(|(_, m)| matches!(m, Mutation::Color(_)))
            .map(|(t, _)| *t)
            .collect()
    }
}

impl VisualSink for RecordingSurface {
    fn set_color(&mut self, color: Rgba) {
        self.mutations.push((Instant::now(), Mutation::Color(color)));
    }

    fn redraw(&mut self) {
        self.mutations.push((Instant::now(), Mutation::Redraw));
    }
}

impl LogSink for RecordingSurface {
    fn append(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Act as the UI thread: run queued tasks until `done` holds or `limit`
/// elapses. Returns whether `done` was reached.
pub fn pump_until<S, F>(inbox: &UiInbox<S>, state: &mut S, limit: Duration, done: F) -> bool
where
    F: Fn(&S) -> bool,
{
    let deadline = Instant::now() + limit;
    while !done(state) {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let remaining = (deadline - now).min(Duration::from_millis(10));
        if inbox.run_for(state, remaining).is_none() {
            return done(state);
        }
    }
    true
}
