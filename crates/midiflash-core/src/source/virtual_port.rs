//! In-memory MIDI ports.
//!
//! [`VirtualProvider`] exposes named inputs whose events are injected with
//! [`VirtualProvider::send`]. It records every open, listen and stop call,
//! and individual ports can be told to fail on open or listen. Delivery and
//! stop share a lock, so no event reaches a callback after its stop returns.

use super::{EventCallback, InputProvider, OpenSource, SourceDescriptor, StopHandle};
use crate::error::{Result, SessionError};
use crate::event::DecodedEvent;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// A provider call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Open(String),
    Listen(String),
    Stop(String),
}

type CallbackSlot = Arc<Mutex<Option<EventCallback>>>;

#[derive(Default)]
struct VirtualState {
    inputs: Vec<String>,
    outputs: Vec<String>,
    failing_open: HashSet<String>,
    failing_listen: HashSet<String>,
    listeners: HashMap<String, CallbackSlot>,
    calls: Vec<(Instant, ProviderCall)>,
    enumeration_error: Option<String>,
    open_delay: Duration,
    stop_delay: Duration,
}

/// Scriptable in-memory provider. Clones share the same ports.
#[derive(Clone, Default)]
pub struct VirtualProvider {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualProvider {
    /// Create a provider with the given input names.
    pub fn with_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::default();
        for name in inputs {
            provider.add_input(name);
        }
        provider
    }

    fn state(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().expect("Virtual provider lock poisoned")
    }

    pub fn add_input(&self, name: impl Into<String>) {
        self.state().inputs.push(name.into());
    }

    pub fn add_output(&self, name: impl Into<String>) {
        self.state().outputs.push(name.into());
    }

    /// Make every `open` take `delay`, like a slow driver.
    pub fn delay_open(&self, delay: Duration) {
        self.state().open_delay = delay;
    }

    /// Make every `stop` take `delay`.
    pub fn delay_stop(&self, delay: Duration) {
        self.state().stop_delay = delay;
    }

    /// Make `open` fail for this input.
    pub fn fail_open(&self, name: impl Into<String>) {
        self.state().failing_open.insert(name.into());
    }

    /// Make `listen` fail for this input.
    pub fn fail_listen(&self, name: impl Into<String>) {
        self.state().failing_listen.insert(name.into());
    }

    /// Make enumeration fail with `reason`, or succeed again with `None`.
    pub fn fail_enumeration(&self, reason: Option<&str>) {
        self.state().enumeration_error = reason.map(str::to_string);
    }

    /// Deliver an event to the listener on `name`.
    ///
    /// Returns `false` if nobody is listening there.
    pub fn send(&self, name: &str, event: DecodedEvent) -> bool {
        let slot = self.state().listeners.get(name).cloned();
        let Some(slot) = slot else {
            return false;
        };
        let mut callback = slot.lock().expect("Virtual port lock poisoned");
        match callback.as_mut() {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Whether a listener is currently attached to `name`.
    pub fn is_listening(&self, name: &str) -> bool {
        let slot = self.state().listeners.get(name).cloned();
        slot.map(|s| s.lock().expect("Virtual port lock poisoned").is_some())
            .unwrap_or(false)
    }

    /// Number of inputs with an attached listener.
    pub fn live_listeners(&self) -> usize {
        let slots: Vec<CallbackSlot> = self.state().listeners.values().cloned().collect();
        slots
            .iter()
            .filter(|s| s.lock().expect("Virtual port lock poisoned").is_some())
            .count()
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Calls made so far, with the time each happened.
    pub fn timed_calls(&self) -> Vec<(Instant, ProviderCall)> {
        self.state().calls.clone()
    }

    fn record(&self, call: ProviderCall) {
        self.state().calls.push((Instant::now(), call));
    }

    fn enumerate(&self, names: &[String]) -> Result<Vec<SourceDescriptor>> {
        Ok(names
            .iter()
            .enumerate()
            .map(|(index, id)| SourceDescriptor {
                id: id.clone(),
                index,
            })
            .collect())
    }
}

impl InputProvider for VirtualProvider {
    fn list_inputs(&self) -> Result<Vec<SourceDescriptor>> {
        let state = self.state();
        if let Some(reason) = &state.enumeration_error {
            return Err(SessionError::SourceUnavailable(reason.clone()));
        }
        self.enumerate(&state.inputs)
    }

    fn list_outputs(&self) -> Result<Vec<SourceDescriptor>> {
        let state = self.state();
        if let Some(reason) = &state.enumeration_error {
            return Err(SessionError::SourceUnavailable(reason.clone()));
        }
        self.enumerate(&state.outputs)
    }

    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn OpenSource>> {
        self.record(ProviderCall::Open(source.id.clone()));
        let delay = self.state().open_delay;
        thread::sleep(delay);
        if self.state().failing_open.contains(&source.id) {
            return Err(SessionError::OpenFailed {
                source_id: source.id.clone(),
                reason: "device busy".to_string(),
            });
        }
        Ok(Box::new(VirtualOpenSource {
            provider: self.clone(),
            name: source.id.clone(),
        }))
    }
}

struct VirtualOpenSource {
    provider: VirtualProvider,
    name: String,
}

impl OpenSource for VirtualOpenSource {
    fn listen(self: Box<Self>, callback: EventCallback) -> Result<Box<dyn StopHandle>> {
        let provider = self.provider;
        provider.record(ProviderCall::Listen(self.name.clone()));

        let slot = {
            let mut state = provider.state();
            if state.failing_listen.contains(&self.name) {
                return Err(SessionError::ListenFailed {
                    source_id: self.name.clone(),
                    reason: "stream refused".to_string(),
                });
            }
            state.listeners.entry(self.name.clone()).or_default().clone()
        };

        let mut current = slot.lock().expect("Virtual port lock poisoned");
        if current.is_some() {
            return Err(SessionError::ListenFailed {
                source_id: self.name.clone(),
                reason: "already listening".to_string(),
            });
        }
        *current = Some(callback);
        drop(current);

        Ok(Box::new(VirtualStopHandle {
            provider,
            name: self.name,
            slot,
            stopped: false,
        }))
    }
}

struct VirtualStopHandle {
    provider: VirtualProvider,
    name: String,
    slot: CallbackSlot,
    stopped: bool,
}

impl StopHandle for VirtualStopHandle {
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let delay = self.provider.state().stop_delay;
        thread::sleep(delay);
        // Waits for an in-flight delivery to finish
        self.slot.lock().expect("Virtual port lock poisoned").take();
        self.provider.record(ProviderCall::Stop(self.name.clone()));
    }
}

impl Drop for VirtualStopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_listen_send_stop() {
        let provider = VirtualProvider::with_inputs(["Pads"]);
        provider.add_output("Synth");

        let listing = provider.list_ports().unwrap();
        assert_eq!(listing.inputs[0].id, "Pads");
        assert_eq!(listing.outputs[0].id, "Synth");

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let open = provider.open(&listing.inputs[0]).unwrap();
        let mut stop = open
            .listen(Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(provider.send("Pads", DecodedEvent::note_on(0, 60, 100)));
        assert!(provider.is_listening("Pads"));
        stop.stop();
        stop.stop();
        assert!(!provider.send("Pads", DecodedEvent::note_on(0, 60, 100)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::Open("Pads".into()),
                ProviderCall::Listen("Pads".into()),
                ProviderCall::Stop("Pads".into()),
            ]
        );
    }

    #[test]
    fn test_second_listener_is_refused() {
        let provider = VirtualProvider::with_inputs(["Pads"]);
        let source = provider.list_inputs().unwrap().remove(0);
        let _first = provider
            .open(&source)
            .unwrap()
            .listen(Box::new(|_| {}))
            .unwrap();
        let second = provider.open(&source).unwrap().listen(Box::new(|_| {}));
        assert!(matches!(second, Err(SessionError::ListenFailed { .. })));
        assert_eq!(provider.live_listeners(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let provider = VirtualProvider::with_inputs(["A", "B"]);
        provider.fail_open("A");
        provider.fail_listen("B");
        let inputs = provider.list_inputs().unwrap();

        assert!(matches!(
            provider.open(&inputs[0]),
            Err(SessionError::OpenFailed { .. })
        ));
        let listen = provider.open(&inputs[1]).unwrap().listen(Box::new(|_| {}));
        assert!(matches!(listen, Err(SessionError::ListenFailed { .. })));

        provider.fail_enumeration(Some("driver gone"));
        assert!(provider.list_inputs().is_err());
        provider.fail_enumeration(None);
        assert_eq!(provider.list_inputs().unwrap().len(), 2);
    }
}
