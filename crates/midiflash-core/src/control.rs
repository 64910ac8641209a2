//! Session control thread.
//!
//! The [`SourceSessionManager`] lives on its own thread and executes
//! commands one at a time. A [`SessionHandle`] sends commands and can either
//! wait for the reply or return immediately, so a UI thread can request a
//! switch without sleeping through the settle delay.

use crate::error::{Result, SessionError};
use crate::session::{SessionStatus, SourceSessionManager, StatusCell, SwitchOutcome};
use crate::source::{InputProvider, PortListing};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Commands executed by the session control thread.
pub enum SessionCommand {
    /// Switch to an input by id
    SwitchTo {
        source_id: String,
        reply: Option<Sender<Result<SwitchOutcome>>>,
    },
    /// Stop the active session
    Stop { reply: Option<Sender<()>> },
    /// Enumerate inputs and outputs
    ListPorts { reply: Sender<Result<PortListing>> },
    /// Stop the active session and exit the thread
    Shutdown,
}

/// Cloneable handle to the session control thread.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Sender<SessionCommand>,
    status: StatusCell,
}

impl SessionHandle {
    fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| SessionError::ControllerGone)
    }

    /// Switch to `source_id` and wait for the outcome.
    pub fn switch_to(&self, source_id: &str) -> Result<SwitchOutcome> {
        self.request_switch(source_id)?
            .recv()
            .map_err(|_| SessionError::ControllerGone)?
    }

    /// Queue a switch and return immediately.
    ///
    /// The outcome arrives on the returned receiver; dropping it is fine.
    pub fn request_switch(&self, source_id: &str) -> Result<Receiver<Result<SwitchOutcome>>> {
        let (reply, rx) = bounded(1);
        self.send(SessionCommand::SwitchTo {
            source_id: source_id.to_string(),
            reply: Some(reply),
        })?;
        Ok(rx)
    }

    /// Stop the active session and wait until it is stopped.
    pub fn stop(&self) -> Result<()> {
        let (reply, rx) = bounded(1);
        self.send(SessionCommand::Stop { reply: Some(reply) })?;
        rx.recv().map_err(|_| SessionError::ControllerGone)
    }

    /// Queue an enumeration on the control thread and return immediately.
    ///
    /// The listing arrives after every command queued before it, including a
    /// switch sleeping through its settle delay.
    pub fn request_list_ports(&self) -> Result<Receiver<Result<PortListing>>> {
        let (reply, rx) = bounded(1);
        self.send(SessionCommand::ListPorts { reply })?;
        Ok(rx)
    }

    /// Ask the control thread to stop the session and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(SessionCommand::Shutdown);
    }

    /// Latest published status. Reflects transitions inside a running
    /// switch, not only finished commands.
    pub fn status(&self) -> SessionStatus {
        self.status.read().expect("Status lock poisoned").clone()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Move `manager` onto a new control thread.
///
/// The thread exits on [`SessionHandle::shutdown`] or when every handle has
/// been dropped; either way the active session is stopped first.
pub fn spawn_session_thread<P>(
    manager: SourceSessionManager<P>,
) -> std::io::Result<(SessionHandle, JoinHandle<()>)>
where
    P: InputProvider + 'static,
{
    let (tx, rx) = unbounded();
    let status = manager.status_cell();

    let thread = thread::Builder::new()
        .name("midiflash-session".to_string())
        .spawn(move || run_session_loop(manager, rx))?;

    Ok((SessionHandle { tx, status }, thread))
}

fn run_session_loop<P: InputProvider>(mut manager: SourceSessionManager<P>, rx: Receiver<SessionCommand>) {
    log::debug!("[SESSION] control thread started");
    for command in rx.iter() {
        match command {
            SessionCommand::SwitchTo { source_id, reply } => {
                let result = manager.switch_to(&source_id);
                manager.set_last_error(result.as_ref().err().map(|e| e.to_string()));
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            SessionCommand::Stop { reply } => {
                manager.stop();
                manager.set_last_error(None);
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            SessionCommand::ListPorts { reply } => {
                let _ = reply.send(manager.list_ports());
            }
            SessionCommand::Shutdown => break,
        }
    }
    manager.stop();
    log::debug!("[SESSION] control thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalescer::TriggerCoalescer;
    use crate::event::DecodedEvent;
    use crate::relay::message_relay;
    use crate::session::{EventFanout, RelayMode, SessionState};
    use crate::source::VirtualProvider;
    use std::time::{Duration, Instant};

    fn spawn(provider: &VirtualProvider, settle: Duration) -> (SessionHandle, JoinHandle<()>, TriggerCoalescer) {
        let coalescer = TriggerCoalescer::new();
        let (relay, _receiver) = message_relay(8);
        let fanout = EventFanout::new(coalescer.clone(), relay, RelayMode::NoteOn);
        let manager = SourceSessionManager::new(provider.clone(), fanout).with_settle_delay(settle);
        let (handle, thread) = spawn_session_thread(manager).unwrap();
        (handle, thread, coalescer)
    }

    #[test]
    fn test_switch_through_handle() {
        let provider = VirtualProvider::with_inputs(["A", "B"]);
        provider.add_output("Out");
        let (handle, thread, coalescer) = spawn(&provider, Duration::from_millis(10));

        let ports = handle.request_list_ports().unwrap().recv().unwrap().unwrap();
        assert_eq!(ports.inputs.len(), 2);
        assert_eq!(ports.outputs.len(), 1);

        handle.switch_to("A").unwrap();
        assert_eq!(
            handle.status(),
            SessionStatus {
                state: SessionState::Listening,
                active: Some("A".to_string()),
                last_error: None,
            }
        );
        provider.send("A", DecodedEvent::note_on(0, 60, 100));
        assert!(coalescer.is_pending());

        let err = handle.switch_to("missing").unwrap_err();
        assert!(matches!(err, SessionError::SourceUnavailable(_)));
        let status = handle.status();
        assert_eq!(status.active.as_deref(), Some("A"));
        assert!(status.last_error.is_some());

        handle.stop().unwrap();
        assert_eq!(handle.status().state, SessionState::Idle);

        handle.shutdown();
        thread.join().unwrap();
        assert!(matches!(handle.switch_to("B"), Err(SessionError::ControllerGone)));
    }

    #[test]
    fn test_request_switch_does_not_block() {
        let provider = VirtualProvider::with_inputs(["A", "B"]);
        let settle = Duration::from_millis(300);
        let (handle, thread, _coalescer) = spawn(&provider, settle);
        handle.switch_to("A").unwrap();

        let start = Instant::now();
        let pending = handle.request_switch("B").unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));

        let outcome = pending.recv().unwrap().unwrap();
        assert!(start.elapsed() >= settle);
        assert_eq!(
            outcome,
            SwitchOutcome::Started {
                previous: Some("A".to_string())
            }
        );

        drop(handle);
        thread.join().unwrap();
        // Dropping every handle stops the session
        assert_eq!(provider.live_listeners(), 0);
    }

    #[test]
    fn test_status_shows_transitions_during_switch() {
        let provider = VirtualProvider::with_inputs(["A", "B"]);
        provider.delay_stop(Duration::from_millis(80));
        provider.delay_open(Duration::from_millis(80));
        let (handle, thread, _coalescer) = spawn(&provider, Duration::from_millis(80));
        handle.switch_to("A").unwrap();

        let pending = handle.request_switch("B").unwrap();
        let mut seen = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while pending.is_empty() && Instant::now() < deadline {
            let status = handle.status();
            if seen.last() != Some(&status) {
                seen.push(status);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        pending.recv().unwrap().unwrap();
        seen.push(handle.status());

        let states: Vec<SessionState> = seen.iter().map(|s| s.state).collect();
        assert!(states.contains(&SessionState::Stopping), "saw {:?}", states);
        assert!(states.contains(&SessionState::Idle), "saw {:?}", states);
        assert!(states.contains(&SessionState::Opening), "saw {:?}", states);

        // Once the stop began, A was never again reported as listening
        let stop_at = states
            .iter()
            .position(|s| *s == SessionState::Stopping)
            .unwrap();
        assert!(!seen[stop_at..].iter().any(|s| {
            s.state == SessionState::Listening && s.active.as_deref() == Some("A")
        }));
        assert_eq!(
            seen.last().unwrap(),
            &SessionStatus {
                state: SessionState::Listening,
                active: Some("B".to_string()),
                last_error: None,
            }
        );

        handle.shutdown();
        thread.join().unwrap();
    }

    #[test]
    fn test_request_list_ports_does_not_block() {
        let provider = VirtualProvider::with_inputs(["A", "B"]);
        let settle = Duration::from_millis(300);
        let (handle, thread, _coalescer) = spawn(&provider, settle);
        handle.switch_to("A").unwrap();

        let switching = handle.request_switch("B").unwrap();
        let start = Instant::now();
        let listing = handle.request_list_ports().unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));

        // Answered in order, after the queued switch
        let ports = listing.recv().unwrap().unwrap();
        assert_eq!(ports.inputs.len(), 2);
        assert!(!switching.is_empty());

        handle.shutdown();
        thread.join().unwrap();
    }
}
