//! Error types for source session management

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors reported by the source session manager.
///
/// None of these are fatal: after any of them the manager is left without
/// an active listener and a later switch may succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Enumeration failed or the requested source is not present
    #[error("MIDI source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source exists but could not be opened
    #[error("Failed to open MIDI source '{source_id}': {reason}")]
    OpenFailed { source_id: String, reason: String },

    /// The source opened but refused to start streaming
    #[error("Failed to listen on MIDI source '{source_id}': {reason}")]
    ListenFailed { source_id: String, reason: String },

    /// The session control thread has exited
    #[error("Session control thread is not running")]
    ControllerGone,
}
