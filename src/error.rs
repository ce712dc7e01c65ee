//! Error taxonomy for the meeting automation engine.
//!
//! Errors fall into two classes. Strategy-local errors (`AdmissionDenied`,
//! `ManualInterventionRequired`, `JoinControlNotFound`, `AdmissionNotConfirmed`,
//! `ElementNotFound`) abort a single entry strategy; the orchestrator converts
//! them into a failed strategy result and moves on to the next one. Everything
//! else surfaces directly to the caller of the session manager.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type MeetResult<T> = Result<T, MeetError>;

/// Errors produced by the meeting automation engine.
#[derive(Debug, Error)]
pub enum MeetError {
    /// The browser process failed to start or did not come up within the
    /// launch timeout. Fatal to the whole join attempt.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// The meeting page showed an explicit "can't join" signal.
    #[error("Meeting denied admission")]
    AdmissionDenied,

    /// A two-factor or verification challenge was detected during provider
    /// login. Not resolvable automatically.
    #[error("Manual intervention required (verification challenge detected)")]
    ManualInterventionRequired,

    /// No join/admit control appeared within the bounded wait.
    #[error("Join control did not appear within the timeout")]
    JoinControlNotFound,

    /// Post-join UI markers never appeared after clicking the join control.
    #[error("Admission was not confirmed within the timeout")]
    AdmissionNotConfirmed,

    /// A selector resolved to nothing during an interaction.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Every entry strategy, including the emergency fallback, failed.
    #[error("Failed to join meeting after {attempts} strategy attempts")]
    JoinFailed { attempts: usize },

    /// A recording is already active.
    #[error("A recording is already in progress")]
    AlreadyRecording,

    /// The external capture tool is missing or unusable.
    #[error("Recorder unavailable: {0}")]
    RecorderUnavailable(String),

    /// A recording operation was requested outside of a meeting.
    #[error("Not currently in a meeting")]
    NotInMeeting,

    /// The manager already holds an active meeting.
    #[error("Already in a meeting; leave first")]
    AlreadyInMeeting,

    /// A join was requested without a meeting URL.
    #[error("No meeting URL provided")]
    MissingMeetingUrl,

    /// The session was closed while an operation was pending.
    #[error("Session has been closed")]
    SessionClosed,

    /// A driver-level page operation failed.
    #[error("Page operation failed: {0}")]
    Page(String),

    /// Filesystem failure (recording directory, screenshots).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MeetError {
    /// True for errors that abort one entry strategy but allow the
    /// orchestrator to try the next one.
    pub fn is_strategy_local(&self) -> bool {
        matches!(
            self,
            MeetError::AdmissionDenied
                | MeetError::ManualInterventionRequired
                | MeetError::JoinControlNotFound
                | MeetError::AdmissionNotConfirmed
                | MeetError::ElementNotFound(_)
        )
    }

    /// Helper for wrapping filesystem errors with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeetError::Io {
            path: path.into(),
            source,
        }
    }
}
