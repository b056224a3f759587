//! Error handling for the share coordinator
//!
//! All coordinator operations return [`Result`], an alias over [`ShareError`].
//! Errors from underlying libraries convert automatically through `thiserror`.
//!
//! ## Error Categories
//!
//! ### User Cancellation
//! [`ShareError::Aborted`] is the expected outcome when the picker is closed
//! or cancelled before a commit. It is not logged as a failure.
//!
//! ### Backend Failures
//! [`ShareError::VirtualMic`] is returned when the virtual microphone could
//! not be started during a commit. It is handed back to the picker's caller.
//!
//! ### Reconciliation Failures
//! [`ShareError::ConnectionNotFound`], [`ShareError::NoVideoTrack`] and
//! [`ShareError::Constraint`] come out of the constraint applier. The deferred
//! step only logs them.
//!
//! ### Workflow Errors
//! [`ShareError::UnknownSource`] and [`ShareError::InvalidTransition`] are
//! raised by the picker state machine for actions it cannot accept. The
//! workflow stays in its current state.

use thiserror::Error;

use crate::picker::PickerState;

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, ShareError>;

/// Errors that can occur while configuring a screen share
///
/// # Examples
///
/// ```rust
/// use cosmic_ext_share_core::ShareError;
///
/// let error = ShareError::Aborted;
/// assert!(error.is_cancellation());
///
/// let error = ShareError::UnknownSource("window:42".to_string());
/// assert_eq!(error.to_string(), "Unknown source: window:42");
/// ```
#[derive(Error, Debug)]
pub enum ShareError {
    /// The picker was cancelled or closed before a commit
    #[error("Aborted")]
    Aborted,

    /// Virtual microphone backend failure
    #[error("Virtual microphone error: {0}")]
    VirtualMic(String),

    /// The current platform has no virtual audio backend
    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    /// Thumbnail provider failure
    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    /// A source id that is not part of the picker's source list
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// The picker was asked to skip source selection but got no sources
    #[error("No sources to share")]
    NoSources,

    /// An action the picker cannot accept in its current state
    #[error("Invalid transition: {action} while {state:?}")]
    InvalidTransition {
        /// State the workflow was in
        state: PickerState,
        /// Name of the rejected action
        action: &'static str,
    },

    /// The media engine does not know the local user yet
    #[error("Local user is not known")]
    NoLocalUser,

    /// No connection is owned by the given user
    #[error("No connection owned by user {0}")]
    ConnectionNotFound(String),

    /// The owning connection has no video track yet
    #[error("Connection has no video track")]
    NoVideoTrack,

    /// The media track rejected a constraint request
    #[error("Constraint error: {0}")]
    Constraint(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShareError {
    /// Whether this error is the user backing out of the picker
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ShareError::Aborted)
    }

    /// Whether this error comes from an out-of-process backend
    ///
    /// Backend errors are reported to the caller; the coordinator never
    /// retries them.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            ShareError::VirtualMic(_) | ShareError::Unsupported(_) | ShareError::Io(_)
        )
    }

    /// Get a user-friendly error message suitable for display in UI
    pub fn user_message(&self) -> String {
        match self {
            ShareError::Aborted => "Screen share cancelled.".to_string(),
            ShareError::VirtualMic(msg) => {
                format!("Could not start stream audio: {}. Check PipeWire.", msg)
            }
            ShareError::Unsupported(_) => {
                "Stream audio is not supported on this system.".to_string()
            }
            ShareError::NoSources => "Nothing to share was found.".to_string(),
            other => other.to_string(),
        }
    }
}
