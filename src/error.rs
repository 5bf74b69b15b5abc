//! Error types for camera-panel-core

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::control::ControlError;
use crate::video::capture::CaptureError;
use crate::video::recorder::RecorderError;
use crate::video::snapshot::SnapshotError;

/// Result type alias using PanelError
pub type Result<T> = std::result::Result<T, PanelError>;

/// Panel error types
///
/// All errors that can surface from the panel facade. Module-level errors
/// (capture, control, recorder, snapshot) convert into this type at the
/// API boundary; inside the capture loop they are handled per the
/// fatal/transient taxonomy instead of being propagated.
#[derive(Debug, Error)]
pub enum PanelError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Capture-device error
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Device-control error
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// Recorder error
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    /// Snapshot error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// No frame has been captured yet
    #[error("No frame available yet")]
    NoFrame,

    /// The capture loop is not in the Running state
    #[error("Capture loop is not running")]
    CaptureNotRunning,

    /// A recording session is already active
    #[error("Recording already in progress")]
    AlreadyRecording,

    /// The capture thread did not acknowledge shutdown in time
    #[error("Capture thread did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PanelError {
    /// Create an Other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
