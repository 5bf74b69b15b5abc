//! Device Control Adapter
//!
//! Pushes control values to the camera driver through the external
//! `v4l2-ctl` utility. The utility is treated as an unreliable external
//! effector: a non-zero exit is reported and capture continues, while a
//! missing utility is fatal and requests overall shutdown.
//!
//! ## Command shape
//!
//! ```bash
//! v4l2-ctl -d <device-index> -c <control>=<value>
//! ```
//!
//! Success is exit code zero; stdout/stderr are captured and only
//! surfaced on failure.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// Camera controls the panel knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraControl {
    /// Exposure time in microseconds
    Exposure,
    /// Frame rate in frames per second
    FrameRate,
}

impl CameraControl {
    /// The control name understood by the control utility
    pub fn name(&self) -> &'static str {
        match self {
            CameraControl::Exposure => "exposure",
            CameraControl::FrameRate => "frame_rate",
        }
    }
}

impl fmt::Display for CameraControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error types for control pushes
#[derive(Debug, Error)]
pub enum ControlError {
    /// The control utility binary could not be found. Fatal: without it
    /// no setting will ever reach the hardware.
    #[error("Control utility '{0}' not found; install v4l-utils")]
    UtilityMissing(PathBuf),

    /// The utility ran but reported failure
    #[error("Setting {control}={value} failed: {stderr}")]
    CommandFailed {
        /// Control that was being set
        control: CameraControl,
        /// Value that was being pushed
        value: u32,
        /// Trimmed stderr from the utility
        stderr: String,
    },

    /// Spawning or waiting on the utility failed for another reason
    #[error("Control utility error: {0}")]
    Io(#[from] io::Error),
}

impl ControlError {
    /// Whether this failure should abort capture entirely
    pub fn is_fatal(&self) -> bool {
        matches!(self, ControlError::UtilityMissing(_))
    }
}

/// A sink for "set control to value" commands
///
/// Seam between the capture loop and the external utility; tests substitute
/// a recording fake to observe reconciliation behavior.
pub trait ControlBackend: Send {
    /// Push one control value to the hardware. Synchronous; may take
    /// non-trivial wall-clock time.
    fn set_control(&mut self, control: CameraControl, value: u32) -> Result<(), ControlError>;
}

/// Production backend shelling out to `v4l2-ctl`
#[derive(Debug, Clone)]
pub struct V4l2CtlBackend {
    device_index: usize,
    program: PathBuf,
}

impl V4l2CtlBackend {
    /// Backend for the given device index using `v4l2-ctl` from PATH
    pub fn new(device_index: usize) -> Self {
        Self::with_program(device_index, "v4l2-ctl")
    }

    /// Backend using an explicit utility path (used by tests)
    pub fn with_program(device_index: usize, program: impl Into<PathBuf>) -> Self {
        Self {
            device_index,
            program: program.into(),
        }
    }

    /// Device index this backend targets
    pub fn device_index(&self) -> usize {
        self.device_index
    }
}

impl ControlBackend for V4l2CtlBackend {
    fn set_control(&mut self, control: CameraControl, value: u32) -> Result<(), ControlError> {
        let assignment = format!("{}={}", control.name(), value);
        debug!(
            program = %self.program.display(),
            device = self.device_index,
            %assignment,
            "Pushing control value"
        );

        let output = Command::new(&self.program)
            .arg("-d")
            .arg(self.device_index.to_string())
            .arg("-c")
            .arg(&assignment)
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    ControlError::UtilityMissing(self.program.clone())
                } else {
                    ControlError::Io(e)
                }
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(%control, value, %stderr, "Control utility reported failure");
            Err(ControlError::CommandFailed {
                control,
                value,
                stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_names() {
        assert_eq!(CameraControl::Exposure.name(), "exposure");
        assert_eq!(CameraControl::FrameRate.name(), "frame_rate");
    }

    #[test]
    fn test_missing_utility_is_fatal() {
        let mut backend =
            V4l2CtlBackend::with_program(0, "/nonexistent/bin/v4l2-ctl-for-tests");
        let err = backend
            .set_control(CameraControl::Exposure, 800)
            .unwrap_err();
        assert!(matches!(err, ControlError::UtilityMissing(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_command_failure_is_not_fatal() {
        // `false` exists on any Linux box and exits non-zero regardless of args.
        let mut backend = V4l2CtlBackend::with_program(0, "false");
        let err = backend
            .set_control(CameraControl::FrameRate, 60)
            .unwrap_err();
        assert!(matches!(err, ControlError::CommandFailed { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_successful_push() {
        // `true` accepts any arguments and exits zero.
        let mut backend = V4l2CtlBackend::with_program(0, "true");
        assert!(backend.set_control(CameraControl::Exposure, 800).is_ok());
    }

    #[test]
    fn test_error_display_includes_control_and_value() {
        let err = ControlError::CommandFailed {
            control: CameraControl::Exposure,
            value: 800,
            stderr: "unknown control".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exposure=800"));
        assert!(msg.contains("unknown control"));
    }
}
