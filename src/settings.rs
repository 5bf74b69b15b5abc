//! Camera Settings
//!
//! Validated exposure/frame-rate settings plus the shared desired-settings
//! cell read by the capture loop.
//!
//! The panel distinguishes *desired* settings (what the user last applied)
//! from *applied* settings (what has actually been pushed to the hardware).
//! The UI side writes desired values through [`SharedSettings`]; the capture
//! loop reads a snapshot every iteration and converges the hardware toward
//! it via the control adapter. Out-of-range input is clamped, never
//! rejected, and the correction is signalled back to the caller so a UI can
//! display it.
//!
//! ## Example
//!
//! ```rust
//! use camera_panel_core::settings::{SharedSettings, CameraSettings, EXPOSURE_MAX};
//!
//! let shared = SharedSettings::new(CameraSettings::default());
//!
//! // An over-range apply is clamped and flagged.
//! let outcome = shared.apply_exposure(100_000);
//! assert_eq!(outcome.value, EXPOSURE_MAX);
//! assert!(outcome.adjusted);
//! assert_eq!(shared.snapshot().exposure_us, EXPOSURE_MAX);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Minimum exposure time in microseconds accepted by the driver
pub const EXPOSURE_MIN: u32 = 1;

/// Maximum exposure time in microseconds accepted by the driver
pub const EXPOSURE_MAX: u32 = 65523;

/// Minimum frame rate in frames per second accepted by the driver
pub const FRAME_RATE_MIN: u32 = 5;

/// Maximum frame rate in frames per second accepted by the driver
pub const FRAME_RATE_MAX: u32 = 120;

/// Default exposure time in microseconds
pub const DEFAULT_EXPOSURE_US: u32 = 800;

/// Default frame rate in frames per second
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Outcome of validating a requested setting value
///
/// Carries the corrected value plus a flag telling the caller whether the
/// request was adjusted, so a UI can warn instead of silently swallowing
/// the correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedValue {
    /// The value after clamping to the valid range
    pub value: u32,
    /// True when the requested value was outside the range
    pub adjusted: bool,
}

fn clamp_to_range(requested: i64, min: u32, max: u32) -> ClampedValue {
    let value = requested.clamp(min as i64, max as i64) as u32;
    ClampedValue {
        value,
        adjusted: value as i64 != requested,
    }
}

/// Clamp a requested exposure to [`EXPOSURE_MIN`]..=[`EXPOSURE_MAX`]
pub fn clamp_exposure(requested: i64) -> ClampedValue {
    clamp_to_range(requested, EXPOSURE_MIN, EXPOSURE_MAX)
}

/// Clamp a requested frame rate to [`FRAME_RATE_MIN`]..=[`FRAME_RATE_MAX`]
pub fn clamp_frame_rate(requested: i64) -> ClampedValue {
    clamp_to_range(requested, FRAME_RATE_MIN, FRAME_RATE_MAX)
}

/// A validated pair of camera settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Exposure time in microseconds
    pub exposure_us: u32,
    /// Frame rate in frames per second
    pub frame_rate: u32,
}

impl CameraSettings {
    /// Build settings from untrusted values, clamping both into range
    pub fn clamped(exposure_us: i64, frame_rate: i64) -> Self {
        Self {
            exposure_us: clamp_exposure(exposure_us).value,
            frame_rate: clamp_frame_rate(frame_rate).value,
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure_us: DEFAULT_EXPOSURE_US,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

/// Shared desired-settings cell
///
/// Written by the UI thread on Apply actions, read by the capture loop
/// every iteration. Two atomic cells with relaxed ordering: the loop
/// tolerates reading a slightly stale value, it only needs eventual
/// visibility.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<Cells>,
}

#[derive(Debug)]
struct Cells {
    exposure_us: AtomicU32,
    frame_rate: AtomicU32,
}

impl SharedSettings {
    /// Create a shared cell with the given initial settings
    pub fn new(initial: CameraSettings) -> Self {
        Self {
            inner: Arc::new(Cells {
                exposure_us: AtomicU32::new(initial.exposure_us),
                frame_rate: AtomicU32::new(initial.frame_rate),
            }),
        }
    }

    /// Apply a requested exposure, clamping it into range
    ///
    /// Returns the corrected value and whether it was adjusted.
    pub fn apply_exposure(&self, requested: i64) -> ClampedValue {
        let outcome = clamp_exposure(requested);
        self.inner
            .exposure_us
            .store(outcome.value, Ordering::Relaxed);
        outcome
    }

    /// Apply a requested frame rate, clamping it into range
    pub fn apply_frame_rate(&self, requested: i64) -> ClampedValue {
        let outcome = clamp_frame_rate(requested);
        self.inner.frame_rate.store(outcome.value, Ordering::Relaxed);
        outcome
    }

    /// Read the current desired settings
    pub fn snapshot(&self) -> CameraSettings {
        CameraSettings {
            exposure_us: self.inner.exposure_us.load(Ordering::Relaxed),
            frame_rate: self.inner.frame_rate.load(Ordering::Relaxed),
        }
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

/// Last values actually pushed to the hardware
///
/// Loop-local. `None` means the control has never been pushed, so the
/// first iteration always reconciles. Updated after every push attempt
/// whether or not the attempt succeeded (at-most-once-per-change).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedSettings {
    /// Last exposure pushed, if any
    pub exposure_us: Option<u32>,
    /// Last frame rate pushed, if any
    pub frame_rate: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposure_boundaries_pass_unchanged() {
        for value in [1, 65523] {
            let outcome = clamp_exposure(value);
            assert_eq!(outcome.value, value as u32);
            assert!(!outcome.adjusted);
        }
    }

    #[test]
    fn test_frame_rate_boundaries_pass_unchanged() {
        for value in [5, 120] {
            let outcome = clamp_frame_rate(value);
            assert_eq!(outcome.value, value as u32);
            assert!(!outcome.adjusted);
        }
    }

    #[test]
    fn test_exposure_out_of_range_is_clamped() {
        assert_eq!(clamp_exposure(0).value, EXPOSURE_MIN);
        assert_eq!(clamp_exposure(-5).value, EXPOSURE_MIN);
        assert_eq!(clamp_exposure(100_000).value, EXPOSURE_MAX);
        assert!(clamp_exposure(100_000).adjusted);
    }

    #[test]
    fn test_frame_rate_out_of_range_is_clamped() {
        assert_eq!(clamp_frame_rate(3).value, FRAME_RATE_MIN);
        assert_eq!(clamp_frame_rate(0).value, FRAME_RATE_MIN);
        assert_eq!(clamp_frame_rate(500).value, FRAME_RATE_MAX);
        assert!(clamp_frame_rate(3).adjusted);
    }

    #[test]
    fn test_in_range_values_are_not_flagged() {
        let outcome = clamp_exposure(7000);
        assert_eq!(outcome.value, 7000);
        assert!(!outcome.adjusted);
    }

    #[test]
    fn test_shared_settings_roundtrip() {
        let shared = SharedSettings::new(CameraSettings::default());
        assert_eq!(shared.snapshot().exposure_us, DEFAULT_EXPOSURE_US);

        shared.apply_exposure(1234);
        shared.apply_frame_rate(30);

        let snap = shared.snapshot();
        assert_eq!(snap.exposure_us, 1234);
        assert_eq!(snap.frame_rate, 30);
    }

    #[test]
    fn test_shared_settings_clamps_on_apply() {
        let shared = SharedSettings::default();
        let outcome = shared.apply_frame_rate(3);
        assert_eq!(outcome.value, FRAME_RATE_MIN);
        assert!(outcome.adjusted);
        assert_eq!(shared.snapshot().frame_rate, FRAME_RATE_MIN);
    }

    #[test]
    fn test_clamped_constructor() {
        let settings = CameraSettings::clamped(100_000, 3);
        assert_eq!(settings.exposure_us, EXPOSURE_MAX);
        assert_eq!(settings.frame_rate, FRAME_RATE_MIN);
    }

    #[test]
    fn test_applied_settings_start_unset() {
        let applied = AppliedSettings::default();
        assert_eq!(applied.exposure_us, None);
        assert_eq!(applied.frame_rate, None);
    }
}
