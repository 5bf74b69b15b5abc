//! Camera Panel Facade
//!
//! The application-facing surface of the crate, decoupled from any UI
//! toolkit. A UI binds its widgets to this facade: Apply buttons call the
//! setting methods, action buttons call snapshot/recording methods, and
//! the redraw path drains the event receiver returned by [`CameraPanel::launch`].
//!
//! All methods are safe to call from the UI thread: none of them block on
//! the capture loop (shutdown excepted, which waits a bounded time by
//! design).
//!
//! ## Example
//!
//! ```rust,no_run
//! use camera_panel_core::panel::{CameraPanel, PanelConfig};
//! use camera_panel_core::event::PanelEvent;
//!
//! let (panel, mut events) = CameraPanel::launch(PanelConfig::default());
//!
//! // UI thread: apply a (clamped) exposure and drain events.
//! let outcome = panel.apply_exposure(100_000);
//! assert_eq!(outcome.value, 65523);
//!
//! while let Some(event) = events.blocking_recv() {
//!     if let PanelEvent::Fatal { error } = event {
//!         eprintln!("capture failed: {error}");
//!         break;
//!     }
//! }
//! # panel.shutdown().unwrap();
//! ```

use crate::control::{ControlBackend, V4l2CtlBackend};
use crate::error::{PanelError, Result};
use crate::event::{self, EventReceiver, DEFAULT_EVENT_CAPACITY};
use crate::settings::{CameraSettings, ClampedValue, SharedSettings};
use crate::video::capture::{CaptureError, FrameSource, V4l2CaptureDevice};
use crate::video::capture_loop::{self, CaptureHandle, CaptureLoopConfig, LoopState};
use crate::video::frame::VideoFrame;
use crate::video::presenter::Presenter;
use crate::video::recorder::VideoRecorder;
use crate::video::snapshot::save_snapshot;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Recording frame rate used when no target rate is set
pub const DEFAULT_RECORD_FPS: u32 = 30;

/// Panel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// V4L2 device index (`/dev/video<N>`)
    pub device_index: usize,
    /// Settings pushed to the camera when the loop starts
    pub initial: CameraSettings,
    /// Preview area width in pixels
    pub preview_width: u32,
    /// Preview area height in pixels
    pub preview_height: u32,
    /// Directory for still captures
    pub snapshot_dir: PathBuf,
    /// Default directory for recordings
    pub recording_dir: PathBuf,
    /// Capacity of the UI event queue
    pub event_capacity: usize,
    /// Control utility binary
    pub control_program: PathBuf,
    /// Video encoder binary
    pub encoder_program: PathBuf,
    /// How long shutdown waits for the capture thread
    pub shutdown_timeout: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            initial: CameraSettings::default(),
            preview_width: 640,
            preview_height: 480,
            snapshot_dir: PathBuf::from("captured_images"),
            recording_dir: PathBuf::from("recorded_videos"),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            control_program: PathBuf::from("v4l2-ctl"),
            encoder_program: PathBuf::from("ffmpeg"),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// The control panel core
///
/// Owns the capture loop and exposes the user actions: apply settings,
/// snapshot, start/stop recording, shut down.
pub struct CameraPanel {
    settings: SharedSettings,
    handle: CaptureHandle,
    recorder: VideoRecorder,
    snapshot_dir: PathBuf,
    recording_dir: PathBuf,
    shutdown_timeout: Duration,
}

impl CameraPanel {
    /// Launch the panel against the configured V4L2 device
    ///
    /// Returns immediately; device acquisition happens on the capture
    /// thread, and an open failure arrives as [`crate::event::PanelEvent::Fatal`].
    pub fn launch(config: PanelConfig) -> (Self, EventReceiver) {
        let index = config.device_index;
        let backend = V4l2CtlBackend::with_program(index, &config.control_program);
        Self::launch_with(
            config,
            move || V4l2CaptureDevice::open(index),
            backend,
            CaptureLoopConfig::default(),
        )
    }

    /// Launch the panel with a custom frame source and control backend
    ///
    /// The seam used by tests and simulations; `launch` is this with the
    /// real device and `v4l2-ctl`.
    pub fn launch_with<S, F, B>(
        config: PanelConfig,
        source_factory: F,
        backend: B,
        loop_config: CaptureLoopConfig,
    ) -> (Self, EventReceiver)
    where
        S: FrameSource + 'static,
        F: FnOnce() -> std::result::Result<S, CaptureError> + Send + 'static,
        B: ControlBackend + 'static,
    {
        let (events_tx, events_rx) = event::channel(config.event_capacity);
        let settings = SharedSettings::new(CameraSettings::clamped(
            config.initial.exposure_us as i64,
            config.initial.frame_rate as i64,
        ));
        let presenter = Presenter::new(
            config.preview_width,
            config.preview_height,
            events_tx.clone(),
        );

        let handle = capture_loop::spawn(
            source_factory,
            backend,
            settings.clone(),
            presenter,
            events_tx,
            loop_config,
        );

        let panel = Self {
            settings,
            handle,
            recorder: VideoRecorder::with_program(&config.encoder_program),
            snapshot_dir: config.snapshot_dir,
            recording_dir: config.recording_dir,
            shutdown_timeout: config.shutdown_timeout,
        };
        (panel, events_rx)
    }

    /// Apply a new desired exposure (microseconds), clamped into range
    ///
    /// The loop pushes the value to the hardware on its next iteration.
    pub fn apply_exposure(&self, requested: i64) -> ClampedValue {
        let outcome = self.settings.apply_exposure(requested);
        if outcome.adjusted {
            warn!(requested, clamped = outcome.value, "Exposure out of range");
        }
        outcome
    }

    /// Apply a new desired frame rate (FPS), clamped into range
    pub fn apply_frame_rate(&self, requested: i64) -> ClampedValue {
        let outcome = self.settings.apply_frame_rate(requested);
        if outcome.adjusted {
            warn!(requested, clamped = outcome.value, "Frame rate out of range");
        }
        outcome
    }

    /// Current desired settings
    pub fn settings(&self) -> CameraSettings {
        self.settings.snapshot()
    }

    /// Current capture-loop state
    pub fn state(&self) -> LoopState {
        self.handle.state()
    }

    /// Whether the capture run flag is still set
    ///
    /// Cleared by [`CameraPanel::shutdown`] and by the loop itself on a
    /// fatal error; once false it is never set again.
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Most recently captured frame, if any
    pub fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.handle.latest_frame()
    }

    /// Most recent measured capture rate in frames per second
    pub fn throughput_fps(&self) -> f64 {
        self.handle.fps()
    }

    /// Save the latest frame as a timestamped PNG in the snapshot directory
    pub fn snapshot(&self) -> Result<PathBuf> {
        let frame = self.handle.latest_frame().ok_or(PanelError::NoFrame)?;
        Ok(save_snapshot(&frame, &self.snapshot_dir)?)
    }

    /// Whether a recording session is active
    pub fn is_recording(&self) -> bool {
        self.handle.is_recording()
    }

    /// Start recording to `path`, or to a timestamped file in the default
    /// recording directory
    ///
    /// Target frame rate is the current desired frame rate (30 FPS if
    /// unset — a panel policy, not the recorder's); resolution is the
    /// device's native resolution, fixed for the whole session.
    pub fn start_recording(&self, path: Option<PathBuf>) -> Result<PathBuf> {
        if self.handle.state() != LoopState::Running {
            return Err(PanelError::CaptureNotRunning);
        }
        if self.handle.is_recording() {
            return Err(PanelError::AlreadyRecording);
        }
        let resolution = self
            .handle
            .resolution()
            .ok_or(PanelError::CaptureNotRunning)?;

        let desired = self.settings.snapshot();
        let fps = if desired.frame_rate > 0 {
            desired.frame_rate
        } else {
            DEFAULT_RECORD_FPS
        };

        let path = match path {
            Some(path) => path,
            None => self.default_recording_path()?,
        };

        let session = self.recorder.open(&path, fps, resolution)?;
        if let Err(mut rejected) = self.handle.begin_recording(session) {
            rejected.close();
            return Err(PanelError::AlreadyRecording);
        }

        info!(path = %path.display(), fps, "Recording started");
        Ok(path)
    }

    /// Stop the active recording session
    ///
    /// Returns whether a session was actually closed; calling this while
    /// idle is a no-op.
    pub fn stop_recording(&self) -> bool {
        match self.handle.end_recording() {
            Some(mut session) => {
                session.close();
                info!(path = %session.path().display(), frames = session.frames_written(), "Recording stopped");
                true
            }
            None => false,
        }
    }

    /// Shut the panel down
    ///
    /// Stops any recording, clears the run flag and waits up to the
    /// configured timeout for the capture thread to clean up. A timeout is
    /// reported as an error, not retried.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_recording();
        self.handle.shutdown(self.shutdown_timeout)
    }

    fn default_recording_path(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.recording_dir)?;
        let format = format_description!("[year][month][day]_[hour][minute][second]");
        let stamp = OffsetDateTime::now_utc()
            .format(&format)
            .unwrap_or_else(|_| "unknown".into());
        Ok(self.recording_dir.join(format!("video_{}.avi", stamp)))
    }
}
