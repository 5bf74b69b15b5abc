//! Video Pipeline Module
//!
//! Everything between the camera and the consumers: device capture, the
//! acquisition loop, preview production, recording and still capture.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌────────▶ Presenter ──▶ UI event queue (preview)
//! V4L2 device ──▶ Capture Loop ──▶ latest-frame slot (snapshot source)
//!                      └────────▶ RecordingSession ──▶ ffmpeg ──▶ .avi
//!        ▲
//!        └── v4l2-ctl (Device Control Adapter, reconciled per iteration)
//! ```
//!
//! The capture loop owns the device handle on a dedicated thread; the
//! other components never touch the hardware directly. Frames are shared
//! as `Arc<VideoFrame>` with overwrite semantics: consumers only ever see
//! the newest frame, there is no queue or backlog.

pub mod capture;
pub mod capture_loop;
pub mod frame;
pub mod presenter;
pub mod recorder;
pub mod snapshot;
pub mod throughput;

pub use capture::{CaptureError, FrameSource, V4l2CaptureDevice};
pub use capture_loop::{CaptureHandle, CaptureLoopConfig, LoopState};
pub use frame::{PixelFormat, Resolution, VideoFrame};
pub use presenter::Presenter;
pub use recorder::{RecorderError, RecordingSession, VideoRecorder};
pub use snapshot::{save_snapshot, SnapshotError};
pub use throughput::{ThroughputMeter, ThroughputReading};
