//! camera-panel-core
//!
//! Control-panel core for V4L2 cameras: live preview, adjustable
//! exposure/frame-rate, still capture and video recording.
//!
//! ## Architecture
//!
//! The crate is UI-toolkit agnostic. A frontend owns two things: the
//! [`panel::CameraPanel`] facade (user actions go in) and the
//! [`event::PanelEvent`] receiver (preview images and status come out).
//! Between them, a dedicated capture thread owns the camera:
//!
//! ```text
//! UI thread                 capture thread               external
//! ─────────                 ──────────────               ────────
//! Apply actions ──▶ SharedSettings ──▶ reconcile ──────▶ v4l2-ctl
//! record/still  ──▶ CameraPanel       read frame ◀────── /dev/video<N>
//! redraw        ◀── event queue  ◀─── Presenter
//!                                 └── RecordingSession ─▶ ffmpeg ─▶ .avi
//! ```
//!
//! The capture loop converges *applied* settings toward *desired* settings
//! once per change, tolerates transient read/control/recording failures,
//! and shuts down cooperatively. See the `video` module docs for the loop's
//! state machine.
//!
//! ## Example
//!
//! ```rust,no_run
//! use camera_panel_core::{CameraPanel, PanelConfig, PanelEvent};
//!
//! let (panel, mut events) = CameraPanel::launch(PanelConfig::default());
//!
//! panel.apply_exposure(7000);
//! while let Some(event) = events.blocking_recv() {
//!     match event {
//!         PanelEvent::Preview(_image) => { /* redraw */ }
//!         PanelEvent::Fatal { error } => { eprintln!("{error}"); break; }
//!         _ => {}
//!     }
//! }
//! panel.shutdown().unwrap();
//! ```

// Re-export commonly used types
pub use error::{PanelError, Result};
pub use event::{PanelEvent, PreviewImage};
pub use panel::{CameraPanel, PanelConfig};
pub use settings::{CameraSettings, ClampedValue, SharedSettings};
pub use video::{LoopState, VideoFrame};

// Public modules
pub mod control;
pub mod error;
pub mod event;
pub mod panel;
pub mod settings;
pub mod video;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
