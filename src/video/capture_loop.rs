//! Capture Loop
//!
//! The background daemon that owns the camera for the lifetime of the
//! panel. Runs on a dedicated thread because device reads and the control
//! utility both block. Each iteration reconciles desired vs. applied
//! settings, pulls one frame, publishes it as the latest, appends it to an
//! active recording, hands it to the presenter, then yields briefly.
//!
//! ## State machine
//!
//! ```text
//! Opening ──open ok──▶ Running ──run flag cleared──▶ Stopping ──▶ Stopped
//!    │                    │
//!    └──open failed───────┴──fatal control error──▶ Stopped (Fatal event)
//! ```
//!
//! Cancellation is cooperative: the run flag is observed at the top of each
//! iteration, so shutdown latency is bounded by one iteration plus the
//! yield sleep (or the read-retry delay when the device is stalling).

use crate::control::{CameraControl, ControlBackend, ControlError};
use crate::error::PanelError;
use crate::event::{EventSender, PanelEvent};
use crate::settings::{AppliedSettings, CameraSettings, SharedSettings};
use crate::video::capture::{CaptureError, FrameSource};
use crate::video::frame::{Resolution, VideoFrame};
use crate::video::presenter::Presenter;
use crate::video::recorder::RecordingSession;
use crate::video::throughput::{ThroughputMeter, ThroughputReading};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Wait between retries after a failed frame read
pub const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Per-iteration sleep. A cooperative rate-limiter, not a frame-rate
/// governor: actual throughput is whatever the device delivers.
pub const IDLE_YIELD: Duration = Duration::from_millis(10);

/// Timing knobs for the loop (tests shrink these)
#[derive(Debug, Clone, Copy)]
pub struct CaptureLoopConfig {
    /// Wait after a failed frame read before retrying
    pub read_retry_delay: Duration,
    /// Per-iteration yield sleep
    pub idle_yield: Duration,
}

impl Default for CaptureLoopConfig {
    fn default() -> Self {
        Self {
            read_retry_delay: READ_RETRY_DELAY,
            idle_yield: IDLE_YIELD,
        }
    }
}

/// Observable capture-loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Acquiring the device handle
    Opening = 0,
    /// Pulling frames
    Running = 1,
    /// Run flag cleared, finishing the current iteration
    Stopping = 2,
    /// Device released; terminal
    Stopped = 3,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Opening,
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }
}

/// Shared cells the loop publishes into
struct SharedParts {
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    latest: Arc<Mutex<Option<Arc<VideoFrame>>>>,
    recorder_slot: Arc<Mutex<Option<RecordingSession>>>,
    resolution: Arc<OnceLock<Resolution>>,
}

/// Handle to a spawned capture loop
///
/// Owns the run flag and the join handle; everything else is shared with
/// the loop thread.
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    latest: Arc<Mutex<Option<Arc<VideoFrame>>>>,
    recorder_slot: Arc<Mutex<Option<RecordingSession>>>,
    resolution: Arc<OnceLock<Resolution>>,
    throughput: ThroughputReading,
    done: std::sync::mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

/// Spawn the capture loop on its own thread
///
/// The source is constructed *on the loop thread* via `source_factory`, so
/// device acquisition never blocks the caller; an open failure surfaces as
/// a [`PanelEvent::Fatal`] and the loop goes straight to `Stopped`.
pub fn spawn<S, F, B>(
    source_factory: F,
    backend: B,
    settings: SharedSettings,
    presenter: Presenter,
    events: EventSender,
    config: CaptureLoopConfig,
) -> CaptureHandle
where
    S: FrameSource + 'static,
    F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
    B: ControlBackend + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let state = Arc::new(AtomicU8::new(LoopState::Opening as u8));
    let latest = Arc::new(Mutex::new(None));
    let recorder_slot = Arc::new(Mutex::new(None));
    let resolution = Arc::new(OnceLock::new());

    let meter = ThroughputMeter::new();
    let throughput = meter.reading();
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    let shared = SharedParts {
        running: Arc::clone(&running),
        state: Arc::clone(&state),
        latest: Arc::clone(&latest),
        recorder_slot: Arc::clone(&recorder_slot),
        resolution: Arc::clone(&resolution),
    };

    let thread_events = events.clone();
    let spawned = thread::Builder::new()
        .name("capture-loop".into())
        .spawn(move || {
            run(
                source_factory,
                backend,
                settings,
                presenter,
                thread_events,
                config,
                shared,
                meter,
            );
            let _ = done_tx.send(());
        });

    let thread = match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(error = %e, "Failed to spawn capture thread");
            running.store(false, Ordering::Relaxed);
            state.store(LoopState::Stopped as u8, Ordering::Relaxed);
            let _ = events.try_send(PanelEvent::Fatal {
                error: format!("capture thread: {}", e),
            });
            None
        }
    };

    CaptureHandle {
        running,
        state,
        latest,
        recorder_slot,
        resolution,
        throughput,
        done: done_rx,
        thread,
    }
}

impl CaptureHandle {
    /// Current loop state
    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Whether the run flag is still set
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Most recently captured frame, if any
    pub fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }

    /// Device resolution, available once the loop has opened the source
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution.get().copied()
    }

    /// Most recent measured capture rate
    pub fn fps(&self) -> f64 {
        self.throughput.fps()
    }

    /// Whether a recording session is active
    pub fn is_recording(&self) -> bool {
        self.recorder_slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Install a recording session; the loop appends every captured frame
    ///
    /// Returns the session back if one is already active.
    pub fn begin_recording(
        &self,
        session: RecordingSession,
    ) -> Result<(), RecordingSession> {
        match self.recorder_slot.lock() {
            Ok(mut slot) => {
                if slot.is_some() {
                    return Err(session);
                }
                *slot = Some(session);
                Ok(())
            }
            Err(_) => Err(session),
        }
    }

    /// Remove the active recording session without closing it
    pub fn end_recording(&self) -> Option<RecordingSession> {
        self.recorder_slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Request shutdown and wait for the loop to exit
    ///
    /// Cooperative: clears the run flag and waits up to `timeout` for the
    /// thread to finish its iteration and clean up. An overrun is reported
    /// as [`PanelError::ShutdownTimeout`] and not retried.
    pub fn shutdown(&mut self, timeout: Duration) -> crate::error::Result<()> {
        self.running.store(false, Ordering::Relaxed);

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(?timeout, "Capture thread did not stop in time");
                Err(PanelError::ShutdownTimeout(timeout))
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run<S, F, B>(
    source_factory: F,
    mut backend: B,
    settings: SharedSettings,
    mut presenter: Presenter,
    events: EventSender,
    config: CaptureLoopConfig,
    shared: SharedParts,
    mut meter: ThroughputMeter,
) where
    S: FrameSource,
    F: FnOnce() -> Result<S, CaptureError>,
    B: ControlBackend,
{
    let source = match source_factory() {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "Failed to open capture device");
            let _ = events.try_send(PanelEvent::Fatal {
                error: e.to_string(),
            });
            shared.running.store(false, Ordering::Relaxed);
            shared
                .state
                .store(LoopState::Stopped as u8, Ordering::Relaxed);
            return;
        }
    };

    let resolution = source.resolution();
    let _ = shared.resolution.set(resolution);
    shared
        .state
        .store(LoopState::Running as u8, Ordering::Relaxed);
    info!(%resolution, "Capture loop running");

    let source = run_iterations(
        source,
        &mut backend,
        &settings,
        &mut presenter,
        &events,
        &config,
        &shared,
        &mut meter,
    );

    shared
        .state
        .store(LoopState::Stopping as u8, Ordering::Relaxed);
    debug!("Capture loop stopping");

    // Release the device handle (exactly once), then any active recording.
    drop(source);
    if let Ok(mut slot) = shared.recorder_slot.lock() {
        if let Some(mut session) = slot.take() {
            session.close();
        }
    }

    shared
        .state
        .store(LoopState::Stopped as u8, Ordering::Relaxed);
    let _ = events.try_send(PanelEvent::Stopped);
    info!("Capture loop stopped");
}

#[allow(clippy::too_many_arguments)]
fn run_iterations<S, B>(
    mut source: S,
    backend: &mut B,
    settings: &SharedSettings,
    presenter: &mut Presenter,
    events: &EventSender,
    config: &CaptureLoopConfig,
    shared: &SharedParts,
    meter: &mut ThroughputMeter,
) -> S
where
    S: FrameSource,
    B: ControlBackend,
{
    let mut applied = AppliedSettings::default();

    while shared.running.load(Ordering::Relaxed) {
        let desired = settings.snapshot();
        if let Err(fatal) = reconcile(backend, &mut applied, &desired, events) {
            error!(error = %fatal, "Control utility unavailable, stopping capture");
            let _ = events.try_send(PanelEvent::Fatal {
                error: fatal.to_string(),
            });
            shared.running.store(false, Ordering::Relaxed);
            break;
        }

        let frame = match source.read_frame() {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                warn!(error = %e, "Frame read failed, retrying");
                let _ = events.try_send(PanelEvent::CaptureStalled {
                    error: e.to_string(),
                });
                thread::sleep(config.read_retry_delay);
                continue;
            }
        };

        // Latest-frame slot has overwrite semantics: consumers only ever
        // see the newest frame.
        if let Ok(mut latest) = shared.latest.lock() {
            *latest = Some(Arc::clone(&frame));
        }

        if let Ok(mut slot) = shared.recorder_slot.lock() {
            if let Some(session) = slot.as_mut() {
                if let Err(e) = session.write(&frame) {
                    warn!(error = %e, "Recording write failed, ending session");
                    if let Some(mut broken) = slot.take() {
                        broken.close();
                    }
                    let _ = events.try_send(PanelEvent::RecordingStopped {
                        reason: e.to_string(),
                    });
                }
            }
        }

        presenter.present(&frame);

        if let Some(fps) = meter.record_frame() {
            debug!(fps = %format_args!("{:.2}", fps), target = desired.frame_rate, "Capture rate");
            let _ = events.try_send(PanelEvent::Throughput {
                fps,
                target: desired.frame_rate,
            });
        }

        thread::sleep(config.idle_yield);
    }

    source
}

/// Converge applied settings toward desired via the control adapter
///
/// Only a fatal adapter error (missing utility) propagates; command
/// failures are reported and consumed.
fn reconcile<B: ControlBackend + ?Sized>(
    backend: &mut B,
    applied: &mut AppliedSettings,
    desired: &CameraSettings,
    events: &EventSender,
) -> Result<(), ControlError> {
    reconcile_one(
        backend,
        CameraControl::Exposure,
        desired.exposure_us,
        &mut applied.exposure_us,
        events,
    )?;
    reconcile_one(
        backend,
        CameraControl::FrameRate,
        desired.frame_rate,
        &mut applied.frame_rate,
        events,
    )
}

fn reconcile_one<B: ControlBackend + ?Sized>(
    backend: &mut B,
    control: CameraControl,
    desired: u32,
    applied: &mut Option<u32>,
    events: &EventSender,
) -> Result<(), ControlError> {
    if *applied == Some(desired) {
        return Ok(());
    }

    let result = backend.set_control(control, desired);
    // At-most-once-per-change: the attempt consumes the change whether or
    // not it succeeded, so a persistently failing control is not retried
    // every iteration.
    *applied = Some(desired);

    match result {
        Ok(()) => {
            info!(%control, value = desired, "Control applied");
            Ok(())
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            let _ = events.try_send(PanelEvent::ControlFailed {
                control,
                value: desired,
                error: e.to_string(),
            });
            Ok(())
        }
    }
}
