//! Video Recorder
//!
//! Scoped-lifetime video-file writer. A [`RecordingSession`] owns an
//! `ffmpeg` child process and pipes raw YUYV frames to its stdin; ffmpeg
//! encodes MJPG into an AVI container at the path chosen when the session
//! was opened. Codec and container are opaque configuration here — the
//! panel never parses what it writes.
//!
//! Sessions are created on "start recording" and closed on "stop
//! recording" or panel shutdown, whichever comes first. `close` is
//! idempotent and also runs on drop.

use crate::video::frame::{Resolution, VideoFrame};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long to wait for the encoder to exit after stdin EOF before killing it
const CLOSE_WAIT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for encoder exit
const CLOSE_POLL: Duration = Duration::from_millis(100);

/// MJPEG quality scale passed to the encoder (2-31, lower is better)
const MJPEG_QUALITY: &str = "3";

/// Error types for recording operations
#[derive(Debug)]
pub enum RecorderError {
    /// Frame rate of zero rejected at open time
    InvalidFrameRate(u32),
    /// The encoder binary could not be found
    EncoderMissing(PathBuf),
    /// Spawning the encoder failed
    SpawnFailed(String),
    /// Writing a frame to the encoder failed
    WriteFailed(String),
    /// The session has already been closed
    Closed,
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderError::InvalidFrameRate(fps) => {
                write!(f, "Invalid recording frame rate: {}", fps)
            }
            RecorderError::EncoderMissing(path) => {
                write!(f, "Encoder '{}' not found; install ffmpeg", path.display())
            }
            RecorderError::SpawnFailed(msg) => write!(f, "Failed to start encoder: {}", msg),
            RecorderError::WriteFailed(msg) => write!(f, "Failed to write frame: {}", msg),
            RecorderError::Closed => write!(f, "Recording session is closed"),
        }
    }
}

impl std::error::Error for RecorderError {}

/// Factory for recording sessions
#[derive(Debug, Clone)]
pub struct VideoRecorder {
    program: PathBuf,
}

impl VideoRecorder {
    /// Recorder using `ffmpeg` from PATH
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Recorder using an explicit encoder path (used by tests)
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Open a recording session
    ///
    /// Rejects `fps == 0`; the 30 FPS fallback for an unset rate is the
    /// caller's policy, not the recorder's. Resolution is fixed for the
    /// lifetime of the session.
    pub fn open(
        &self,
        path: impl AsRef<Path>,
        fps: u32,
        resolution: Resolution,
    ) -> Result<RecordingSession, RecorderError> {
        if fps == 0 {
            return Err(RecorderError::InvalidFrameRate(fps));
        }

        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), fps, %resolution, "Starting recording session");

        let mut child = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pixel_format", "yuyv422"])
            .args(["-video_size", &resolution.to_string()])
            .args(["-framerate", &fps.to_string()])
            .args(["-i", "-"])
            .args(["-vcodec", "mjpeg", "-q:v", MJPEG_QUALITY])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    RecorderError::EncoderMissing(self.program.clone())
                } else {
                    RecorderError::SpawnFailed(e.to_string())
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecorderError::SpawnFailed("encoder stdin unavailable".into()))?;

        Ok(RecordingSession {
            path,
            fps,
            resolution,
            child: Some(child),
            stdin: Some(stdin),
            frames_written: 0,
        })
    }
}

impl Default for VideoRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// An active recording
///
/// Frames must match the resolution and pixel format fixed at open time;
/// the session pipes them through without inspecting them.
pub struct RecordingSession {
    path: PathBuf,
    fps: u32,
    resolution: Resolution,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl RecordingSession {
    /// Append one frame to the recording
    pub fn write(&mut self, frame: &VideoFrame) -> Result<(), RecorderError> {
        let stdin = self.stdin.as_mut().ok_or(RecorderError::Closed)?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| RecorderError::WriteFailed(e.to_string()))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the session, flushing and finalizing the file
    ///
    /// Idempotent: calling it on an already-closed session is a no-op.
    /// Sends EOF, waits a bounded time for the encoder to exit, then
    /// kills it if it will not.
    pub fn close(&mut self) {
        // Dropping stdin sends EOF; ffmpeg finalizes the container.
        if let Some(stdin) = self.stdin.take() {
            drop(stdin);
        }

        let Some(mut child) = self.child.take() else {
            return;
        };

        let deadline = Instant::now() + CLOSE_WAIT;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(
                        path = %self.path.display(),
                        frames = self.frames_written,
                        %status,
                        "Recording session closed"
                    );
                    return;
                }
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(CLOSE_POLL);
                }
                Ok(None) => {
                    warn!(path = %self.path.display(), "Encoder did not exit, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to reap encoder");
                    return;
                }
            }
        }
    }

    /// Whether the session can still accept frames
    pub fn is_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Target frame rate fixed at open time
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Resolution fixed at open time
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Frames successfully handed to the encoder
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!(path = %self.path.display(), "Closing recording session on drop");
        }
        self.close();
    }
}
