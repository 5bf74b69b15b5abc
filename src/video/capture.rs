//! V4L2 Capture Device
//!
//! Owns the camera handle and pulls raw frames from it. Devices are opened
//! by index (`/dev/video<N>`), the native resolution is queried after
//! opening, and the stream is negotiated to YUYV — the one wire format the
//! rest of the pipeline understands. Dropping the device releases the
//! handle.
//!
//! The [`FrameSource`] trait is the seam between the capture loop and the
//! hardware; tests drive the loop with scripted sources instead of a real
//! camera.

use crate::video::frame::{PixelFormat, Resolution, VideoFrame};
use std::fmt;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// Number of mmap buffers to queue on the capture stream
const BUFFER_COUNT: u32 = 4;

/// Error types for capture-device operations
#[derive(Debug)]
pub enum CaptureError {
    /// Failed to open the device node
    OpenFailed {
        /// Device index that was requested
        index: usize,
        /// Underlying error text
        message: String,
    },
    /// Querying or setting the stream format failed
    ConfigFailed(String),
    /// The device will not produce a format the pipeline understands
    UnsupportedFormat(String),
    /// Creating or starting the frame stream failed
    StreamFailed(String),
    /// A single frame read failed; transient, the loop retries
    ReadFailed(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::OpenFailed { index, message } => {
                write!(f, "Failed to open capture device {}: {}", index, message)
            }
            CaptureError::ConfigFailed(msg) => write!(f, "Capture configuration error: {}", msg),
            CaptureError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            CaptureError::StreamFailed(msg) => write!(f, "Capture stream error: {}", msg),
            CaptureError::ReadFailed(msg) => write!(f, "Frame read failed: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Something that yields frames when asked
///
/// Implemented by the real V4L2 device and by test doubles. The capture
/// loop constructs its source on its own thread, so implementations do
/// not need to be `Send`.
pub trait FrameSource {
    /// Native resolution of the source
    fn resolution(&self) -> Resolution;

    /// Read one frame. Blocking; a failure is transient from the loop's
    /// point of view.
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureError>;
}

/// A V4L2 capture device streaming YUYV frames
pub struct V4l2CaptureDevice {
    index: usize,
    // Held for the lifetime of the stream; the handle is released on drop.
    _device: Device,
    stream: MmapStream<'static>,
    resolution: Resolution,
}

impl V4l2CaptureDevice {
    /// Open the device at the given index and negotiate YUYV capture
    ///
    /// Queries the native resolution, requests YUYV at that size, and
    /// performs one warm-up read so the first loop iteration gets a real
    /// frame.
    pub fn open(index: usize) -> Result<Self, CaptureError> {
        info!(index, "Opening V4L2 capture device");

        let device = Device::new(index).map_err(|e| CaptureError::OpenFailed {
            index,
            message: e.to_string(),
        })?;

        let native = device
            .format()
            .map_err(|e| CaptureError::ConfigFailed(format!("query format: {}", e)))?;
        debug!(
            width = native.width,
            height = native.height,
            fourcc = %native.fourcc,
            "Native device format"
        );

        let requested = Format::new(
            native.width,
            native.height,
            FourCC::new(&PixelFormat::YUYV.fourcc()),
        );
        let actual = device
            .set_format(&requested)
            .map_err(|e| CaptureError::ConfigFailed(format!("set format: {}", e)))?;

        if actual.fourcc != FourCC::new(&PixelFormat::YUYV.fourcc()) {
            return Err(CaptureError::UnsupportedFormat(format!(
                "device {} produces {} instead of YUYV",
                index, actual.fourcc
            )));
        }

        let resolution = Resolution::new(actual.width, actual.height);
        info!(%resolution, "Capture format negotiated");

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;

        // Warm-up read; some UVC cameras deliver an empty first buffer.
        stream
            .next()
            .map_err(|e| CaptureError::StreamFailed(format!("warm-up read: {}", e)))?;

        Ok(Self {
            index,
            _device: device,
            stream,
            resolution,
        })
    }

    /// Device index this capture is bound to
    pub fn index(&self) -> usize {
        self.index
    }
}

impl FrameSource for V4l2CaptureDevice {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn read_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;

        let expected =
            PixelFormat::YUYV.buffer_size(self.resolution.width, self.resolution.height);
        let used = if meta.bytesused > 0 {
            meta.bytesused as usize
        } else {
            buf.len()
        };

        if used < expected {
            warn!(used, expected, "Short frame from device");
            return Err(CaptureError::ReadFailed(format!(
                "short frame: {} of {} bytes",
                used, expected
            )));
        }

        Ok(VideoFrame::from_data(
            self.resolution.width,
            self.resolution.height,
            PixelFormat::YUYV,
            buf[..expected].to_vec(),
        ))
    }
}

impl Drop for V4l2CaptureDevice {
    fn drop(&mut self) {
        info!(index = self.index, "Releasing capture device");
    }
}
