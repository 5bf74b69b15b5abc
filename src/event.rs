//! Panel Event Queue
//!
//! Cross-thread handoff from the capture loop to whatever drains events —
//! a GUI main loop, the headless binary, or a test. The capture side only
//! ever uses non-blocking `try_send`; when the queue is full the event is
//! dropped, never the loop's pace. Consumers drain at their own cadence
//! and only ever see the newest state, which is the behavior preview
//! rendering wants.

use crate::control::CameraControl;
use tokio::sync::mpsc;

/// Default capacity of the panel event queue
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Sender half of the panel event queue
pub type EventSender = mpsc::Sender<PanelEvent>;

/// Receiver half of the panel event queue
pub type EventReceiver = mpsc::Receiver<PanelEvent>;

/// Create a bounded panel event queue
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}

/// A preview image ready for display
///
/// RGB24, row-major, already scaled to fit the preview area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Packed RGB pixel data
    pub data: Vec<u8>,
}

/// Events posted by the capture side
#[derive(Debug)]
pub enum PanelEvent {
    /// A new preview image is ready; replaces whatever was shown before
    Preview(PreviewImage),

    /// Periodic measured capture rate
    Throughput {
        /// Measured frames per second over the last window
        fps: f64,
        /// Currently desired frame rate
        target: u32,
    },

    /// A control push was rejected by the utility (non-fatal)
    ControlFailed {
        /// Control that was being set
        control: CameraControl,
        /// Value that was being pushed
        value: u32,
        /// Failure description
        error: String,
    },

    /// A frame read failed; the loop waits and retries
    CaptureStalled {
        /// Failure description
        error: String,
    },

    /// The active recording session ended
    RecordingStopped {
        /// Why the session ended
        reason: String,
    },

    /// Capture cannot continue; the loop has shut itself down
    Fatal {
        /// Failure description
        error: String,
    },

    /// The capture loop has exited and released its resources
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_try_send_and_drain() {
        let (tx, mut rx) = channel(2);
        tx.try_send(PanelEvent::Stopped).unwrap();
        assert!(matches!(rx.try_recv(), Ok(PanelEvent::Stopped)));
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (tx, _rx) = channel(1);
        tx.try_send(PanelEvent::Stopped).unwrap();
        assert!(tx.try_send(PanelEvent::Stopped).is_err());
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let (tx, _rx) = channel(0);
        assert!(tx.try_send(PanelEvent::Stopped).is_ok());
    }
}
