//! Preview Presenter
//!
//! Turns a raw captured frame into a bounded-size RGB preview image and
//! hands it to the UI event queue without ever blocking the capture loop.
//! Scaling is shrink-to-fit only: a frame smaller than the preview area is
//! passed through at native size, never upscaled.
//!
//! Only the capture thread calls [`Presenter::present`]; the actual redraw
//! happens on whatever thread drains the event queue.

use crate::event::{EventSender, PanelEvent, PreviewImage};
use crate::video::frame::{PixelFormat, VideoFrame};
use image::imageops::FilterType;
use image::RgbImage;
use tracing::{debug, warn};

/// Log one message per this many dropped preview events
const LOG_EVERY_N_DROPS: u64 = 30;

/// Fit a source size into a bounding box, preserving aspect ratio
///
/// Shrink-only: returns the source size unchanged when it already fits.
/// Dimensions never collapse below one pixel.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let aspect = width as f64 / height as f64;
    let (fit_w, fit_h) = if aspect > max_width as f64 / max_height as f64 {
        (max_width, (max_width as f64 / aspect) as u32)
    } else {
        ((max_height as f64 * aspect) as u32, max_height)
    };

    (fit_w.max(1), fit_h.max(1))
}

/// Converts frames for display and schedules redraws via the event queue
pub struct Presenter {
    max_width: u32,
    max_height: u32,
    events: EventSender,
    dropped: u64,
}

impl Presenter {
    /// Presenter bounded to the given preview area
    pub fn new(max_width: u32, max_height: u32, events: EventSender) -> Self {
        Self {
            max_width,
            max_height,
            events,
            dropped: 0,
        }
    }

    /// Convert, scale and dispatch one frame
    ///
    /// Non-blocking: a full event queue drops the preview (staleness is
    /// fine, the next frame replaces it anyway).
    pub fn present(&mut self, frame: &VideoFrame) {
        let Some(rgb) = frame.convert(PixelFormat::RGB24) else {
            warn!(format = %frame.format, "Cannot convert frame for display");
            return;
        };

        let Some(native) = RgbImage::from_raw(rgb.width, rgb.height, rgb.data) else {
            warn!(
                width = rgb.width,
                height = rgb.height,
                "Frame buffer does not match its dimensions"
            );
            return;
        };

        let (display_w, display_h) =
            fit_within(frame.width, frame.height, self.max_width, self.max_height);
        let scaled = if (display_w, display_h) == (frame.width, frame.height) {
            native
        } else {
            image::imageops::resize(&native, display_w, display_h, FilterType::Triangle)
        };

        let preview = PreviewImage {
            width: display_w,
            height: display_h,
            data: scaled.into_raw(),
        };

        if self.events.try_send(PanelEvent::Preview(preview)).is_err() {
            self.dropped += 1;
            if self.dropped % LOG_EVERY_N_DROPS == 0 {
                debug!(dropped = self.dropped, "Preview events dropped (queue full)");
            }
        }
    }

    /// Preview events dropped so far because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;

    #[test]
    fn test_fit_identity_when_already_fits() {
        assert_eq!(fit_within(320, 240, 640, 480), (320, 240));
        assert_eq!(fit_within(640, 480, 640, 480), (640, 480));
    }

    #[test]
    fn test_fit_never_upscales() {
        let (w, h) = fit_within(100, 100, 640, 480);
        assert!(w <= 100 && h <= 100);
    }

    #[test]
    fn test_fit_shrinks_wide_frames_by_width() {
        // 1280x720 into 640x480: width is the binding constraint.
        assert_eq!(fit_within(1280, 720, 640, 480), (640, 360));
    }

    #[test]
    fn test_fit_shrinks_tall_frames_by_height() {
        // 480x960 into 640x480: height is the binding constraint.
        assert_eq!(fit_within(480, 960, 640, 480), (240, 480));
    }

    #[test]
    fn test_fit_preserves_aspect_ratio() {
        let (w, h) = fit_within(1920, 1080, 640, 480);
        let src_aspect = 1920.0 / 1080.0;
        let dst_aspect = w as f64 / h as f64;
        assert!((src_aspect - dst_aspect).abs() < 0.02);
    }

    #[test]
    fn test_fit_never_collapses_to_zero() {
        let (w, h) = fit_within(10_000, 10, 100, 100);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn test_present_dispatches_scaled_preview() {
        let (tx, mut rx) = event::channel(4);
        let mut presenter = Presenter::new(4, 4, tx);

        let frame = VideoFrame::new(8, 8, PixelFormat::YUYV);
        presenter.present(&frame);

        match rx.try_recv().unwrap() {
            PanelEvent::Preview(img) => {
                assert_eq!((img.width, img.height), (4, 4));
                assert_eq!(img.data.len(), 4 * 4 * 3);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_present_passes_small_frames_through() {
        let (tx, mut rx) = event::channel(4);
        let mut presenter = Presenter::new(640, 480, tx);

        let frame = VideoFrame::new(8, 4, PixelFormat::YUYV);
        presenter.present(&frame);

        match rx.try_recv().unwrap() {
            PanelEvent::Preview(img) => assert_eq!((img.width, img.height), (8, 4)),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_present_counts_drops_on_full_queue() {
        let (tx, _rx) = event::channel(1);
        let mut presenter = Presenter::new(16, 16, tx);
        let frame = VideoFrame::new(8, 4, PixelFormat::YUYV);

        presenter.present(&frame);
        presenter.present(&frame);
        assert_eq!(presenter.dropped(), 1);
    }
}
