//! Capture Throughput Meter
//!
//! Rolling frames-per-second measurement for the capture loop. Purely
//! observational: the loop's pacing comes from the device and the
//! cooperative sleep, this just reports what actually arrived.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Measurement window for the rate calculation
pub const MEASURE_WINDOW: Duration = Duration::from_secs(1);

/// Read-side handle to the most recent rate sample
///
/// Cheap to clone; the value is stored as `f64` bits in an atomic so the
/// UI side can poll it without locking.
#[derive(Debug, Clone, Default)]
pub struct ThroughputReading {
    fps_bits: Arc<AtomicU64>,
}

impl ThroughputReading {
    /// Most recent frames-per-second sample (0.0 before the first window)
    pub fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }
}

/// Frame-rate meter owned by the capture loop
#[derive(Debug)]
pub struct ThroughputMeter {
    window: Duration,
    frames: u64,
    window_start: Instant,
    reading: ThroughputReading,
}

impl ThroughputMeter {
    /// Create a meter with the default one-second window
    pub fn new() -> Self {
        Self::with_window(MEASURE_WINDOW)
    }

    /// Create a meter with a custom window
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            frames: 0,
            window_start: Instant::now(),
            reading: ThroughputReading::default(),
        }
    }

    /// Handle for reading the rate from another thread
    pub fn reading(&self) -> ThroughputReading {
        self.reading.clone()
    }

    /// Count one captured frame
    ///
    /// Returns `Some(fps)` when a measurement window just completed.
    pub fn record_frame(&mut self) -> Option<f64> {
        self.record_at(Instant::now())
    }

    fn record_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;

        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.reading.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sample_before_window_completes() {
        let mut meter = ThroughputMeter::with_window(Duration::from_secs(60));
        assert_eq!(meter.record_frame(), None);
        assert_eq!(meter.reading().fps(), 0.0);
    }

    #[test]
    fn test_rate_over_forced_window() {
        let mut meter = ThroughputMeter::with_window(Duration::from_secs(1));
        let start = meter.window_start;

        // 29 frames inside the window, the 30th lands exactly at the edge.
        for i in 1..30 {
            let now = start + Duration::from_millis(i * 33);
            assert_eq!(meter.record_at(now), None);
        }
        let fps = meter.record_at(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 30.0).abs() < 0.5, "fps was {}", fps);
        assert!((meter.reading().fps() - fps).abs() < f64::EPSILON);
    }

    #[test]
    fn test_window_resets_after_sample() {
        let mut meter = ThroughputMeter::with_window(Duration::from_secs(1));
        let start = meter.window_start;

        meter.record_at(start + Duration::from_secs(1)).unwrap();
        // Next frame starts a fresh window.
        assert_eq!(
            meter.record_at(start + Duration::from_millis(1100)),
            None
        );
    }

    #[test]
    fn test_reading_is_shared() {
        let mut meter = ThroughputMeter::with_window(Duration::from_secs(1));
        let reading = meter.reading();
        let start = meter.window_start;

        for i in 1..=10 {
            meter.record_at(start + Duration::from_millis(i * 100));
        }
        assert!(reading.fps() > 0.0);
    }
}
