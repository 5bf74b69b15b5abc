//! Headless camera-panel binary
//!
//! Exercises the panel core without a GUI: starts the capture loop against
//! the configured device, logs every event the UI would render, and shuts
//! down cleanly on Ctrl-C. Numeric flags are parsed leniently — an invalid
//! value logs a warning and falls back to its default, it never aborts
//! startup.

use camera_panel_core::settings::{CameraSettings, DEFAULT_EXPOSURE_US, DEFAULT_FRAME_RATE};
use camera_panel_core::{CameraPanel, PanelConfig, PanelEvent};
use clap::Parser;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Control panel for a V4L2 camera: preview, exposure/frame-rate, stills, recording"
)]
struct Args {
    /// V4L2 device index (/dev/video<N>)
    #[arg(short = 'v', long = "video-device", default_value = "0")]
    video_device: String,

    /// Initial exposure in microseconds
    #[arg(long, default_value = "800")]
    exposure: String,

    /// Initial frame rate in FPS
    #[arg(long, default_value = "60")]
    framerate: String,
}

/// Lenient numeric flag parsing: warn and fall back instead of aborting
fn parse_or_default(flag: &str, raw: &str, default: i64) -> i64 {
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(flag, raw, default, "Invalid value, using default");
            default
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let device_index = parse_or_default("-v", &args.video_device, 0).max(0) as usize;
    let initial = CameraSettings::clamped(
        parse_or_default("--exposure", &args.exposure, DEFAULT_EXPOSURE_US as i64),
        parse_or_default("--framerate", &args.framerate, DEFAULT_FRAME_RATE as i64),
    );

    info!(
        device_index,
        exposure_us = initial.exposure_us,
        frame_rate = initial.frame_rate,
        "Starting camera panel"
    );

    let config = PanelConfig {
        device_index,
        initial,
        ..Default::default()
    };
    let (panel, mut events) = CameraPanel::launch(config);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut fatal = false;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                None => break,
                Some(PanelEvent::Preview(image)) => {
                    debug!(width = image.width, height = image.height, "Preview frame ready");
                }
                Some(PanelEvent::Throughput { fps, target }) => {
                    info!(fps = %format_args!("{:.2}", fps), target, "Live stream rate");
                }
                Some(PanelEvent::ControlFailed { control, value, error }) => {
                    warn!(%control, value, %error, "Control not applied");
                }
                Some(PanelEvent::CaptureStalled { error }) => {
                    warn!(%error, "Capture stalled, retrying");
                }
                Some(PanelEvent::RecordingStopped { reason }) => {
                    warn!(%reason, "Recording ended");
                }
                Some(PanelEvent::Fatal { error }) => {
                    error!(%error, "Fatal capture error");
                    fatal = true;
                    break;
                }
                Some(PanelEvent::Stopped) => break,
            },
        }
    }

    if let Err(e) = panel.shutdown() {
        error!(error = %e, "Cleanup failed");
    }
    if fatal {
        std::process::exit(1);
    }
}
