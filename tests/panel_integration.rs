//! Panel Integration Tests
//!
//! Drives the full capture pipeline — loop thread, settings reconciliation,
//! recording slot, presenter, event queue — against scripted sources and
//! backends instead of camera hardware. Covers the externally observable
//! properties: clamping, at-most-once control pushes, transient-failure
//! tolerance, cooperative shutdown, and recording/snapshot lifecycles.


use panel_test_utils::*;

use camera_panel_core::control::CameraControl;
use camera_panel_core::error::PanelError;
use camera_panel_core::event::{EventReceiver, PanelEvent};
use camera_panel_core::panel::{CameraPanel, PanelConfig};
use camera_panel_core::video::capture::CaptureError;
use camera_panel_core::video::capture_loop::LoopState;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(80);

fn test_config(dir: &TempDir) -> PanelConfig {
    PanelConfig {
        snapshot_dir: dir.path().join("stills"),
        recording_dir: dir.path().join("videos"),
        // `true` exits immediately, so any recording write fails fast.
        encoder_program: "true".into(),
        ..Default::default()
    }
}

fn launch_panel(
    fail_first: usize,
) -> (CameraPanel, EventReceiver, SourceProbe, RecordingBackend, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let (source, probe) = ScriptedSource::new(fail_first);
    let (panel, events) = CameraPanel::launch_with(
        test_config(&dir),
        move || Ok::<_, CaptureError>(source),
        backend.clone(),
        fast_loop_config(),
    );
    (panel, events, probe, backend, dir)
}

#[test]
fn test_panel_runs_and_publishes_preview() {
    let (panel, mut events, _probe, _backend, _dir) = launch_panel(0);

    assert!(wait_until(WAIT, || panel.state() == LoopState::Running));

    let preview = wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::Preview(_)));
    match preview {
        Some(PanelEvent::Preview(image)) => {
            assert_eq!((image.width, image.height), (TEST_WIDTH, TEST_HEIGHT));
            assert_eq!(image.data.len(), (TEST_WIDTH * TEST_HEIGHT * 3) as usize);
        }
        other => panic!("expected preview event, got {:?}", other),
    }

    assert!(panel.latest_frame().is_some());
    panel.shutdown().unwrap();
}

#[test]
fn test_device_open_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let (panel, mut events) = CameraPanel::launch_with(
        test_config(&dir),
        || {
            Err::<ScriptedSource, _>(CaptureError::OpenFailed {
                index: 0,
                message: "no such device".into(),
            })
        },
        backend.clone(),
        fast_loop_config(),
    );

    let fatal = wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::Fatal { .. }));
    assert!(fatal.is_some(), "open failure must surface as Fatal");
    assert!(wait_until(WAIT, || panel.state() == LoopState::Stopped));
    assert!(!panel.is_running(), "run flag must be cleared on open failure");

    // No frames were ever produced and no controls were pushed.
    assert!(panel.latest_frame().is_none());
    assert_eq!(backend.call_count(), 0);
    assert!(matches!(
        panel.start_recording(None).unwrap_err(),
        PanelError::CaptureNotRunning
    ));

    panel.shutdown().unwrap();
}

#[test]
fn test_read_failure_does_not_stop_capture() {
    let (panel, mut events, probe, _backend, _dir) = launch_panel(3);

    let stalled =
        wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::CaptureStalled { .. }));
    assert!(stalled.is_some(), "read failures must be reported");

    // The loop keeps retrying and eventually delivers frames.
    let preview = wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::Preview(_)));
    assert!(preview.is_some(), "capture must recover after read failures");
    assert!(probe.reads() > 3);
    assert_eq!(panel.state(), LoopState::Running);

    panel.shutdown().unwrap();
}

#[test]
fn test_controls_pushed_at_most_once_per_change() {
    let (panel, _events, _probe, backend, _dir) = launch_panel(0);

    // Initial settings are pushed exactly once each on loop start.
    assert!(wait_until(WAIT, || backend.call_count() == 2));
    assert_eq!(
        backend.calls(),
        vec![
            (CameraControl::Exposure, 800),
            (CameraControl::FrameRate, 60)
        ]
    );
    std::thread::sleep(SETTLE);
    assert_eq!(backend.call_count(), 2, "stable settings must not be re-pushed");

    // Over-range apply is clamped and pushed once.
    let outcome = panel.apply_exposure(100_000);
    assert_eq!(outcome.value, 65523);
    assert!(outcome.adjusted);
    assert!(wait_until(WAIT, || backend
        .calls()
        .contains(&(CameraControl::Exposure, 65523))));
    std::thread::sleep(SETTLE);
    assert_eq!(backend.call_count(), 3);

    // Under-range frame rate likewise.
    let outcome = panel.apply_frame_rate(3);
    assert_eq!(outcome.value, 5);
    assert!(wait_until(WAIT, || backend
        .calls()
        .contains(&(CameraControl::FrameRate, 5))));
    std::thread::sleep(SETTLE);
    assert_eq!(backend.call_count(), 4);

    // Re-applying the same value is not a change.
    panel.apply_exposure(65523);
    std::thread::sleep(SETTLE);
    assert_eq!(backend.call_count(), 4);

    panel.shutdown().unwrap();
}

#[test]
fn test_missing_control_utility_stops_capture() {
    let dir = tempfile::tempdir().unwrap();
    let (source, probe) = ScriptedSource::new(0);
    let (panel, mut events) = CameraPanel::launch_with(
        test_config(&dir),
        move || Ok::<_, CaptureError>(source),
        RecordingBackend::always_fatal(),
        fast_loop_config(),
    );

    let fatal = wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::Fatal { .. }));
    assert!(fatal.is_some());
    assert!(wait_until(WAIT, || panel.state() == LoopState::Stopped));
    assert_eq!(probe.drops(), 1, "device must be released on fatal stop");

    panel.shutdown().unwrap();
}

#[test]
fn test_shutdown_releases_device_exactly_once() {
    let (panel, mut events, probe, _backend, _dir) = launch_panel(0);

    assert!(wait_until(WAIT, || panel.state() == LoopState::Running));
    panel.shutdown().unwrap();

    assert_eq!(probe.drops(), 1);
    let stopped = wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::Stopped));
    assert!(stopped.is_some(), "loop exit must be announced");
}

#[test]
fn test_recording_write_failure_reported_and_capture_continues() {
    let (panel, mut events, _probe, _backend, _dir) = launch_panel(0);

    assert!(wait_until(WAIT, || panel.state() == LoopState::Running));
    let path = panel.start_recording(None).unwrap();
    assert!(path.extension().is_some_and(|ext| ext == "avi"));

    // The dead encoder breaks the pipe; the session ends, capture does not.
    let stopped = wait_for_event(&mut events, WAIT, |e| {
        matches!(e, PanelEvent::RecordingStopped { .. })
    });
    assert!(stopped.is_some(), "write failure must be reported");
    assert!(wait_until(WAIT, || !panel.is_recording()));

    let preview = wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::Preview(_)));
    assert!(preview.is_some(), "capture must continue after a recording failure");
    assert_eq!(panel.state(), LoopState::Running);

    panel.shutdown().unwrap();
}

#[test]
fn test_recording_lifecycle_and_idempotent_stop() {
    // Reads always fail, so the loop never writes to the session and it
    // stays open for the whole test.
    let (panel, _events, _probe, _backend, dir) = launch_panel(1000);

    assert!(wait_until(WAIT, || panel.state() == LoopState::Running));
    assert!(!panel.stop_recording(), "stop while idle is a no-op");

    let path = dir.path().join("videos").join("clip.avi");
    panel.start_recording(Some(path.clone())).unwrap();
    assert!(panel.is_recording());

    assert!(matches!(
        panel.start_recording(Some(path)).unwrap_err(),
        PanelError::AlreadyRecording
    ));

    assert!(panel.stop_recording());
    assert!(!panel.is_recording());
    assert!(!panel.stop_recording(), "second stop is a no-op");

    panel.shutdown().unwrap();
}

#[test]
fn test_snapshot_roundtrip() {
    let (panel, mut events, _probe, _backend, dir) = launch_panel(0);

    let preview = wait_for_event(&mut events, WAIT, |e| matches!(e, PanelEvent::Preview(_)));
    assert!(preview.is_some());

    let path = panel.snapshot().unwrap();
    assert!(path.starts_with(dir.path().join("stills")));

    let decoded = image::open(&path).unwrap().into_rgb8();
    assert_eq!(decoded.dimensions(), (TEST_WIDTH, TEST_HEIGHT));

    panel.shutdown().unwrap();
}

#[test]
fn test_snapshot_without_frame_is_an_error() {
    // Reads always fail: no frame is ever published.
    let (panel, _events, _probe, _backend, _dir) = launch_panel(1000);

    assert!(wait_until(WAIT, || panel.state() == LoopState::Running));
    assert!(matches!(panel.snapshot().unwrap_err(), PanelError::NoFrame));

    panel.shutdown().unwrap();
}
