mod common;

use common::{found, FakeProvider, ScriptedSource};
use ring_tryon::detection::DetectionState;
use ring_tryon::session::TryOnSession;
use ring_tryon::tracking::{TickOutcome, TrackingConfig};
use ring_tryon::video::{FacingMode, VideoFeed};

#[test]
fn camera_switch_returns_to_scanning_before_first_frame() {
    let provider = FakeProvider::default();
    let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());
    let (source, log) = ScriptedSource::new(found(4));
    session.attach_source(Box::new(source));

    assert_eq!(session.pump(0.0), TickOutcome::Idle, "front camera has no frame yet");
    provider.latest().advance();
    session.pump(16.0);
    assert!(matches!(session.pump(33.0), TickOutcome::Skipped));
    assert_eq!(session.snapshot().state, DetectionState::Detected);

    session.switch_camera().unwrap();
    assert_eq!(session.facing(), FacingMode::Environment);
    assert_eq!(session.feed().map(|f| f.facing()), Some(FacingMode::Environment));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, DetectionState::Scanning);
    assert!(snapshot.transform.is_none());

    // Rear camera not decoding yet: still scanning, detector untouched
    for i in 0..5 {
        assert_eq!(session.pump(50.0 + i as f64 * 16.0), TickOutcome::Idle);
        assert_eq!(session.snapshot().state, DetectionState::Scanning);
    }
    assert_eq!(log.calls.get(), 1);

    provider.latest().advance();
    assert!(matches!(session.pump(200.0), TickOutcome::Detected(_)));
    assert_eq!(log.calls.get(), 2);
    assert_eq!(provider.opened.borrow().len(), 2);
}

#[test]
fn camera_error_keeps_loop_idle() {
    let provider = FakeProvider::default();
    provider.fail.set(true);
    let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());
    let (source, log) = ScriptedSource::new(found(2));
    session.attach_source(Box::new(source));

    assert!(session.camera_error().is_some());
    assert!(session.feed().is_none());
    for i in 0..10 {
        assert_eq!(session.pump(i as f64 * 16.0), TickOutcome::Idle);
    }
    assert_eq!(log.calls.get(), 0);
    assert!(!session.tracking().is_running());

    provider.fail.set(false);
    session.reopen_camera();
    assert!(session.camera_error().is_none());
    provider.latest().advance();
    assert!(matches!(session.pump(500.0), TickOutcome::Detected(_)));
}

#[test]
fn failed_switch_reports_error() {
    let provider = FakeProvider::default();
    let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());

    provider.fail.set(true);
    assert!(session.switch_camera().is_err());
    assert!(session.camera_error().is_some());
    assert_eq!(session.facing(), FacingMode::Environment);
    assert_eq!(session.pump(0.0), TickOutcome::Idle);
}

#[test]
fn teardown_cancels_and_closes_detector() {
    let provider = FakeProvider::default();
    let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());
    let (source, log) = ScriptedSource::new(found(3));
    session.attach_source(Box::new(source));

    let feed = provider.latest();
    feed.advance();
    session.pump(0.0);
    assert_eq!(log.calls.get(), 1);

    session.teardown();
    assert!(log.closed.get());
    assert!(session.feed().is_none());

    for i in 0..10 {
        feed.advance();
        assert_eq!(session.pump(16.0 + i as f64 * 16.0), TickOutcome::Idle);
    }
    assert_eq!(log.calls.get(), 1);
}

#[test]
fn dropping_session_closes_detector() {
    let provider = FakeProvider::default();
    let (source, log) = ScriptedSource::new(found(1));
    {
        let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());
        session.attach_source(Box::new(source));
    }
    assert!(log.closed.get());
}

#[test]
fn dead_stream_reports_error_and_clears_ring() {
    let provider = FakeProvider::default();
    let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());
    let (source, log) = ScriptedSource::new(found(4));
    session.attach_source(Box::new(source));

    let feed = provider.latest();
    feed.advance();
    assert!(matches!(session.pump(0.0), TickOutcome::Detected(_)));

    feed.fail_stream("device unplugged");
    assert_eq!(session.pump(16.0), TickOutcome::Idle);
    assert!(session.camera_error().is_some_and(|e| e.contains("device unplugged")));
    assert!(session.feed().is_none());
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, DetectionState::Scanning);
    assert!(snapshot.transform.is_none());
    assert!(session.display_frame().is_none());

    session.reopen_camera();
    assert!(session.camera_error().is_none());
    provider.latest().advance();
    assert!(matches!(session.pump(500.0), TickOutcome::Detected(_)));
    assert_eq!(log.calls.get(), 2);
}

#[test]
fn displayed_frame_is_the_tracked_frame() {
    let provider = FakeProvider::default();
    let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());
    let (source, _log) = ScriptedSource::new(found(2));
    session.attach_source(Box::new(source));

    // Before tracking runs the preview shows the latest frame
    let feed = provider.latest();
    feed.advance();
    assert_eq!(session.display_frame().map(|f| f.sequence), Some(1));

    assert!(matches!(session.pump(0.0), TickOutcome::Detected(_)));
    let tracked = session.snapshot().frame_sequence;
    assert_eq!(tracked, Some(1));

    // The camera moves on before the next tick
    feed.advance();
    assert_eq!(feed.current_frame().map(|f| f.sequence), Some(2));
    assert_eq!(session.display_frame().map(|f| f.sequence), tracked);

    assert!(matches!(session.pump(16.0), TickOutcome::Detected(_)));
    assert_eq!(session.snapshot().frame_sequence, Some(2));
    assert_eq!(session.display_frame().map(|f| f.sequence), Some(2));
}

#[test]
fn dropping_session_after_camera_failure_closes_detector() {
    let provider = FakeProvider::default();
    provider.fail.set(true);
    let (source, log) = ScriptedSource::new(found(1));
    {
        let mut session = TryOnSession::new(provider.clone(), FacingMode::User, TrackingConfig::default());
        session.attach_source(Box::new(source));
        assert!(session.feed().is_none());
    }
    assert!(log.closed.get());
}
