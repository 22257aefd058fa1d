//! Integration tests for the playback controller
//!
//! Covers the load sequence, bounded retry, readiness watchdog, live source
//! handling, gain staging and looping, on virtual time.

mod helpers;

use breathe_common::config::PlaybackSettings;
use breathe_common::events::{BreatheEvent, EventBus, NotificationLevel, PlaybackStatus, TrackKind};
use breathe_core::audio::{
    MediaBackend, MediaElement, MediaSignal, PlaybackController, SourceClassifier,
};
use helpers::{drain, settle, FakeBackend, LoadOutcome};
use std::sync::Arc;
use std::time::Duration;

const CLIP: &str = "https://cdn.example.com/ambient/rain.mp3";
const RADIO: &str = "https://radio.example.com/live";

fn controller(backend: &FakeBackend, events: &EventBus) -> PlaybackController {
    PlaybackController::new(
        TrackKind::Ambient,
        backend.create_element(),
        Arc::new(SourceClassifier::default()),
        PlaybackSettings::default(),
        0.8,
        events.clone(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_load_plays_when_ready() {
    let backend = FakeBackend::new();
    let events = EventBus::new(256);
    let mut rx = events.subscribe();
    let player = controller(&backend, &events);

    player.load(CLIP);
    assert_eq!(player.status(), PlaybackStatus::Loading);

    settle(Duration::from_millis(200)).await;

    let snapshot = player.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Playing);
    assert!(snapshot.is_playing);
    assert!(snapshot.is_loaded);
    assert!(!snapshot.is_live_source);
    assert_eq!(snapshot.duration, Some(60.0));
    assert!(backend.element(0).is_playing());

    let loaded = drain(&mut rx)
        .into_iter()
        .filter(|event| match event {
            BreatheEvent::Notification {
                level: NotificationLevel::Info,
                message,
                ..
            } => message.contains("loaded"),
            _ => false,
        })
        .count();
    assert_eq!(loaded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded_and_manual_retry_resets() {
    let backend = FakeBackend::new();
    backend
        .script
        .set_outcome(CLIP, LoadOutcome::Fail("network unreachable".to_string()));
    let events = EventBus::new(256);
    let mut rx = events.subscribe();
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_secs(10)).await;

    // One initial attempt plus three retries
    assert_eq!(backend.script.load_count(CLIP), 4);
    let snapshot = player.snapshot();
    assert_eq!(snapshot.retry_count, 3);
    assert!(snapshot.load_error);
    assert_eq!(snapshot.status, PlaybackStatus::Error);
    assert_eq!(snapshot.last_error.as_deref(), Some("network unreachable"));

    let events = drain(&mut rx);
    let errors: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            BreatheEvent::PlaybackError {
                retry_count,
                terminal,
                ..
            } => Some((*retry_count, *terminal)),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![(1, false), (2, false), (3, false), (3, true)]);
    assert!(events.iter().any(|event| matches!(
        event,
        BreatheEvent::Notification { level: NotificationLevel::Error, .. }
    )));

    // No further automatic attempts
    settle(Duration::from_secs(10)).await;
    assert_eq!(backend.script.load_count(CLIP), 4);

    backend
        .script
        .set_outcome(CLIP, LoadOutcome::Ready(Some(60.0)));
    player.retry();
    assert_eq!(player.snapshot().retry_count, 0);
    assert!(!player.snapshot().load_error);

    settle(Duration::from_millis(200)).await;
    let snapshot = player.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Playing);
    assert_eq!(snapshot.retry_count, 0);
    assert_eq!(backend.script.load_count(CLIP), 5);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_play_goes_through_retry() {
    let backend = FakeBackend::new();
    backend.script.reject_plays(CLIP, 1);
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_millis(200)).await;
    let snapshot = player.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Error);
    assert_eq!(snapshot.retry_count, 1);

    settle(Duration::from_secs(2)).await;
    let snapshot = player.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Playing);
    assert!(!snapshot.load_error);
    assert_eq!(backend.script.load_count(CLIP), 2);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_watchdog_attempts_playback() {
    let backend = FakeBackend::new();
    backend.script.set_outcome(CLIP, LoadOutcome::Silent);
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_secs(4)).await;
    assert_eq!(player.status(), PlaybackStatus::Loading);

    settle(Duration::from_secs(2)).await;
    assert_eq!(player.status(), PlaybackStatus::Playing);
    assert!(backend.element(0).is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_live_source_rejects_seek_and_loop() {
    let backend = FakeBackend::new();
    backend
        .script
        .set_outcome(RADIO, LoadOutcome::Ready(Some(f64::INFINITY)));
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(RADIO);
    // URL markers classify before anything loads
    assert!(player.is_live());

    settle(Duration::from_millis(200)).await;
    let snapshot = player.snapshot();
    assert!(snapshot.is_live_source);
    assert_eq!(snapshot.duration, None);
    assert_eq!(snapshot.status, PlaybackStatus::Playing);

    let before = player.position();
    assert!(!player.seek(30.0));
    assert!((player.position() - before).abs() < 1e-6);
    assert!(!player.set_loop(true));
    assert!(!player.snapshot().is_looping);

    // A later finite report does not undo an observed live source
    backend.element(0).emit(MediaSignal::DurationChanged(120.0));
    settle(Duration::from_millis(50)).await;
    assert!(player.is_live());
}

#[tokio::test(start_paused = true)]
async fn test_reported_duration_overrides_url_guess() {
    let url = "https://cdn.example.com/stream/track-01.mp3";
    let backend = FakeBackend::new();
    backend.script.set_outcome(url, LoadOutcome::Ready(Some(120.0)));
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(url);
    assert!(player.is_live());

    settle(Duration::from_millis(200)).await;
    assert!(!player.is_live());
    assert_eq!(player.duration(), Some(120.0));
    assert!(player.seek(30.0));
    assert!((player.position() - 30.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_retry() {
    let backend = FakeBackend::new();
    backend
        .script
        .set_outcome(CLIP, LoadOutcome::Fail("timeout".to_string()));
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_millis(200)).await;
    assert_eq!(player.snapshot().retry_count, 1);

    player.stop();
    settle(Duration::from_secs(5)).await;
    assert_eq!(backend.script.load_count(CLIP), 1);

    // Stop keeps the error; reset clears it
    let snapshot = player.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Error);
    assert!(snapshot.load_error);

    player.reset();
    let snapshot = player.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Idle);
    assert_eq!(snapshot.retry_count, 0);
    assert!(!snapshot.load_error);
    assert_eq!(snapshot.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_new_source_starts_clean() {
    let other = "https://cdn.example.com/ambient/ocean.mp3";
    let backend = FakeBackend::new();
    backend
        .script
        .set_outcome(CLIP, LoadOutcome::Fail("gone".to_string()));
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_secs(10)).await;
    assert_eq!(player.snapshot().retry_count, 3);

    player.load(other);
    let snapshot = player.snapshot();
    assert_eq!(snapshot.retry_count, 0);
    assert!(!snapshot.load_error);
    assert_eq!(snapshot.source_url.as_deref(), Some(other));

    settle(Duration::from_millis(200)).await;
    assert_eq!(player.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_pause_during_load_disarms_autoplay() {
    let backend = FakeBackend::new();
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(CLIP);
    player.pause();
    settle(Duration::from_millis(200)).await;

    assert_eq!(player.status(), PlaybackStatus::Ready);
    assert!(!backend.element(0).is_playing());

    player.play().await.unwrap();
    assert_eq!(player.status(), PlaybackStatus::Playing);
    assert!(backend.element(0).is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_effective_gain_is_user_volume_times_attenuation() {
    let backend = FakeBackend::new();
    let events = EventBus::new(256);
    let mut rx = events.subscribe();
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_millis(200)).await;
    assert!((backend.element(0).volume() - 0.56).abs() < 1e-6);

    player.set_volume(0.5);
    assert!((backend.element(0).volume() - 0.35).abs() < 1e-6);
    assert!((player.volume() - 0.5).abs() < 1e-6);

    player.set_volume(3.0);
    assert!((player.volume() - 1.0).abs() < 1e-6);
    assert!((backend.element(0).volume() - 0.7).abs() < 1e-6);

    let volumes: Vec<f32> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            BreatheEvent::VolumeChanged { volume, .. } => Some(volume),
            _ => None,
        })
        .collect();
    assert_eq!(volumes, vec![0.5, 1.0]);
}

#[tokio::test(start_paused = true)]
async fn test_loop_monitor_rewinds_near_end() {
    let backend = FakeBackend::new();
    backend.script.set_outcome(CLIP, LoadOutcome::Ready(Some(10.0)));
    let events = EventBus::new(1024);
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_millis(100)).await;
    assert!(player.set_loop(true));

    settle(Duration::from_millis(9_900)).await;
    let position = player.position();
    assert!(position < 1.0, "expected rewind, position {}", position);
    assert!(backend.element(0).is_playing());
    assert!(player.snapshot().is_looping);
    assert!((backend.element(0).volume() - 0.56).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn test_failure_after_working_retries_known_good_url() {
    let resolved = "https://edge-2.cdn.example.com/ambient/rain.mp3";
    let backend = FakeBackend::new();
    backend.script.redirect(CLIP, resolved);
    let events = EventBus::new(256);
    let player = controller(&backend, &events);

    player.load(CLIP);
    settle(Duration::from_millis(200)).await;
    assert_eq!(player.status(), PlaybackStatus::Playing);

    backend
        .element(0)
        .emit(MediaSignal::Error("decode error".to_string()));
    settle(Duration::from_millis(50)).await;
    assert_eq!(player.status(), PlaybackStatus::Error);

    settle(Duration::from_secs(2)).await;
    assert_eq!(backend.script.load_count(resolved), 1);
    assert_eq!(player.status(), PlaybackStatus::Playing);
    assert_eq!(player.source_url().as_deref(), Some(CLIP));
}
