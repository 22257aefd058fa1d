//! Breathing session tests on virtual time

mod helpers;

use breathe_common::config::TimerSettings;
use breathe_common::events::{BreatheEvent, EventBus};
use breathe_common::{BreathPhase, BreathingPattern};
use breathe_core::timer::{BreathingSession, SessionAudio};
use breathe_core::Error;
use helpers::{drain, settle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum AudioCall {
    Phase(String, BreathPhase),
    Completed(String),
    StopAll,
    ResetAll,
}

#[derive(Default)]
struct RecordingAudio {
    calls: Mutex<Vec<AudioCall>>,
}

impl RecordingAudio {
    fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().clone()
    }

    fn phases(&self) -> Vec<BreathPhase> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                AudioCall::Phase(_, phase) => Some(phase),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: &AudioCall) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }
}

impl SessionAudio for RecordingAudio {
    fn phase_changed(&self, pattern: &BreathingPattern, phase: BreathPhase) {
        self.calls
            .lock()
            .push(AudioCall::Phase(pattern.id.clone(), phase));
    }

    fn exercise_completed(&self, pattern: &BreathingPattern) {
        self.calls
            .lock()
            .push(AudioCall::Completed(pattern.id.clone()));
    }

    fn stop_all(&self) {
        self.calls.lock().push(AudioCall::StopAll);
    }

    fn reset_all(&self) {
        self.calls.lock().push(AudioCall::ResetAll);
    }
}

fn relaxing() -> BreathingPattern {
    BreathingPattern::new("4-7-8", "Relaxing Breath", [4, 7, 8, 0], 1)
}

fn box_breathing() -> BreathingPattern {
    BreathingPattern::new("box", "Box Breathing", [4, 4, 4, 4], 2)
}

fn session() -> (BreathingSession, Arc<RecordingAudio>, EventBus) {
    let events = EventBus::new(4096);
    let audio = Arc::new(RecordingAudio::default());
    let session = BreathingSession::new(&TimerSettings::default(), events.clone(), audio.clone());
    (session, audio, events)
}

#[tokio::test(start_paused = true)]
async fn test_relaxing_breath_runs_one_cycle() {
    let (session, audio, events) = session();
    let mut rx = events.subscribe();

    let snapshot = session.start(relaxing()).unwrap();
    assert!(snapshot.active);
    assert!(snapshot.session_id.is_some());
    assert_eq!(snapshot.phase, BreathPhase::Inhale);
    assert_eq!(snapshot.seconds_left, 4);

    settle(Duration::from_millis(3_900)).await;
    assert_eq!(session.snapshot().phase, BreathPhase::Inhale);

    settle(Duration::from_millis(200)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, BreathPhase::Hold1);
    assert_eq!(snapshot.seconds_left, 7);

    settle(Duration::from_secs(7)).await;
    assert_eq!(session.snapshot().phase, BreathPhase::Exhale);
    assert_eq!(session.snapshot().cycle, 1);

    settle(Duration::from_secs(8)).await;
    let snapshot = session.snapshot();
    assert!(snapshot.completed);
    assert!(!snapshot.active);
    assert_eq!(snapshot.cycle, 1);

    assert_eq!(
        audio.phases(),
        vec![BreathPhase::Inhale, BreathPhase::Hold1, BreathPhase::Exhale]
    );
    assert_eq!(audio.count(&AudioCall::Completed("4-7-8".to_string())), 1);

    let events = drain(&mut rx);
    let cycles: Vec<u32> = events
        .iter()
        .filter_map(|event| match event {
            BreatheEvent::PhaseChanged { cycle, .. } => Some(*cycle),
            _ => None,
        })
        .collect();
    assert_eq!(cycles, vec![1, 1, 1]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, BreatheEvent::ExerciseCompleted { cycles: 1, .. }))
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_box_breathing_counts_cycles() {
    let (session, audio, events) = session();
    let mut rx = events.subscribe();

    session.start(box_breathing()).unwrap();

    settle(Duration::from_millis(15_900)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, BreathPhase::Hold2);
    assert_eq!(snapshot.cycle, 1);

    settle(Duration::from_millis(200)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, BreathPhase::Inhale);
    assert_eq!(snapshot.cycle, 2);

    settle(Duration::from_secs(16)).await;
    let snapshot = session.snapshot();
    assert!(snapshot.completed);
    assert!(!snapshot.active);

    assert_eq!(audio.phases().len(), 8);
    let events = drain(&mut rx);
    let completed_cycles: Vec<u32> = events
        .iter()
        .filter_map(|event| match event {
            BreatheEvent::CycleCompleted { cycle, .. } => Some(*cycle),
            _ => None,
        })
        .collect();
    assert_eq!(completed_cycles, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_stop_after_completion() {
    let (session, audio, events) = session();
    session.start(relaxing()).unwrap();
    settle(Duration::from_secs(20)).await;
    assert!(session.snapshot().completed);

    // Terminal clip is the last thing the audio side hears
    assert_eq!(
        audio.calls().last(),
        Some(&AudioCall::Completed("4-7-8".to_string()))
    );

    let mut rx = events.subscribe();
    settle(Duration::from_secs(10)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(audio.phases().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pause_preserves_position_and_resume_continues() {
    let (session, audio, _events) = session();
    session.start(box_breathing()).unwrap();

    settle(Duration::from_millis(2_500)).await;
    let paused = session.pause();
    assert!(!paused.active);
    assert_eq!(paused.phase, BreathPhase::Inhale);
    assert_eq!(paused.seconds_left, 2);
    assert_eq!(audio.count(&AudioCall::StopAll), 1);

    settle(Duration::from_secs(30)).await;
    assert_eq!(session.snapshot(), paused);

    let resumed = session.start(box_breathing()).unwrap();
    assert!(resumed.active);
    assert_eq!(resumed.session_id, paused.session_id);
    // Resuming does not announce the phase again
    assert_eq!(audio.phases(), vec![BreathPhase::Inhale]);

    settle(Duration::from_millis(1_600)).await;
    assert_eq!(session.snapshot().phase, BreathPhase::Hold1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_pattern_keeps_running_session() {
    let (session, audio, _events) = session();
    session.start(box_breathing()).unwrap();
    settle(Duration::from_millis(500)).await;

    let invalid = BreathingPattern::new("bad", "Bad", [0, 1, 1, 0], 1);
    let result = session.start(invalid);
    assert!(matches!(result, Err(Error::InvalidPattern(_))));

    let snapshot = session.snapshot();
    assert!(snapshot.active);
    assert_eq!(snapshot.pattern_id.as_deref(), Some("box"));
    assert_eq!(audio.count(&AudioCall::ResetAll), 0);

    let result = session.reset(Some(BreathingPattern::new("none", "None", [4, 0, 4, 0], 0)));
    assert!(matches!(result, Err(Error::InvalidPattern(_))));
    assert!(session.snapshot().active);
}

#[tokio::test(start_paused = true)]
async fn test_switching_pattern_resets_first() {
    let (session, audio, _events) = session();
    let first = session.start(box_breathing()).unwrap();
    settle(Duration::from_secs(5)).await;

    let second = session.start(relaxing()).unwrap();
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(second.pattern_id.as_deref(), Some("4-7-8"));
    assert_eq!(second.phase, BreathPhase::Inhale);
    assert_eq!(second.cycle, 1);
    assert_eq!(audio.count(&AudioCall::ResetAll), 1);
    assert_eq!(
        audio.calls().last(),
        Some(&AudioCall::Phase("4-7-8".to_string(), BreathPhase::Inhale))
    );

    // Old ticks are gone: the new pattern follows its own durations
    settle(Duration::from_millis(4_100)).await;
    assert_eq!(session.snapshot().phase, BreathPhase::Hold1);
    assert_eq!(session.snapshot().seconds_left, 7);
}

#[tokio::test(start_paused = true)]
async fn test_reset_returns_to_start_of_pattern() {
    let (session, audio, _events) = session();
    session.start(box_breathing()).unwrap();
    settle(Duration::from_secs(6)).await;
    assert_eq!(session.snapshot().phase, BreathPhase::Hold1);

    let snapshot = session.reset(None).unwrap();
    assert!(!snapshot.active);
    assert!(!snapshot.completed);
    assert_eq!(snapshot.phase, BreathPhase::Inhale);
    assert_eq!(snapshot.cycle, 1);
    assert_eq!(snapshot.seconds_left, 4);
    assert_eq!(snapshot.session_id, None);
    assert_eq!(audio.count(&AudioCall::ResetAll), 1);

    settle(Duration::from_secs(10)).await;
    assert_eq!(session.snapshot(), snapshot);

    // Starting again is a fresh run and announces inhale
    let restarted = session.start(box_breathing()).unwrap();
    assert!(restarted.session_id.is_some());
    assert_eq!(
        audio.phases(),
        vec![BreathPhase::Inhale, BreathPhase::Hold1, BreathPhase::Inhale]
    );
}

#[tokio::test(start_paused = true)]
async fn test_countdown_publishes_progress() {
    let (session, _audio, events) = session();
    let mut rx = events.subscribe();
    let mut watch = session.subscribe();

    session.start(relaxing()).unwrap();
    settle(Duration::from_millis(3_500)).await;

    let progress: Vec<u32> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            BreatheEvent::SessionProgress { snapshot, .. } => Some(snapshot.seconds_left),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![3, 2, 1]);

    assert!(watch.has_changed().unwrap());
    let latest = watch.borrow_and_update().clone();
    assert!(latest.active);
    assert_eq!(latest.phase, BreathPhase::Inhale);
    assert!(latest.progress > 80.0 && latest.progress < 90.0);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_completion_runs_again() {
    let (session, audio, _events) = session();
    session.start(relaxing()).unwrap();
    settle(Duration::from_secs(20)).await;
    let finished = session.snapshot();
    assert!(finished.completed);

    let again = session.start(relaxing()).unwrap();
    assert!(again.active);
    assert!(!again.completed);
    assert_ne!(again.session_id, finished.session_id);
    assert_eq!(audio.phases().len(), 4);
}
