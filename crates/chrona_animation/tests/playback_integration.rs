//! Integration tests for scheduler-driven playback
//!
//! These tests verify that:
//! - Playing registers a frame routine that runs the playable to completion
//! - Pause, resume and reversal keep the playhead where it was
//! - Owner deactivation and a dropped scheduler stop playback cleanly
//! - Sequences and repeaters play through the same driver

use chrona_animation::{
    AnimationError, Direction, Phase, PhaseEvent, PlayState, Playable, Repeater, Sequence, Tween,
};
use chrona_core::{ExecutionContext, OwnerScope, Scheduler, SchedulerConfig};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<(&'static str, PhaseEvent)>>>;

fn scheduler() -> Scheduler {
    Scheduler::with_config(SchedulerConfig::unclamped())
}

fn values() -> (Rc<RefCell<Vec<f32>>>, impl FnMut(f32)) {
    let values = Rc::new(RefCell::new(Vec::new()));
    let sink = values.clone();
    (values, move |v| sink.borrow_mut().push(v))
}

fn tween(context: &ExecutionContext, seconds: f32) -> Tween<f32> {
    Tween::builder(context)
        .from(0.0f32)
        .to(1.0)
        .duration(seconds)
        .build(|_| {})
        .unwrap()
}

fn record(log: &Log, label: &'static str, playable: &Playable) {
    let sink = log.clone();
    playable
        .on_phase(move |event| sink.borrow_mut().push((label, *event)))
        .unwrap();
}

fn bookends(log: &Log) -> Vec<(&'static str, Phase)> {
    log.borrow()
        .iter()
        .filter(|(_, event)| matches!(event.phase, Phase::Started | Phase::Completed))
        .map(|(label, event)| (*label, event.phase))
        .collect()
}

#[test]
fn test_play_runs_to_completion() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let (applied, sink) = values();
    let tween = Tween::builder(&ctx)
        .from(0.0f32)
        .to(1.0)
        .duration(1.0)
        .build(sink)
        .unwrap();

    tween.play().unwrap();
    assert_eq!(tween.state(), PlayState::Playing);
    assert_eq!(scheduler.routine_count(), 1);

    for _ in 0..3 {
        scheduler.advance(0.25);
    }
    assert!(tween.is_playing());
    assert_eq!(tween.played_time(), 0.75);
    assert_eq!(*applied.borrow().last().unwrap(), 0.75);

    scheduler.advance(0.25);
    assert_eq!(tween.state(), PlayState::Completed);
    assert_eq!(tween.played_time(), 1.0);
    assert_eq!(*applied.borrow().last().unwrap(), 1.0);
    assert_eq!(scheduler.routine_count(), 0);
}

/// The last frame overshoots the end and is clamped to it
#[test]
fn test_overshooting_frame_clamps_to_end() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let tween = tween(&ctx, 1.0);

    tween.play().unwrap();
    scheduler.advance(0.75);
    scheduler.advance(0.75);
    assert_eq!(tween.state(), PlayState::Completed);
    assert_eq!(tween.played_time(), 1.0);
}

#[test]
fn test_time_scale_speeds_up_playback() {
    let scheduler = Scheduler::with_config(SchedulerConfig::default().with_time_scale(2.0));
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let tween = tween(&ctx, 1.0);

    tween.play().unwrap();
    scheduler.advance(0.25);
    assert_eq!(tween.played_time(), 0.5);
}

#[test]
fn test_play_backward_from_reset() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let (applied, sink) = values();
    let tween = Tween::builder(&ctx)
        .from(0.0f32)
        .to(1.0)
        .build(sink)
        .unwrap();
    let log = Log::default();
    record(&log, "t", &tween);

    tween.play_backward().unwrap();
    assert_eq!(tween.direction(), Direction::Backward);
    assert_eq!(tween.played_time(), 1.0);

    for _ in 0..4 {
        scheduler.advance(0.25);
    }
    assert_eq!(tween.state(), PlayState::Completed);
    assert_eq!(tween.played_time(), 0.0);
    assert_eq!(*applied.borrow().last().unwrap(), 0.0);

    let log = log.borrow();
    assert!(log.iter().all(|(_, e)| e.direction == Direction::Backward));
    let completed = log.last().unwrap().1;
    assert_eq!(completed.phase, Phase::Completed);
    assert_eq!(completed.time, 0.0);
}

#[test]
fn test_pause_and_resume() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let tween = tween(&ctx, 1.0);
    let log = Log::default();
    record(&log, "t", &tween);

    tween.play().unwrap();
    scheduler.advance(0.25);
    tween.pause().unwrap();
    assert_eq!(tween.state(), PlayState::Paused);
    assert_eq!(scheduler.routine_count(), 0);

    scheduler.advance(0.25);
    assert_eq!(tween.played_time(), 0.25);

    tween.play().unwrap();
    scheduler.advance(0.25);
    assert_eq!(tween.played_time(), 0.5);

    // Resuming does not start over
    let starts = log
        .borrow()
        .iter()
        .filter(|(_, e)| e.phase == Phase::Started)
        .count();
    assert_eq!(starts, 1);
}

#[test]
fn test_reverse_while_playing() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let tween = tween(&ctx, 1.0);

    tween.play().unwrap();
    scheduler.advance(0.5);
    tween.play_backward().unwrap();
    assert_eq!(tween.state(), PlayState::Playing);
    assert_eq!(tween.played_time(), 0.5);
    assert_eq!(scheduler.routine_count(), 1);
    assert_eq!(
        tween.play_backward(),
        Err(AnimationError::AlreadyPlaying(Direction::Backward))
    );

    scheduler.advance(0.25);
    assert_eq!(tween.played_time(), 0.25);
    scheduler.advance(0.25);
    assert_eq!(tween.state(), PlayState::Completed);
    assert_eq!(tween.played_time(), 0.0);
    assert_eq!(scheduler.routine_count(), 0);
}

#[test]
fn test_reset_while_playing() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let tween = tween(&ctx, 1.0);
    let log = Log::default();
    record(&log, "t", &tween);

    tween.play().unwrap();
    scheduler.advance(0.5);
    let fired = log.borrow().len();

    tween.reset().unwrap();
    assert_eq!(tween.state(), PlayState::Reset);
    assert_eq!(tween.played_time(), 0.0);
    assert_eq!(scheduler.routine_count(), 0);
    assert_eq!(log.borrow().len(), fired);
}

#[test]
fn test_owner_deactivation_resets_playback() {
    let scheduler = scheduler();
    let owner = OwnerScope::new("widget");
    let ctx = ExecutionContext::with_owner(scheduler.handle(), owner.clone());
    let tween = tween(&ctx, 1.0);

    tween.play().unwrap();
    scheduler.advance(0.25);
    assert_eq!(owner.watcher_count(), 1);

    owner.deactivate();
    assert_eq!(tween.state(), PlayState::Reset);
    assert_eq!(tween.played_time(), 0.0);
    assert_eq!(scheduler.routine_count(), 0);
    assert_eq!(owner.watcher_count(), 0);

    assert_eq!(tween.play(), Err(AnimationError::InactiveOwner));

    owner.activate();
    tween.play().unwrap();
    assert!(tween.is_playing());
}

#[test]
fn test_completion_releases_owner() {
    let scheduler = scheduler();
    let owner = OwnerScope::new("widget");
    let ctx = ExecutionContext::with_owner(scheduler.handle(), owner.clone());
    let tween = tween(&ctx, 0.5);

    tween.play().unwrap();
    scheduler.advance(0.5);
    assert_eq!(tween.state(), PlayState::Completed);
    assert_eq!(owner.watcher_count(), 0);

    // A completed playable is left alone
    owner.deactivate();
    assert_eq!(tween.state(), PlayState::Completed);
}

#[test]
fn test_dropped_scheduler() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let tween = tween(&ctx, 1.0);
    drop(scheduler);

    assert_eq!(tween.play(), Err(AnimationError::DriverGone));
    assert_eq!(tween.state(), PlayState::Reset);

    // Seeking needs no driver
    tween.rewind_to(0.5).unwrap();
    assert_eq!(tween.played_time(), 0.5);
}

#[test]
fn test_zero_duration_play_completes_at_once() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let (applied, sink) = values();
    let tween = Tween::builder(&ctx)
        .from(0.0f32)
        .to(3.0)
        .duration(0.0)
        .build(sink)
        .unwrap();
    let log = Log::default();
    record(&log, "t", &tween);

    tween.play().unwrap();
    assert_eq!(tween.state(), PlayState::Completed);
    assert_eq!(scheduler.routine_count(), 0);
    assert_eq!(*applied.borrow().last().unwrap(), 3.0);
    assert_eq!(bookends(&log), vec![("t", Phase::Started), ("t", Phase::Completed)]);
}

#[test]
fn test_replay_after_completion() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let tween = tween(&ctx, 0.5);

    tween.play().unwrap();
    scheduler.advance(0.5);
    assert_eq!(tween.state(), PlayState::Completed);

    assert_eq!(tween.play_with(false), Err(AnimationError::AlreadyCompleted));
    assert_eq!(tween.state(), PlayState::Completed);

    tween.play().unwrap();
    assert_eq!(tween.played_time(), 0.0);
    scheduler.advance(0.25);
    assert_eq!(tween.played_time(), 0.25);
}

#[test]
fn test_driven_sequence_plays_children_in_order() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let a = tween(&ctx, 1.0);
    let b = tween(&ctx, 1.0);
    let log = Log::default();
    record(&log, "a", &a);
    record(&log, "b", &b);

    let sequence = Sequence::new(&ctx);
    sequence.append(a.clone()).unwrap();
    sequence.append(b.clone()).unwrap();
    assert!(a.is_owned());
    assert_eq!(a.play(), Err(AnimationError::Owned));

    sequence.play().unwrap();
    for _ in 0..8 {
        scheduler.advance(0.25);
    }
    assert_eq!(sequence.state(), PlayState::Completed);
    assert_eq!(scheduler.routine_count(), 0);
    assert_eq!(
        bookends(&log),
        vec![
            ("a", Phase::Started),
            ("a", Phase::Completed),
            ("b", Phase::Started),
            ("b", Phase::Completed),
        ]
    );
}

#[test]
fn test_repeater_replays_sequence() {
    let scheduler = scheduler();
    let ctx = ExecutionContext::for_scheduler(&scheduler);
    let sequence = Sequence::new(&ctx);
    sequence.append(tween(&ctx, 0.5)).unwrap();

    let repeater = Repeater::start(sequence.clone()).unwrap();
    for _ in 0..4 {
        scheduler.advance(0.25);
    }
    assert_eq!(repeater.repeats(), 2);
    assert!(sequence.is_playing());
    assert_eq!(sequence.played_time(), 0.0);

    repeater.stop().unwrap();
    scheduler.advance(0.25);
    scheduler.advance(0.25);
    assert_eq!(sequence.state(), PlayState::Completed);
    assert_eq!(repeater.repeats(), 2);
}
