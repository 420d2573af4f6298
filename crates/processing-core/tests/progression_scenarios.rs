use handguide_common::{FeedbackConfig, HoldExitPolicy};
use handguide_processing_core::progression::{Milestone, ProgressPhase, TaskProgression};
use handguide_study_model::{parse_tasks, MmPosition};

const STUDY: &str = r#"[
    {
        "tag": "triangle",
        "hand": "Right",
        "distanceThreshold": 20,
        "trials": 2,
        "repetitions": 2,
        "type": "MOVE",
        "markers": [{"x": -40, "y": 0}, {"x": 40, "y": 0}, {"x": 0, "y": 30}],
        "holdDuration": 0
    },
    {
        "tag": "hold",
        "hand": "Left",
        "distanceThreshold": 20,
        "trials": 1,
        "repetitions": 1,
        "type": "HOLD",
        "markers": [{"x": 0, "y": 0}],
        "holdDuration": 2000
    }
]"#;

/// Walk the hand from `from` to `to` in `steps` frames, 16 ms apart.
fn sweep(from: MmPosition, to: MmPosition, steps: u32) -> impl Iterator<Item = MmPosition> {
    (1..=steps).map(move |i| {
        let t = i as f64 / steps as f64;
        MmPosition::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
    })
}

#[test]
fn move_task_reaches_every_target_in_order() {
    let tasks = parse_tasks(STUDY).unwrap();
    let markers = tasks[0].markers.clone();
    let mut progression =
        TaskProgression::with_tasks(vec![tasks[0].clone()], HoldExitPolicy::CancelPending).unwrap();
    let feedback = FeedbackConfig::default();

    let mut now = 0u64;
    let mut hand = MmPosition::new(0.0, -60.0);
    let mut reached = Vec::new();

    for _ in 0..(2 * 2) {
        for target in &markers {
            for p in sweep(hand, *target, 30) {
                now += 16;
                let out = progression.process_frame(Some(p), now, &feedback);
                reached.extend(out.advances);
            }
            hand = *target;
        }
    }

    assert_eq!(reached.len(), 12);
    let targets: Vec<usize> = reached.iter().map(|a| a.state.current_target).collect();
    assert_eq!(targets, vec![1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(reached[2].milestone, Milestone::Repetition);
    assert_eq!(reached[5].milestone, Milestone::Trial);
    assert_eq!(reached[8].milestone, Milestone::Repetition);
    assert_eq!(reached[11].milestone, Milestone::Task);
    assert!(reached[11].study_complete);
    assert_eq!(progression.phase(), ProgressPhase::TaskComplete);
}

#[test]
fn hold_for_full_duration_completes_once() {
    let tasks = parse_tasks(STUDY).unwrap();
    let mut progression =
        TaskProgression::with_tasks(vec![tasks[1].clone()], HoldExitPolicy::CancelPending).unwrap();
    let feedback = FeedbackConfig::default();
    let inside = Some(MmPosition::new(2.0, -1.0));

    let mut completions = 0;
    for now in (1000..=3000).step_by(10) {
        completions += progression.process_frame(inside, now, &feedback).advances.len();
    }
    assert_eq!(completions, 1);
    assert_eq!(progression.phase(), ProgressPhase::TaskComplete);
}

#[test]
fn hold_survives_frames_without_the_hand() {
    let tasks = parse_tasks(STUDY).unwrap();
    let mut progression =
        TaskProgression::with_tasks(vec![tasks[1].clone()], HoldExitPolicy::CancelPending).unwrap();
    let feedback = FeedbackConfig::default();

    let (deadline, _) = progression
        .process_frame(Some(MmPosition::ORIGIN), 0, &feedback)
        .hold_scheduled
        .unwrap();
    assert_eq!(deadline, 2000);

    let mut completions = 0;
    for now in (16..=2000).step_by(16) {
        let hand = if (800..900).contains(&now) {
            None
        } else {
            Some(MmPosition::ORIGIN)
        };
        let out = progression.process_frame(hand, now, &feedback);
        assert!(out.hold_scheduled.is_none());
        completions += out.advances.len();
    }
    completions += progression
        .process_frame(None, 2016, &feedback)
        .advances
        .len();
    assert_eq!(completions, 1);
    assert_eq!(progression.phase(), ProgressPhase::TaskComplete);
}

#[test]
fn hold_released_one_millisecond_early_never_completes() {
    let tasks = parse_tasks(STUDY).unwrap();
    let mut progression =
        TaskProgression::with_tasks(vec![tasks[1].clone()], HoldExitPolicy::CancelPending).unwrap();
    let feedback = FeedbackConfig::default();

    let out = progression.process_frame(Some(MmPosition::ORIGIN), 0, &feedback);
    let (deadline, token) = out.hold_scheduled.unwrap();
    assert_eq!(deadline, 2000);

    progression.process_frame(Some(MmPosition::ORIGIN), 1998, &feedback);
    progression.process_frame(Some(MmPosition::new(50.0, 0.0)), 1999, &feedback);

    let mut completions = 0;
    for now in (2000..6000).step_by(16) {
        completions += progression
            .process_frame(Some(MmPosition::new(50.0, 0.0)), now, &feedback)
            .advances
            .len();
    }
    assert!(progression.complete_hold(token, 2000).is_none());
    assert_eq!(completions, 0);
    assert_eq!(progression.phase(), ProgressPhase::TaskActive);
}

#[test]
fn full_study_runs_move_then_hold() {
    let tasks = parse_tasks(STUDY).unwrap();
    let markers = tasks[0].markers.clone();
    let mut progression = TaskProgression::with_tasks(tasks, HoldExitPolicy::CancelPending).unwrap();
    let feedback = FeedbackConfig::default();

    let mut now = 0;
    for _ in 0..4 {
        for target in &markers {
            now += 16;
            progression.process_frame(Some(*target), now, &feedback);
        }
    }
    assert_eq!(progression.state().current_task_index, 1);
    assert_eq!(progression.phase(), ProgressPhase::TaskActive);

    now += 16;
    let start = now;
    while progression.phase() == ProgressPhase::TaskActive {
        progression.process_frame(Some(MmPosition::ORIGIN), now, &feedback);
        now += 16;
        assert!(now < start + 3000, "hold never completed");
    }
    assert!(now >= start + 2000);
}
