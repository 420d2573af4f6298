//! Task Progression State Machine.
//!
//! Drives a participant through a list of tasks against a stream of hand
//! positions (mm). Each call to [`TaskProgression::process_frame`]:
//!
//! 1. fires a HOLD completion whose deadline has passed,
//! 2. measures the hand against the current target marker,
//! 3. arms the dwell timer on entry (and schedules the HOLD completion),
//! 4. advances immediately while inside a MOVE target.
//!
//! Advancing walks target, then repetition, then trial, then task. The
//! machine is `AwaitingTaskData` until a valid task list is loaded and
//! `TaskComplete` once the last task is finished.

use handguide_common::{FeedbackConfig, HoldExitPolicy};
use handguide_study_model::{validate_tasks, MmPosition, Task, TaskError, TaskKind};
use serde::{Deserialize, Serialize};

use crate::feedback::DirectionalFeedback;
use crate::mapper::closest_point_on_segment;

/// Top-level phase of a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    AwaitingTaskData,
    TaskActive,
    TaskComplete,
}

/// Indices of the running task plus the dwell timer.
///
/// `task_start_time` is set iff the hand entered the current target and
/// the dwell began; every advance clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskRunState {
    pub current_task_index: usize,
    pub current_trial: u32,
    pub current_repetition: u32,
    pub current_target: usize,
    pub previous_target: Option<usize>,
    pub task_start_time: Option<u64>,
}

/// Granularity of an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Milestone {
    Target,
    Repetition,
    Trial,
    Task,
}

/// Audible cue for a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    /// Short click: target, repetition, or trial reached.
    Click,
    /// Longer beep: task finished.
    Beep,
}

impl Milestone {
    pub fn cue(&self) -> Cue {
        match self {
            Self::Task => Cue::Beep,
            _ => Cue::Click,
        }
    }
}

/// One advance of the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    pub milestone: Milestone,
    pub cue: Cue,
    /// State right after the advance.
    pub state: TaskRunState,
    /// True when this advance finished the last task.
    pub study_complete: bool,
}

/// Identifies one scheduled HOLD completion. A completion whose token no
/// longer matches the pending one is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HoldToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingHold {
    deadline_ms: u64,
    token: HoldToken,
}

/// A frame in which the participant is engaged with a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagedFrame {
    /// Milliseconds since the dwell (HOLD) or path (MOVE) started.
    pub elapsed_ms: u64,
    /// State before any advance triggered by this frame.
    pub state: TaskRunState,
    pub target_mm: MmPosition,
    pub hand_mm: MmPosition,
    pub distance_mm: f64,
}

/// Everything one frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub phase: ProgressPhase,
    /// Distance from the hand to the current target.
    pub distance_mm: Option<f64>,
    pub inside: bool,
    pub guide_point: Option<MmPosition>,
    pub feedback: Option<DirectionalFeedback>,
    pub engaged: Option<EngagedFrame>,
    pub advances: Vec<Advance>,
    /// Deadline of a HOLD completion scheduled by this frame.
    pub hold_scheduled: Option<(u64, HoldToken)>,
}

impl FrameOutcome {
    fn idle(phase: ProgressPhase) -> Self {
        Self {
            phase,
            distance_mm: None,
            inside: false,
            guide_point: None,
            feedback: None,
            engaged: None,
            advances: Vec::new(),
            hold_scheduled: None,
        }
    }
}

/// The progression engine.
#[derive(Debug, Clone)]
pub struct TaskProgression {
    tasks: Vec<Task>,
    phase: ProgressPhase,
    state: TaskRunState,
    hold_exit: HoldExitPolicy,
    pending_hold: Option<PendingHold>,
    next_token: u64,
    /// Set when a MOVE trial's path starts, cleared at trial/task
    /// boundaries.
    path_started_at: Option<u64>,
}

impl TaskProgression {
    pub fn new(hold_exit: HoldExitPolicy) -> Self {
        Self {
            tasks: Vec::new(),
            phase: ProgressPhase::AwaitingTaskData,
            state: TaskRunState::default(),
            hold_exit,
            pending_hold: None,
            next_token: 0,
            path_started_at: None,
        }
    }

    /// Load a task list and start the first task. Invalid or empty lists
    /// are rejected and leave the machine untouched.
    pub fn load(&mut self, tasks: Vec<Task>) -> Result<(), TaskError> {
        validate_tasks(&tasks)?;
        tracing::info!(tasks = tasks.len(), "Task data loaded");
        self.tasks = tasks;
        self.phase = ProgressPhase::TaskActive;
        self.state = TaskRunState::default();
        self.pending_hold = None;
        self.path_started_at = None;
        Ok(())
    }

    pub fn with_tasks(tasks: Vec<Task>, hold_exit: HoldExitPolicy) -> Result<Self, TaskError> {
        let mut progression = Self::new(hold_exit);
        progression.load(tasks)?;
        Ok(progression)
    }

    pub fn phase(&self) -> ProgressPhase {
        self.phase
    }

    pub fn state(&self) -> &TaskRunState {
        &self.state
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn hold_exit(&self) -> HoldExitPolicy {
        self.hold_exit
    }

    pub fn set_hold_exit(&mut self, policy: HoldExitPolicy) {
        self.hold_exit = policy;
    }

    pub fn current_task(&self) -> Option<&Task> {
        match self.phase {
            ProgressPhase::TaskActive => self.tasks.get(self.state.current_task_index),
            _ => None,
        }
    }

    pub fn current_target_position(&self) -> Option<MmPosition> {
        self.current_task()?
            .markers
            .get(self.state.current_target)
            .copied()
    }

    /// Deadline and token of the pending HOLD completion.
    pub fn next_deadline(&self) -> Option<(u64, HoldToken)> {
        self.pending_hold.map(|p| (p.deadline_ms, p.token))
    }

    /// Fraction of the current HOLD dwell completed, in `[0, 1]`.
    pub fn hold_progress(&self, now_ms: u64) -> f64 {
        match (self.current_task(), self.state.task_start_time) {
            (Some(task), Some(start)) if task.kind == TaskKind::Hold => {
                let elapsed = now_ms.saturating_sub(start) as f64;
                (elapsed / task.hold_duration.max(1) as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// Point the directional feedback pulls toward.
    ///
    /// HOLD guides to the single marker. MOVE guides to the hand's
    /// projection on the segment from the previous to the current
    /// target, or to the current target when there is no previous one.
    pub fn guide_point(&self, hand: &MmPosition) -> Option<MmPosition> {
        let task = self.current_task()?;
        match task.kind {
            TaskKind::Hold => task.markers.first().copied(),
            TaskKind::Move => {
                let current = task.markers.get(self.state.current_target)?;
                match self
                    .state
                    .previous_target
                    .and_then(|i| task.markers.get(i))
                {
                    Some(previous) => Some(closest_point_on_segment(hand, previous, current)),
                    None => Some(*current),
                }
            }
        }
    }

    /// Fire the pending HOLD completion if `token` still matches.
    pub fn complete_hold(&mut self, token: HoldToken, now_ms: u64) -> Option<Advance> {
        match self.pending_hold {
            Some(pending) if pending.token == token && now_ms >= pending.deadline_ms => {
                tracing::debug!(deadline_ms = pending.deadline_ms, now_ms, "Hold completed");
                self.pending_hold = None;
                self.advance()
            }
            Some(pending) if pending.token == token => None,
            _ => {
                tracing::trace!(?token, "Ignoring stale hold completion");
                None
            }
        }
    }

    /// Fire a pending HOLD completion whose deadline is at or before
    /// `now_ms`.
    pub fn poll_hold(&mut self, now_ms: u64) -> Option<Advance> {
        let (deadline, token) = self.next_deadline()?;
        if now_ms >= deadline {
            self.complete_hold(token, now_ms)
        } else {
            None
        }
    }

    /// Evaluate one frame. `hand` is the active hand in mm, if tracked.
    pub fn process_frame(
        &mut self,
        hand: Option<MmPosition>,
        now_ms: u64,
        feedback: &FeedbackConfig,
    ) -> FrameOutcome {
        let mut outcome = FrameOutcome::idle(self.phase);
        if let Some(advance) = self.poll_hold(now_ms) {
            outcome.advances.push(advance);
        }
        outcome.phase = self.phase;

        let (kind, radius, target) = match (self.current_task(), self.current_target_position()) {
            (Some(task), Some(target)) => (task.kind, task.capture_radius(), target),
            _ => return outcome,
        };

        // A frame without the hand is skipped; a pending hold keeps running.
        let Some(hand) = hand else {
            return outcome;
        };

        let distance = hand.distance_to(&target);
        let guide = self.guide_point(&hand);
        outcome.distance_mm = Some(distance);
        outcome.guide_point = guide;
        outcome.feedback = guide.map(|g| DirectionalFeedback::toward(&hand, &g, feedback));

        if let Some(origin) = self.engagement_origin(kind) {
            outcome.engaged = Some(EngagedFrame {
                elapsed_ms: now_ms.saturating_sub(origin),
                state: self.state,
                target_mm: target,
                hand_mm: hand,
                distance_mm: distance,
            });
        }

        outcome.inside = distance <= radius;
        if !outcome.inside {
            if kind == TaskKind::Hold {
                self.exit_hold("left capture radius");
            }
            return outcome;
        }

        if self.state.task_start_time.is_none() {
            self.state.task_start_time = Some(now_ms);
            match kind {
                TaskKind::Move => {
                    self.path_started_at.get_or_insert(now_ms);
                }
                TaskKind::Hold => {
                    let scheduled = self.schedule_hold(now_ms);
                    outcome.hold_scheduled = Some(scheduled);
                }
            }
        }

        if kind == TaskKind::Move {
            if let Some(advance) = self.advance() {
                outcome.advances.push(advance);
            }
        }
        outcome.phase = self.phase;
        outcome
    }

    fn engagement_origin(&self, kind: TaskKind) -> Option<u64> {
        match kind {
            TaskKind::Move => self.path_started_at.or(self.state.task_start_time),
            TaskKind::Hold => self.state.task_start_time,
        }
    }

    fn schedule_hold(&mut self, now_ms: u64) -> (u64, HoldToken) {
        let hold_ms = self.current_task().map(|t| t.hold_duration).unwrap_or(0);
        let token = HoldToken(self.next_token);
        self.next_token += 1;
        let deadline_ms = now_ms.saturating_add(hold_ms);
        self.pending_hold = Some(PendingHold { deadline_ms, token });
        tracing::debug!(deadline_ms, ?token, "Hold completion scheduled");
        (deadline_ms, token)
    }

    fn exit_hold(&mut self, reason: &str) {
        if self.hold_exit != HoldExitPolicy::CancelPending || self.state.task_start_time.is_none() {
            return;
        }
        self.state.task_start_time = None;
        if self.pending_hold.take().is_some() {
            tracing::debug!(reason, "Pending hold cancelled");
        }
    }

    /// Move to the next target, repetition, trial, or task.
    fn advance(&mut self) -> Option<Advance> {
        let task = self.current_task()?;
        let last_marker = task.markers.len().saturating_sub(1);
        let (repetitions, trials) = (task.repetitions, task.trials);
        let s = &mut self.state;

        let milestone = if s.current_target < last_marker {
            s.previous_target = Some(s.current_target);
            s.current_target += 1;
            Milestone::Target
        } else if s.current_repetition + 1 < repetitions {
            s.previous_target = Some(s.current_target);
            s.current_repetition += 1;
            s.current_target = 0;
            Milestone::Repetition
        } else if s.current_trial + 1 < trials {
            s.previous_target = None;
            s.current_trial += 1;
            s.current_repetition = 0;
            s.current_target = 0;
            Milestone::Trial
        } else {
            s.previous_target = None;
            s.current_task_index += 1;
            s.current_trial = 0;
            s.current_repetition = 0;
            s.current_target = 0;
            Milestone::Task
        };
        s.task_start_time = None;
        self.pending_hold = None;
        if milestone >= Milestone::Trial {
            self.path_started_at = None;
        }

        let study_complete = self.state.current_task_index >= self.tasks.len();
        if study_complete {
            self.phase = ProgressPhase::TaskComplete;
            tracing::info!("All tasks complete");
        } else if milestone == Milestone::Task {
            tracing::info!(task = self.state.current_task_index, "Advanced to next task");
        } else {
            tracing::debug!(
                ?milestone,
                trial = self.state.current_trial,
                repetition = self.state.current_repetition,
                target = self.state.current_target,
                "Advanced"
            );
        }

        Some(Advance {
            milestone,
            cue: milestone.cue(),
            state: self.state,
            study_complete,
        })
    }
}
