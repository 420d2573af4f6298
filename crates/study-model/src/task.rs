//! Task definitions and the JSON task file format.
//!
//! A task file is a JSON array of [`Task`] objects produced by the task
//! builder. Field names follow the builder's camelCase convention and
//! must round-trip unchanged.

use serde::{Deserialize, Serialize};

use crate::geometry::MmPosition;

/// Errors raised while loading or validating task data.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task list is empty")]
    Empty,

    #[error("Task {index} ({tag}): {reason}")]
    InvalidTask {
        index: usize,
        tag: String,
        reason: String,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Task payload is not valid base64: {0}")]
    Encoding(String),
}

/// Which hand the participant uses for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hand {
    Left,
    #[default]
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }
}

/// Task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskKind {
    /// Visit each marker of a path in order.
    #[default]
    Move,
    /// Keep the hand inside a single marker for `holdDuration`.
    Hold,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "MOVE",
            Self::Hold => "HOLD",
        }
    }
}

/// A single study task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Free-form label copied into every data row.
    pub tag: String,

    pub hand: Hand,

    /// Diameter of the capture circle around each marker (mm).
    pub distance_threshold: f64,

    pub trials: u32,

    pub repetitions: u32,

    #[serde(rename = "type")]
    pub kind: TaskKind,

    /// Marker positions on the testbed (mm, testbed-centered).
    pub markers: Vec<MmPosition>,

    /// Dwell required to complete a HOLD (ms). Ignored for MOVE.
    pub hold_duration: u64,
}

/// Defaults applied when authoring a new task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefaults {
    pub hand: Hand,
    pub trials: u32,
    pub repetitions: u32,
    pub distance_threshold_mm: f64,
    pub hold_duration_ms: u64,
    /// Countdown shown before the first target (ms).
    pub start_duration_ms: u64,
    pub kind: TaskKind,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            hand: Hand::Right,
            trials: 3,
            repetitions: 5,
            distance_threshold_mm: 50.0,
            hold_duration_ms: 5000,
            start_duration_ms: 3000,
            kind: TaskKind::Move,
        }
    }
}

impl Task {
    /// Create an empty task from authoring defaults.
    ///
    /// HOLD tasks start with one marker at the testbed center; MOVE tasks
    /// start with no markers and must be given a path before use.
    pub fn from_defaults(tag: impl Into<String>, defaults: &TaskDefaults) -> Self {
        let markers = match defaults.kind {
            TaskKind::Hold => vec![MmPosition::ORIGIN],
            TaskKind::Move => vec![],
        };
        Self {
            tag: tag.into(),
            hand: defaults.hand,
            distance_threshold: defaults.distance_threshold_mm,
            trials: defaults.trials,
            repetitions: defaults.repetitions,
            kind: defaults.kind,
            markers,
            hold_duration: defaults.hold_duration_ms,
        }
    }

    /// Radius of the capture circle (mm).
    pub fn capture_radius(&self) -> f64 {
        self.distance_threshold / 2.0
    }

    /// Check the structural invariants of a single task.
    pub fn validate(&self) -> Result<(), String> {
        if self.trials < 1 {
            return Err("trials must be at least 1".into());
        }
        if self.repetitions < 1 {
            return Err("repetitions must be at least 1".into());
        }
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(format!(
                "distanceThreshold must be positive, got {}",
                self.distance_threshold
            ));
        }
        match self.kind {
            TaskKind::Move if self.markers.is_empty() => {
                return Err("MOVE task needs at least one marker".into());
            }
            TaskKind::Hold if self.markers.len() != 1 => {
                return Err(format!(
                    "HOLD task needs exactly one marker, got {}",
                    self.markers.len()
                ));
            }
            TaskKind::Hold if self.hold_duration == 0 => {
                return Err("HOLD task needs a non-zero holdDuration".into());
            }
            _ => {}
        }
        if let Some(i) = self.markers.iter().position(|m| !m.is_finite()) {
            return Err(format!("marker {i} has a non-finite coordinate"));
        }
        Ok(())
    }
}

/// Validate a whole task list. An empty list is rejected.
pub fn validate_tasks(tasks: &[Task]) -> Result<(), TaskError> {
    if tasks.is_empty() {
        return Err(TaskError::Empty);
    }
    for (index, task) in tasks.iter().enumerate() {
        task.validate().map_err(|reason| TaskError::InvalidTask {
            index,
            tag: task.tag.clone(),
            reason,
        })?;
    }
    Ok(())
}

/// Parse and validate a task file.
pub fn parse_tasks(json: &str) -> Result<Vec<Task>, TaskError> {
    let tasks: Vec<Task> = serde_json::from_str(json)?;
    validate_tasks(&tasks)?;
    Ok(tasks)
}

/// Serialize a task list in the task builder's pretty format.
pub fn serialize_tasks(tasks: &[Task]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_FILE: &str = r#"[
        {
            "tag": "reach-1",
            "hand": "Left",
            "distanceThreshold": 20,
            "trials": 2,
            "repetitions": 3,
            "type": "MOVE",
            "markers": [{"x": -40, "y": 0}, {"x": 40, "y": 10.5}],
            "holdDuration": 0
        },
        {
            "tag": "hold-center",
            "hand": "Right",
            "distanceThreshold": 30,
            "trials": 1,
            "repetitions": 1,
            "type": "HOLD",
            "markers": [{"x": 0, "y": 0}],
            "holdDuration": 2000
        }
    ]"#;

    #[test]
    fn test_parse_task_file() {
        let tasks = parse_tasks(TASK_FILE).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].hand, Hand::Left);
        assert_eq!(tasks[0].kind, TaskKind::Move);
        assert_eq!(tasks[0].markers[1], MmPosition::new(40.0, 10.5));
        assert_eq!(tasks[1].kind, TaskKind::Hold);
        assert_eq!(tasks[1].hold_duration, 2000);
        assert!((tasks[1].capture_radius() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_serialized_field_names_match_builder() {
        let tasks = parse_tasks(TASK_FILE).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&serialize_tasks(&tasks).unwrap()).unwrap();
        let first = &value[0];
        for key in [
            "tag",
            "hand",
            "distanceThreshold",
            "trials",
            "repetitions",
            "type",
            "markers",
            "holdDuration",
        ] {
            assert!(first.get(key).is_some(), "missing {key}");
        }
        assert_eq!(first["type"], "MOVE");
        assert_eq!(first["hand"], "Left");
        assert_eq!(first["markers"][1]["y"], 10.5);

        let reparsed = parse_tasks(&serialize_tasks(&tasks).unwrap()).unwrap();
        assert_eq!(reparsed, tasks);
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(matches!(parse_tasks("[]"), Err(TaskError::Empty)));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(parse_tasks("{\"tag\":"), Err(TaskError::Json(_))));
        assert!(matches!(
            parse_tasks(r#"[{"tag":"x"}]"#),
            Err(TaskError::Json(_))
        ));
    }

    #[test]
    fn test_hold_requires_single_marker() {
        let mut task = Task::from_defaults(
            "h",
            &TaskDefaults {
                kind: TaskKind::Hold,
                ..Default::default()
            },
        );
        assert!(task.validate().is_ok());
        task.markers.push(MmPosition::new(1.0, 1.0));
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_move_requires_marker() {
        let task = Task::from_defaults("m", &TaskDefaults::default());
        let err = validate_tasks(&[task]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidTask { index: 0, .. }));
    }

    #[test]
    fn test_zero_trials_rejected() {
        let mut task = Task::from_defaults("m", &TaskDefaults::default());
        task.markers.push(MmPosition::ORIGIN);
        task.trials = 0;
        assert!(task.validate().is_err());
    }
}
