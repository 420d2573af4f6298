//! Rows of the engaged-frame data log.
//!
//! Rows serialize straight into the exported CSV tables: field names are
//! the column headers and declaration order is the column order.

use serde::{Deserialize, Serialize};

use crate::task::{Hand, TaskKind};

/// Indices and identity shared by every row of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleContext {
    /// Wall-clock time of the frame (ms since epoch).
    pub unix_timestamp: i64,
    /// Seconds since the dwell or path started.
    pub time_sec: f64,
    pub participant_id: String,
    pub task_tag: String,
    pub task_type: TaskKind,
    pub user_hand: Hand,
    pub task_idx: usize,
    pub trial_idx: u32,
    pub repetition_idx: u32,
    pub target_idx: usize,
}

/// Physical-millimeter sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmSample {
    pub unix_timestamp: i64,
    pub time_sec: f64,
    pub participant_id: String,
    pub task_tag: String,
    pub task_type: TaskKind,
    pub user_hand: Hand,
    pub task_idx: usize,
    pub trial_idx: u32,
    pub repetition_idx: u32,
    pub target_idx: usize,
    pub target_x_mm: f64,
    pub target_y_mm: f64,
    pub target_threshold_mm: f64,
    pub user_left_x_mm: f64,
    pub user_left_y_mm: f64,
    pub user_right_x_mm: f64,
    pub user_right_y_mm: f64,
    pub target_dist_mm: f64,
}

/// Display-pixel sample, scaled with the world PPI in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PxSample {
    pub unix_timestamp: i64,
    pub time_sec: f64,
    pub participant_id: String,
    pub task_tag: String,
    pub task_type: TaskKind,
    pub user_hand: Hand,
    pub task_idx: usize,
    pub trial_idx: u32,
    pub repetition_idx: u32,
    pub target_idx: usize,
    pub target_x_px: f64,
    pub target_y_px: f64,
    pub target_threshold_px: f64,
    pub user_left_x_px: f64,
    pub user_left_y_px: f64,
    pub user_right_x_px: f64,
    pub user_right_y_px: f64,
    pub target_dist_px: f64,
    pub world_ppi: f64,
    /// Pixels per millimeter (`worldPPI / 25.4`).
    pub scaling_factor: f64,
}

/// IMU reading captured alongside an engaged frame.
///
/// The acceleration cells are empty when no frame has been decoded yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    pub unix_timestamp: i64,
    pub time_sec: f64,
    pub participant_id: String,
    pub task_tag: String,
    pub task_type: TaskKind,
    pub task_idx: usize,
    pub trial_idx: u32,
    pub repetition_idx: u32,
    pub target_idx: usize,
    pub ax: Option<f32>,
    pub ay: Option<f32>,
    pub az: Option<f32>,
}

impl SampleContext {
    pub fn mm_sample(
        &self,
        target: (f64, f64),
        threshold_mm: f64,
        hand: (f64, f64),
        dist_mm: f64,
    ) -> MmSample {
        MmSample {
            unix_timestamp: self.unix_timestamp,
            time_sec: self.time_sec,
            participant_id: self.participant_id.clone(),
            task_tag: self.task_tag.clone(),
            task_type: self.task_type,
            user_hand: self.user_hand,
            task_idx: self.task_idx,
            trial_idx: self.trial_idx,
            repetition_idx: self.repetition_idx,
            target_idx: self.target_idx,
            target_x_mm: target.0,
            target_y_mm: target.1,
            target_threshold_mm: threshold_mm,
            user_left_x_mm: hand.0,
            user_left_y_mm: hand.1,
            user_right_x_mm: hand.0,
            user_right_y_mm: hand.1,
            target_dist_mm: dist_mm,
        }
    }

    /// Scale an mm sample into pixels with `px_per_mm`.
    pub fn px_sample(&self, mm: &MmSample, world_ppi: f64, px_per_mm: f64) -> PxSample {
        PxSample {
            unix_timestamp: self.unix_timestamp,
            time_sec: self.time_sec,
            participant_id: self.participant_id.clone(),
            task_tag: self.task_tag.clone(),
            task_type: self.task_type,
            user_hand: self.user_hand,
            task_idx: self.task_idx,
            trial_idx: self.trial_idx,
            repetition_idx: self.repetition_idx,
            target_idx: self.target_idx,
            target_x_px: mm.target_x_mm * px_per_mm,
            target_y_px: mm.target_y_mm * px_per_mm,
            target_threshold_px: mm.target_threshold_mm * px_per_mm,
            user_left_x_px: mm.user_left_x_mm * px_per_mm,
            user_left_y_px: mm.user_left_y_mm * px_per_mm,
            user_right_x_px: mm.user_right_x_mm * px_per_mm,
            user_right_y_px: mm.user_right_y_mm * px_per_mm,
            target_dist_px: mm.target_dist_mm * px_per_mm,
            world_ppi,
            scaling_factor: px_per_mm,
        }
    }

    pub fn imu_sample(&self, accel: Option<(f32, f32, f32)>) -> ImuSample {
        ImuSample {
            unix_timestamp: self.unix_timestamp,
            time_sec: self.time_sec,
            participant_id: self.participant_id.clone(),
            task_tag: self.task_tag.clone(),
            task_type: self.task_type,
            task_idx: self.task_idx,
            trial_idx: self.trial_idx,
            repetition_idx: self.repetition_idx,
            target_idx: self.target_idx,
            ax: accel.map(|a| a.0),
            ay: accel.map(|a| a.1),
            az: accel.map(|a| a.2),
        }
    }
}
