//! Landmark extraction.
//!
//! Detectors report landmarks normalized to `[0, 1]` of the camera frame.
//! The participant sees a mirrored preview, so every horizontal coordinate
//! is flipped (`x' = 1 - x`) before mapping into device pixels.

use handguide_common::DetectionConfig;
use handguide_processing_core::CoordinateMapper;
use handguide_study_model::{
    DevicePosition, DevicePx, FingerTips, FingertipDetection, FrameSize, HandPair, PinchState,
    WristDetection,
};
use serde::{Deserialize, Serialize};

/// Pose landmark feeding the right-hand slot in the mirrored view.
pub const POSE_RIGHT_WRIST: usize = 15;
/// Pose landmark feeding the left-hand slot in the mirrored view.
pub const POSE_LEFT_WRIST: usize = 16;

pub const HAND_WRIST: usize = 0;
pub const HAND_THUMB_TIP: usize = 4;
pub const HAND_INDEX_TIP: usize = 8;
pub const HAND_MIDDLE_TIP: usize = 12;
pub const HAND_RING_TIP: usize = 16;
pub const HAND_PINKY_TIP: usize = 20;

/// One normalized landmark.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Visibility confidence in `[0, 1]`. Hand landmarks omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    fn to_device(&self, video: FrameSize, mapper: &CoordinateMapper) -> Option<DevicePosition> {
        mapper.normalized_to_device(1.0 - self.x, self.y, video)
    }
}

/// Landmarks of one detected hand.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandLandmarks {
    /// Reported handedness label ("Left"/"Right"), if any.
    #[serde(default)]
    pub handedness: Option<String>,
    pub landmarks: Vec<Landmark>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl HandLandmarks {
    /// Side from the handedness label, falling back to the horizontal
    /// position of the wrist when this is the only hand in view.
    fn side(&self, hands_in_view: usize) -> Option<Side> {
        let label = self.handedness.as_deref().unwrap_or("").to_ascii_lowercase();
        match label.as_str() {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ if hands_in_view == 1 => {
                let x = self.landmarks.get(HAND_WRIST).map(|l| l.x).unwrap_or(0.5);
                Some(if x < 0.5 { Side::Left } else { Side::Right })
            }
            _ => None,
        }
    }
}

/// Wrist positions from pose landmarks.
///
/// A wrist whose visibility is missing or below `visibility_threshold`
/// is dropped.
pub fn extract_wrists(
    pose: &[Landmark],
    video: FrameSize,
    mapper: &CoordinateMapper,
    visibility_threshold: f64,
) -> WristDetection {
    if pose.len() <= POSE_RIGHT_WRIST.max(POSE_LEFT_WRIST) {
        return WristDetection::default();
    }
    let wrist = |index: usize| {
        let lm = &pose[index];
        match lm.visibility {
            Some(v) if v >= visibility_threshold => lm.to_device(video, mapper),
            _ => None,
        }
    };
    HandPair {
        left: wrist(POSE_LEFT_WRIST),
        right: wrist(POSE_RIGHT_WRIST),
    }
}

/// Fingertip positions from hand landmarks.
pub fn extract_fingertips(
    hands: &[HandLandmarks],
    video: FrameSize,
    mapper: &CoordinateMapper,
) -> FingertipDetection {
    let mut detection = FingertipDetection::default();
    for hand in hands {
        let Some(side) = hand.side(hands.len()) else {
            continue;
        };
        let tip = |index: usize| {
            hand.landmarks
                .get(index)
                .and_then(|lm| lm.to_device(video, mapper))
        };
        let tips = FingerTips {
            thumb: tip(HAND_THUMB_TIP),
            index: tip(HAND_INDEX_TIP),
            middle: tip(HAND_MIDDLE_TIP),
            ring: tip(HAND_RING_TIP),
            pinky: tip(HAND_PINKY_TIP),
        };
        match side {
            Side::Left => detection.left = tips,
            Side::Right => detection.right = tips,
        }
    }
    detection
}

/// Pinch state of one hand.
///
/// Distances are divided by `scale` (pixels per unit) before being
/// compared with the thresholds. The middle pinch only counts while the
/// index pinch holds.
pub fn pinch_state(tips: &FingerTips<DevicePx>, scale: f64, config: &DetectionConfig) -> PinchState {
    let Some(thumb) = tips.thumb else {
        return PinchState::default();
    };
    let scaled = |other: Option<DevicePosition>| other.map(|p| thumb.distance_to(&p) / scale);

    let index = scaled(tips.index).is_some_and(|d| d < config.index_pinch_threshold);
    let middle = index && scaled(tips.middle).is_some_and(|d| d < config.middle_pinch_threshold);
    PinchState { index, middle }
}

/// Pinch state of both hands.
pub fn pinch_states(
    tips: &FingertipDetection,
    scale: f64,
    config: &DetectionConfig,
) -> HandPair<PinchState> {
    HandPair {
        left: pinch_state(&tips.left, scale, config),
        right: pinch_state(&tips.right, scale, config),
    }
}
