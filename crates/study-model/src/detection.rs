//! Per-frame detection results emitted by the landmark adapter.

use serde::{Deserialize, Serialize};

use crate::geometry::{DevicePosition, Position, Space};
use crate::task::Hand;

/// Fingertip positions of one hand. Any tip may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct FingerTips<S: Space> {
    pub thumb: Option<Position<S>>,
    pub index: Option<Position<S>>,
    pub middle: Option<Position<S>>,
    pub ring: Option<Position<S>>,
    pub pinky: Option<Position<S>>,
}

impl<S: Space> Default for FingerTips<S> {
    fn default() -> Self {
        Self {
            thumb: None,
            index: None,
            middle: None,
            ring: None,
            pinky: None,
        }
    }
}

impl<S: Space> FingerTips<S> {
    /// True when no fingertip was detected.
    pub fn is_empty(&self) -> bool {
        self.thumb.is_none()
            && self.index.is_none()
            && self.middle.is_none()
            && self.ring.is_none()
            && self.pinky.is_none()
    }
}

/// A left/right pair of optional values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandPair<T> {
    pub left: T,
    pub right: T,
}

impl<T> HandPair<T> {
    /// The slot of `hand`.
    pub fn get(&self, hand: Hand) -> &T {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }
}

/// Wrist positions in device pixels. `None` when the joint was not
/// visible enough to trust.
pub type WristDetection = HandPair<Option<DevicePosition>>;

/// Fingertip positions in device pixels for both hands.
pub type FingertipDetection = HandPair<FingerTips<crate::geometry::DevicePx>>;

/// Pinch state of a single hand.
///
/// `middle` is only ever true while `index` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PinchState {
    pub index: bool,
    pub middle: bool,
}

impl PinchState {
    /// Both the primary and the confirming pinch are held.
    pub fn is_confirmed(&self) -> bool {
        self.index && self.middle
    }
}

/// Everything the adapter learned from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDetections {
    pub wrists: Option<WristDetection>,
    pub fingertips: Option<FingertipDetection>,
    pub pinches: HandPair<PinchState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fingertips() {
        let tips = FingerTips::<crate::geometry::DevicePx>::default();
        assert!(tips.is_empty());
        let tips = FingerTips {
            index: Some(DevicePosition::new(1.0, 1.0)),
            ..tips
        };
        assert!(!tips.is_empty());
    }

    #[test]
    fn test_hand_pair_slot() {
        let pair = HandPair { left: 1, right: 2 };
        assert_eq!(*pair.get(Hand::Left), 1);
        assert_eq!(*pair.get(Hand::Right), 2);
    }

    #[test]
    fn test_confirmed_pinch_needs_both() {
        assert!(!PinchState {
            index: true,
            middle: false
        }
        .is_confirmed());
        assert!(PinchState {
            index: true,
            middle: true
        }
        .is_confirmed());
    }
}
