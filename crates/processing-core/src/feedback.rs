//! Directional haptic feedback.

use handguide_common::FeedbackConfig;
use handguide_study_model::MmPosition;
use serde::{Deserialize, Serialize};

/// Map a signed offset (mm) to an intensity in `[-1, 1]`.
///
/// Zero inside the dead zone `|offset| <= min`, `sign(offset)` at or
/// beyond `max`, linear in between. Antisymmetric in `offset`.
pub fn directional_intensity(offset: f64, min: f64, max: f64) -> f64 {
    if !offset.is_finite() {
        return 0.0;
    }
    let magnitude = offset.abs();
    if magnitude <= min {
        return 0.0;
    }
    if magnitude >= max {
        return offset.signum();
    }
    offset.signum() * (magnitude - min) / (max - min)
}

/// Two-axis signed intensity, each axis in `[-1, 1]`.
///
/// Positive `vx` points right, positive `vy` points down (screen axes).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DirectionalFeedback {
    pub vx: f64,
    pub vy: f64,
}

impl DirectionalFeedback {
    pub const ZERO: Self = Self { vx: 0.0, vy: 0.0 };

    pub fn new(vx: f64, vy: f64) -> Self {
        Self {
            vx: vx.clamp(-1.0, 1.0),
            vy: vy.clamp(-1.0, 1.0),
        }
    }

    /// Feedback pulling `hand` toward `guide`.
    pub fn toward(hand: &MmPosition, guide: &MmPosition, config: &FeedbackConfig) -> Self {
        let (dx, dy) = hand.offset_to(guide);
        let (min, max) = (
            config.min_vibration_threshold_mm,
            config.max_vibration_threshold_mm,
        );
        Self::new(
            directional_intensity(dx, min, max),
            directional_intensity(dy, min, max),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dead_zone_and_saturation() {
        assert_eq!(directional_intensity(0.0, 5.0, 25.0), 0.0);
        assert_eq!(directional_intensity(5.0, 5.0, 25.0), 0.0);
        assert_eq!(directional_intensity(-5.0, 5.0, 25.0), 0.0);
        assert_eq!(directional_intensity(25.0, 5.0, 25.0), 1.0);
        assert_eq!(directional_intensity(-40.0, 5.0, 25.0), -1.0);
        assert!((directional_intensity(15.0, 5.0, 25.0) - 0.5).abs() < 1e-12);
        assert!((directional_intensity(-10.0, 5.0, 25.0) + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_toward_guide() {
        let config = FeedbackConfig::default();
        let hand = MmPosition::new(0.0, 0.0);
        let guide = MmPosition::new(-30.0, 15.0);
        let fb = DirectionalFeedback::toward(&hand, &guide, &config);
        assert_eq!(fb.vx, -1.0);
        assert!((fb.vy - 0.5).abs() < 1e-12);

        let fb = DirectionalFeedback::toward(&hand, &MmPosition::new(2.0, -3.0), &config);
        assert!(fb.is_zero());
    }

    proptest! {
        #[test]
        fn intensity_is_antisymmetric(o in -100.0f64..100.0, min in 0.0f64..20.0, span in 0.01f64..50.0) {
            let max = min + span;
            prop_assert_eq!(
                directional_intensity(-o, min, max),
                -directional_intensity(o, min, max)
            );
        }

        #[test]
        fn intensity_is_bounded_and_monotonic(
            a in 0.0f64..100.0,
            b in 0.0f64..100.0,
            min in 0.0f64..20.0,
            span in 0.01f64..50.0,
        ) {
            let max = min + span;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let i_lo = directional_intensity(lo, min, max);
            let i_hi = directional_intensity(hi, min, max);
            prop_assert!((0.0..=1.0).contains(&i_lo));
            prop_assert!(i_lo <= i_hi);
            if hi >= max {
                prop_assert_eq!(i_hi, 1.0);
            }
            prop_assert_eq!(directional_intensity(min, min, max), 0.0);
        }
    }
}
