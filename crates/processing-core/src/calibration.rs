//! Calibration procedures.
//!
//! Display calibration is operator-driven: the device PPI is nudged until
//! a reference object drawn on screen matches a physical one. World
//! calibration is gesture-driven: both hands hold the confirmed pinch on
//! the long edges of a letter sheet for a continuous interval.

use handguide_study_model::{
    CalibrationFactors, CalibrationTool, DevicePosition, DevicePx, FingerTips,
    FingertipDetection, FrameSize, HandPair, PinchState,
};
use serde::{Deserialize, Serialize};

use crate::mapper::{mm_to_px, MM_PER_INCH};

pub const MIN_DEVICE_PPI: f64 = 100.0;
pub const MAX_DEVICE_PPI: f64 = 300.0;
pub const DEVICE_PPI_STEP: f64 = 1.0;

pub const CREDIT_CARD_INCH: (f64, f64) = (3.37, 2.13);
pub const DOLLAR_BILL_INCH: (f64, f64) = (6.14, 2.61);
pub const RULER_LENGTH_MM: u32 = 100;

/// Long edge of a US letter sheet.
pub const LETTER_LONG_EDGE_INCH: f64 = 11.0;
/// Continuous confirmed-pinch time required by world calibration.
pub const WORLD_CALIBRATION_HOLD_MS: u64 = 5000;

/// Operator input during display calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayInput {
    Increase,
    Decrease,
    Set(f64),
    Tool(CalibrationTool),
    Confirm,
}

impl DisplayInput {
    /// Parse a line of operator input: `+`, `-`, a number, a tool name,
    /// or an empty line to confirm.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "" => Some(Self::Confirm),
            "+" => Some(Self::Increase),
            "-" => Some(Self::Decrease),
            _ => match line.to_ascii_uppercase().as_str() {
                "RULER" => Some(Self::Tool(CalibrationTool::Ruler)),
                "CREDIT" => Some(Self::Tool(CalibrationTool::Credit)),
                "DOLLAR" => Some(Self::Tool(CalibrationTool::Dollar)),
                _ => line.parse::<f64>().ok().map(Self::Set),
            },
        }
    }
}

/// Which edge of the ruler a tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RulerScale {
    Millimeter,
    SixteenthInch,
}

/// A single ruler tick, offset from the ruler's left end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulerTick {
    pub scale: RulerScale,
    pub offset_px: f64,
    /// Tick length in px; longer ticks mark coarser units.
    pub length_px: f64,
    pub label: Option<String>,
}

/// Human-in-the-loop display PPI adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCalibration {
    device_ppi: f64,
    device_pixel_ratio: f64,
    tool: CalibrationTool,
    confirmed: bool,
}

impl DisplayCalibration {
    pub fn new(factors: &CalibrationFactors, tool: CalibrationTool) -> Self {
        let stored = factors.device_ppi;
        let device_ppi = if stored.is_finite() {
            stored.clamp(MIN_DEVICE_PPI, MAX_DEVICE_PPI)
        } else {
            CalibrationFactors::default().device_ppi
        };
        if device_ppi != stored {
            tracing::warn!(
                stored,
                device_ppi,
                "Stored devicePPI outside {MIN_DEVICE_PPI}..={MAX_DEVICE_PPI}, adjusted"
            );
        }
        Self {
            device_ppi,
            device_pixel_ratio: factors.device_pixel_ratio,
            tool,
            confirmed: false,
        }
    }

    pub fn device_ppi(&self) -> f64 {
        self.device_ppi
    }

    pub fn tool(&self) -> CalibrationTool {
        self.tool
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Apply one operator input. Returns true once confirmed.
    pub fn apply(&mut self, input: DisplayInput) -> bool {
        match input {
            DisplayInput::Increase => self.set(self.device_ppi + DEVICE_PPI_STEP),
            DisplayInput::Decrease => self.set(self.device_ppi - DEVICE_PPI_STEP),
            DisplayInput::Set(value) => self.set(value),
            DisplayInput::Tool(tool) => self.tool = tool,
            DisplayInput::Confirm => {
                self.confirmed = true;
                tracing::info!(device_ppi = self.device_ppi, "Display calibration confirmed");
            }
        }
        self.confirmed
    }

    fn set(&mut self, value: f64) {
        if value.is_finite() {
            self.device_ppi = value.clamp(MIN_DEVICE_PPI, MAX_DEVICE_PPI);
        }
    }

    fn css_ppi(&self) -> f64 {
        self.device_ppi / self.device_pixel_ratio
    }

    /// Size of the current reference object in device-independent px.
    pub fn reference_size_px(&self) -> FrameSize {
        let (w, h) = match self.tool {
            CalibrationTool::Credit => CREDIT_CARD_INCH,
            CalibrationTool::Dollar => DOLLAR_BILL_INCH,
            CalibrationTool::Ruler => (RULER_LENGTH_MM as f64 / MM_PER_INCH, 0.0),
        };
        FrameSize::new(w * self.css_ppi(), h * self.css_ppi())
    }

    /// Ticks of the 100 mm ruler: millimeters on one edge, sixteenths of
    /// an inch on the other.
    pub fn ruler_ticks(&self) -> Vec<RulerTick> {
        let css_ppi = self.css_ppi();
        let mut ticks = Vec::new();

        for i in 0..=RULER_LENGTH_MM {
            let length_px = if i % 10 == 0 {
                12.0
            } else if i % 5 == 0 {
                9.0
            } else {
                6.0
            };
            ticks.push(RulerTick {
                scale: RulerScale::Millimeter,
                offset_px: mm_to_px(i as f64, css_ppi),
                length_px,
                label: (i % 20 == 0).then(|| format!("{i}mm")),
            });
        }

        let sixteenths = (RULER_LENGTH_MM as f64 / MM_PER_INCH * 16.0).round() as u32;
        for n in 0..=sixteenths {
            let length_px = match n {
                n if n % 16 == 0 => 12.0,
                n if n % 8 == 0 => 10.0,
                n if n % 4 == 0 => 8.0,
                n if n % 2 == 0 => 6.0,
                _ => 5.0,
            };
            ticks.push(RulerTick {
                scale: RulerScale::SixteenthInch,
                offset_px: n as f64 / 16.0 * css_ppi,
                length_px,
                label: (n % 16 == 0).then(|| format!("{}in", n / 16)),
            });
        }

        ticks
    }

    /// Calibration factors with the adjusted device PPI.
    pub fn factors(&self, base: &CalibrationFactors) -> CalibrationFactors {
        CalibrationFactors {
            device_ppi: self.device_ppi,
            ..*base
        }
    }
}

/// `round(distance * 100 / reference_inches) / 100`.
pub fn compute_world_ppi(distance_px: f64, reference_inches: f64) -> f64 {
    (distance_px * 100.0 / reference_inches).round() / 100.0
}

/// Progress of the dual-pinch world calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldCalibrationStatus {
    /// Not both hands confirmed.
    Waiting,
    /// Both hands confirmed for `elapsed_ms` so far.
    Holding { elapsed_ms: u64, progress: f64 },
    /// Finished; the result stays until [`WorldCalibration::reset`].
    Complete { world_ppi: f64, distance_px: f64 },
}

/// Dual-pinch world calibration with a debounce timer.
#[derive(Debug, Clone)]
pub struct WorldCalibration {
    hold_ms: u64,
    reference_inches: f64,
    started_at: Option<u64>,
    result: Option<(f64, f64)>,
}

impl Default for WorldCalibration {
    fn default() -> Self {
        Self::new(WORLD_CALIBRATION_HOLD_MS, LETTER_LONG_EDGE_INCH)
    }
}

impl WorldCalibration {
    pub fn new(hold_ms: u64, reference_inches: f64) -> Self {
        Self {
            hold_ms,
            reference_inches,
            started_at: None,
            result: None,
        }
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.result = None;
    }

    pub fn world_ppi(&self) -> Option<f64> {
        self.result.map(|(ppi, _)| ppi)
    }

    /// Feed one frame of pinch state and fingertips.
    pub fn update(
        &mut self,
        pinches: &HandPair<PinchState>,
        tips: &FingertipDetection,
        now_ms: u64,
    ) -> WorldCalibrationStatus {
        if let Some((world_ppi, distance_px)) = self.result {
            return WorldCalibrationStatus::Complete {
                world_ppi,
                distance_px,
            };
        }

        let points = match (pinch_point(&tips.left), pinch_point(&tips.right)) {
            (Some(l), Some(r)) if pinches.left.is_confirmed() && pinches.right.is_confirmed() => {
                Some((l, r))
            }
            _ => None,
        };

        let Some((left, right)) = points else {
            if self.started_at.take().is_some() {
                tracing::debug!("Dual pinch lost, world calibration timer reset");
            }
            return WorldCalibrationStatus::Waiting;
        };

        let started = *self.started_at.get_or_insert(now_ms);
        let elapsed_ms = now_ms.saturating_sub(started);
        if elapsed_ms < self.hold_ms {
            return WorldCalibrationStatus::Holding {
                elapsed_ms,
                progress: elapsed_ms as f64 / self.hold_ms as f64,
            };
        }

        let distance_px = left.distance_to(&right);
        let world_ppi = compute_world_ppi(distance_px, self.reference_inches);
        tracing::info!(distance_px, world_ppi, "World calibration complete");
        self.result = Some((world_ppi, distance_px));
        WorldCalibrationStatus::Complete {
            world_ppi,
            distance_px,
        }
    }
}

/// Midpoint of thumb and index tips.
fn pinch_point(tips: &FingerTips<DevicePx>) -> Option<DevicePosition> {
    Some(DevicePosition::midpoint(tips.thumb.as_ref()?, tips.index.as_ref()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed() -> HandPair<PinchState> {
        let p = PinchState {
            index: true,
            middle: true,
        };
        HandPair { left: p, right: p }
    }

    fn tips_apart(distance: f64) -> FingertipDetection {
        let hand = |x: f64| FingerTips {
            thumb: Some(DevicePosition::new(x, 0.0)),
            index: Some(DevicePosition::new(x, 0.0)),
            ..Default::default()
        };
        HandPair {
            left: hand(-distance / 2.0),
            right: hand(distance / 2.0),
        }
    }

    #[test]
    fn test_world_ppi_formula() {
        assert_eq!(compute_world_ppi(858.0, LETTER_LONG_EDGE_INCH), 78.0);
        assert_eq!(compute_world_ppi(100.0, 3.0), 33.33);
    }

    #[test]
    fn test_world_calibration_requires_continuous_hold() {
        let mut cal = WorldCalibration::default();
        let tips = tips_apart(858.0);
        let pinched = confirmed();

        assert!(matches!(
            cal.update(&pinched, &tips, 0),
            WorldCalibrationStatus::Holding { elapsed_ms: 0, .. }
        ));
        assert!(matches!(
            cal.update(&pinched, &tips, 4_000),
            WorldCalibrationStatus::Holding { .. }
        ));

        // Losing the gesture resets the timer.
        let mut released = pinched;
        released.right.middle = false;
        assert_eq!(
            cal.update(&released, &tips, 4_500),
            WorldCalibrationStatus::Waiting
        );
        assert!(matches!(
            cal.update(&pinched, &tips, 5_000),
            WorldCalibrationStatus::Holding { elapsed_ms: 0, .. }
        ));
        assert!(matches!(
            cal.update(&pinched, &tips, 9_999),
            WorldCalibrationStatus::Holding { .. }
        ));

        match cal.update(&pinched, &tips, 10_000) {
            WorldCalibrationStatus::Complete { world_ppi, .. } => assert_eq!(world_ppi, 78.0),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(cal.world_ppi(), Some(78.0));
    }

    #[test]
    fn test_display_steps_and_clamps() {
        let mut cal = DisplayCalibration::new(&CalibrationFactors::default(), CalibrationTool::Ruler);
        assert_eq!(cal.device_ppi(), 109.0);
        cal.apply(DisplayInput::Increase);
        cal.apply(DisplayInput::Increase);
        cal.apply(DisplayInput::Decrease);
        assert_eq!(cal.device_ppi(), 110.0);
        cal.apply(DisplayInput::Set(500.0));
        assert_eq!(cal.device_ppi(), MAX_DEVICE_PPI);
        cal.apply(DisplayInput::Set(12.0));
        assert_eq!(cal.device_ppi(), MIN_DEVICE_PPI);
        cal.apply(DisplayInput::Decrease);
        assert_eq!(cal.device_ppi(), MIN_DEVICE_PPI);
        assert!(cal.apply(DisplayInput::Confirm));
    }

    #[test]
    fn test_stored_ppi_out_of_range_is_adjusted() {
        let stored = |device_ppi: f64| CalibrationFactors {
            device_ppi,
            ..Default::default()
        };
        let cal = DisplayCalibration::new(&stored(400.0), CalibrationTool::Ruler);
        assert_eq!(cal.device_ppi(), MAX_DEVICE_PPI);
        let cal = DisplayCalibration::new(&stored(f64::NAN), CalibrationTool::Ruler);
        assert_eq!(cal.device_ppi(), 109.0);
        let cal = DisplayCalibration::new(&stored(150.0), CalibrationTool::Ruler);
        assert_eq!(cal.device_ppi(), 150.0);
    }

    #[test]
    fn test_reference_sizes() {
        let factors = CalibrationFactors {
            device_ppi: 200.0,
            device_pixel_ratio: 2.0,
            world_ppi: 24.0,
        };
        let mut cal = DisplayCalibration::new(&factors, CalibrationTool::Credit);
        let card = cal.reference_size_px();
        assert!((card.width - 337.0).abs() < 1e-9);
        assert!((card.height - 213.0).abs() < 1e-9);

        cal.apply(DisplayInput::Tool(CalibrationTool::Ruler));
        let ruler = cal.reference_size_px();
        assert!((ruler.width - 100.0 / 25.4 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_ruler_ticks() {
        let cal = DisplayCalibration::new(&CalibrationFactors::default(), CalibrationTool::Ruler);
        let ticks = cal.ruler_ticks();
        let mm: Vec<_> = ticks
            .iter()
            .filter(|t| t.scale == RulerScale::Millimeter)
            .collect();
        assert_eq!(mm.len(), 101);
        assert_eq!(mm[20].label.as_deref(), Some("20mm"));
        assert_eq!(mm[10].length_px, 12.0);
        assert_eq!(mm[5].length_px, 9.0);

        let inch: Vec<_> = ticks
            .iter()
            .filter(|t| t.scale == RulerScale::SixteenthInch)
            .collect();
        assert_eq!(inch.len(), 64);
        assert_eq!(inch[16].label.as_deref(), Some("1in"));
        assert!((inch[16].offset_px - 109.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_display_input() {
        assert_eq!(DisplayInput::parse(""), Some(DisplayInput::Confirm));
        assert_eq!(DisplayInput::parse(" + "), Some(DisplayInput::Increase));
        assert_eq!(DisplayInput::parse("142.5"), Some(DisplayInput::Set(142.5)));
        assert_eq!(
            DisplayInput::parse("dollar"),
            Some(DisplayInput::Tool(CalibrationTool::Dollar))
        );
        assert_eq!(DisplayInput::parse("abc"), None);
    }
}
