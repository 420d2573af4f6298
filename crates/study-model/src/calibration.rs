//! Calibration factors shared by every coordinate conversion.

use serde::{Deserialize, Serialize};

use crate::task::TaskError;

/// Live-tunable scalars reconciling display pixels, camera pixels,
/// and physical millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationFactors {
    /// On-screen pixels per physical inch, as matched by the operator.
    #[serde(rename = "devicePPI")]
    pub device_ppi: f64,

    /// Physical pixels per device-independent pixel.
    pub device_pixel_ratio: f64,

    /// Pixels-per-inch equivalent for a hand at the reference distance
    /// from the camera.
    #[serde(rename = "worldPPI")]
    pub world_ppi: f64,
}

impl Default for CalibrationFactors {
    fn default() -> Self {
        Self {
            device_ppi: 109.0,
            device_pixel_ratio: 1.0,
            world_ppi: 24.0,
        }
    }
}

impl CalibrationFactors {
    /// All factors must be finite and strictly positive.
    pub fn validate(&self) -> Result<(), TaskError> {
        for (name, value) in [
            ("devicePPI", self.device_ppi),
            ("devicePixelRatio", self.device_pixel_ratio),
            ("worldPPI", self.world_ppi),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TaskError::Invalid {
                    field: name.to_string(),
                    reason: format!("must be strictly positive, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Device-independent pixels per inch (`devicePPI / devicePixelRatio`).
    pub fn css_ppi(&self) -> f64 {
        self.device_ppi / self.device_pixel_ratio
    }
}

/// Physical reference object shown during display calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalibrationTool {
    /// 100 mm ruler with millimeter and sixteenth-inch ticks.
    #[default]
    Ruler,
    /// ISO/IEC 7810 ID-1 card.
    Credit,
    /// US banknote.
    Dollar,
}
