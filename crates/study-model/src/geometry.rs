//! Space-tagged 2D positions.
//!
//! Three coordinate spaces flow through a study:
//! - [`CameraPx`]: pixels of the raw camera frame, top-left origin.
//! - [`DevicePx`]: device-independent display pixels, origin at the
//!   center of the testbed rectangle.
//! - [`Mm`]: physical millimeters on the testbed, same origin as [`DevicePx`].

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Marker trait for a coordinate space.
pub trait Space: Copy + Default + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Short name used in logs.
    const NAME: &'static str;
}

/// Camera frame pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraPx;

/// Device-independent display pixels, centered on the testbed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevicePx;

/// Physical millimeters, centered on the testbed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mm;

impl Space for CameraPx {
    const NAME: &'static str = "camera_px";
}

impl Space for DevicePx {
    const NAME: &'static str = "device_px";
}

impl Space for Mm {
    const NAME: &'static str = "mm";
}

/// A point in coordinate space `S`.
///
/// Serializes as a plain `{ "x": .., "y": .. }` object; the space is
/// fixed by the type of the field that holds it.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Position<S: Space> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

pub type CameraPosition = Position<CameraPx>;
pub type DevicePosition = Position<DevicePx>;
pub type MmPosition = Position<Mm>;

impl<S: Space> Position<S> {
    pub const ORIGIN: Self = Self {
        x: 0.0,
        y: 0.0,
        space: PhantomData,
    };

    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    /// Euclidean distance to another point in the same space.
    pub fn distance_to(&self, other: &Position<S>) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Signed offset `(other - self)`.
    pub fn offset_to(&self, other: &Position<S>) -> (f64, f64) {
        (other.x - self.x, other.y - self.y)
    }

    /// Midpoint between two points.
    pub fn midpoint(a: &Position<S>, b: &Position<S>) -> Position<S> {
        Position::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
    }

    /// Scale both coordinates into another space.
    ///
    /// Only the mapper should call this; it is the single place where
    /// a conversion factor is applied.
    pub fn scaled_into<T: Space>(&self, factor: f64) -> Position<T> {
        Position::new(self.x * factor, self.y * factor)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl<S: Space> Default for Position<S> {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl<S: Space> fmt::Debug for Position<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})[{}]", self.x, self.y, S::NAME)
    }
}

/// Pixel dimensions of a rectangle (camera frame or display area).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: f64,
    pub height: f64,
}

impl FrameSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A frame with a zero (or negative) dimension has no pixels yet.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = MmPosition::new(0.0, 0.0);
        let b = MmPosition::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
        assert!((b.distance_to(&a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_offset_is_signed() {
        let a = DevicePosition::new(10.0, -2.0);
        let b = DevicePosition::new(4.0, 1.0);
        assert_eq!(a.offset_to(&b), (-6.0, 3.0));
    }

    #[test]
    fn test_position_serializes_without_space_tag() {
        let p = MmPosition::new(12.5, -3.0);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"x":12.5,"y":-3.0}"#);
        let back: MmPosition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_debug_names_space() {
        let p = DevicePosition::new(1.0, 2.0);
        assert!(format!("{p:?}").contains("device_px"));
    }

    #[test]
    fn test_empty_frame() {
        assert!(FrameSize::new(0.0, 480.0).is_empty());
        assert!(!FrameSize::new(640.0, 480.0).is_empty());
    }
}
