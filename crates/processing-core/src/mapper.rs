//! Coordinate Mapper.
//!
//! Pure conversions between the three coordinate spaces. This is the only
//! module that changes the space tag of a [`Position`].
//!
//! - Camera pixels map to device pixels with "cover" fit: the video is
//!   scaled by the larger axis ratio so it fills the testbed rectangle
//!   with no letterboxing, then re-centered on the rectangle's center.
//! - Device pixels map to millimeters with the world PPI.
//! - The testbed rectangle itself is sized from the display PPI.

use handguide_common::TestbedConfig;
use handguide_study_model::{
    CalibrationFactors, CameraPosition, DevicePosition, FrameSize, MmPosition, Position, Space,
};

pub const MM_PER_INCH: f64 = 25.4;

/// Scale and offsets of a cover fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverFit {
    /// Uniform scale applied to the source.
    pub scale: f64,
    /// Size of the scaled source. Never smaller than the destination.
    pub scaled: FrameSize,
    /// Top-left of the scaled source relative to the destination's
    /// top-left. Non-positive on both axes.
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Compute the cover fit of `source` into `dest`.
///
/// Returns `None` when either rectangle is empty.
pub fn cover_fit(source: FrameSize, dest: FrameSize) -> Option<CoverFit> {
    if source.is_empty() || dest.is_empty() {
        return None;
    }
    let scale = (dest.width / source.width).max(dest.height / source.height);
    let scaled = FrameSize::new(source.width * scale, source.height * scale);
    Some(CoverFit {
        scale,
        scaled,
        offset_x: (dest.width - scaled.width) / 2.0,
        offset_y: (dest.height - scaled.height) / 2.0,
    })
}

/// Map a camera pixel into device pixels centered on the display.
pub fn video_to_display(
    point: CameraPosition,
    video: FrameSize,
    display: FrameSize,
) -> Option<DevicePosition> {
    let fit = cover_fit(video, display)?;
    Some(DevicePosition::new(
        point.x * fit.scale + fit.offset_x - display.width / 2.0,
        point.y * fit.scale + fit.offset_y - display.height / 2.0,
    ))
}

/// Millimeters to pixels at `ppi`.
pub fn mm_to_px(mm: f64, ppi: f64) -> f64 {
    mm / MM_PER_INCH * ppi
}

/// Pixels to millimeters at `ppi`.
pub fn px_to_mm(px: f64, ppi: f64) -> f64 {
    px * MM_PER_INCH / ppi
}

/// Project `p` onto segment `a`-`b`, clamped to its endpoints.
///
/// A degenerate segment projects everything onto `a`.
pub fn closest_point_on_segment<S: Space>(
    p: &Position<S>,
    a: &Position<S>,
    b: &Position<S>,
) -> Position<S> {
    let (abx, aby) = a.offset_to(b);
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f64::EPSILON {
        return *a;
    }
    let (apx, apy) = a.offset_to(p);
    let t = ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0);
    Position::new(a.x + t * abx, a.y + t * aby)
}

/// Size of the testbed rectangle in device-independent pixels.
pub fn testbed_size_px(testbed: &TestbedConfig, factors: &CalibrationFactors) -> FrameSize {
    let css_ppi = factors.css_ppi();
    FrameSize::new(
        mm_to_px(testbed.width_mm, css_ppi),
        mm_to_px(testbed.height_mm, css_ppi),
    )
}

/// Conversions bound to one calibration snapshot.
///
/// Rebuild it whenever the config store publishes new factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    factors: CalibrationFactors,
    display: FrameSize,
}

impl CoordinateMapper {
    pub fn new(factors: CalibrationFactors, testbed: &TestbedConfig) -> Self {
        Self {
            factors,
            display: testbed_size_px(testbed, &factors),
        }
    }

    pub fn factors(&self) -> &CalibrationFactors {
        &self.factors
    }

    /// Testbed rectangle in device pixels.
    pub fn display(&self) -> FrameSize {
        self.display
    }

    /// Camera pixel to testbed-centered device pixel.
    pub fn camera_to_device(&self, point: CameraPosition, video: FrameSize) -> Option<DevicePosition> {
        video_to_display(point, video, self.display)
    }

    /// Normalized landmark (`[0,1]` of the frame) to device pixel.
    pub fn normalized_to_device(&self, nx: f64, ny: f64, video: FrameSize) -> Option<DevicePosition> {
        self.camera_to_device(
            CameraPosition::new(nx * video.width, ny * video.height),
            video,
        )
    }

    /// Device pixel to millimeters, using the world PPI.
    pub fn device_to_mm(&self, point: &DevicePosition) -> MmPosition {
        point.scaled_into(MM_PER_INCH / self.factors.world_ppi)
    }

    /// Millimeters to device pixels, using the world PPI.
    pub fn mm_to_device(&self, point: &MmPosition) -> DevicePosition {
        point.scaled_into(self.px_per_mm())
    }

    /// Pixels per millimeter at the world PPI.
    pub fn px_per_mm(&self) -> f64 {
        self.factors.world_ppi / MM_PER_INCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cover_fit_wide_video() {
        // 16:9 video into a 4:3 rect: height ratio wins.
        let fit = cover_fit(FrameSize::new(1280.0, 720.0), FrameSize::new(400.0, 300.0)).unwrap();
        assert!((fit.scale - 300.0 / 720.0).abs() < 1e-12);
        assert!((fit.scaled.height - 300.0).abs() < 1e-9);
        assert!(fit.scaled.width > 400.0);
        assert!(fit.offset_x < 0.0);
        assert!(fit.offset_y.abs() < 1e-9);
    }

    #[test]
    fn test_video_center_maps_to_origin() {
        let video = FrameSize::new(640.0, 480.0);
        let display = FrameSize::new(600.0, 375.0);
        let p = video_to_display(CameraPosition::new(320.0, 240.0), video, display).unwrap();
        assert!(p.x.abs() < 1e-9 && p.y.abs() < 1e-9);

        let corner = video_to_display(CameraPosition::new(0.0, 0.0), video, display).unwrap();
        assert!(corner.x <= -300.0 + 1e-9);
        assert!(corner.y <= -187.5 + 1e-9);
    }

    #[test]
    fn test_empty_frame_is_not_mapped() {
        assert!(video_to_display(
            CameraPosition::new(1.0, 1.0),
            FrameSize::new(0.0, 0.0),
            FrameSize::new(10.0, 10.0)
        )
        .is_none());
    }

    #[test]
    fn test_mm_px_inverse() {
        assert!((mm_to_px(25.4, 96.0) - 96.0).abs() < 1e-12);
        assert!((px_to_mm(mm_to_px(37.0, 78.0), 78.0) - 37.0).abs() < 1e-9);
    }

    #[test]
    fn test_closest_point_clamps() {
        let a = MmPosition::new(0.0, 0.0);
        let b = MmPosition::new(10.0, 0.0);
        let mid = closest_point_on_segment(&MmPosition::new(4.0, 7.0), &a, &b);
        assert_eq!(mid, MmPosition::new(4.0, 0.0));
        let before = closest_point_on_segment(&MmPosition::new(-5.0, 2.0), &a, &b);
        assert_eq!(before, a);
        let after = closest_point_on_segment(&MmPosition::new(15.0, -2.0), &a, &b);
        assert_eq!(after, b);
        let degenerate = closest_point_on_segment(&MmPosition::new(3.0, 3.0), &a, &a);
        assert_eq!(degenerate, a);
    }

    #[test]
    fn test_testbed_size_uses_css_ppi() {
        let factors = CalibrationFactors {
            device_ppi: 254.0,
            device_pixel_ratio: 2.0,
            world_ppi: 24.0,
        };
        let size = testbed_size_px(&TestbedConfig::default(), &factors);
        assert!((size.width - 800.0).abs() < 1e-9);
        assert!((size.height - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_mapper_mm_roundtrip() {
        let mapper = CoordinateMapper::new(CalibrationFactors::default(), &TestbedConfig::default());
        let mm = MmPosition::new(12.0, -8.0);
        let back = mapper.device_to_mm(&mapper.mm_to_device(&mm));
        assert!(back.distance_to(&mm) < 1e-9);
    }

    proptest! {
        #[test]
        fn cover_fit_never_letterboxes(
            vw in 1.0f64..4000.0,
            vh in 1.0f64..4000.0,
            dw in 1.0f64..4000.0,
            dh in 1.0f64..4000.0,
        ) {
            let fit = cover_fit(FrameSize::new(vw, vh), FrameSize::new(dw, dh)).unwrap();
            let tol = 1e-9 * dw.max(dh);
            prop_assert!(fit.scaled.width >= dw - tol);
            prop_assert!(fit.scaled.height >= dh - tol);
            let tight_w = (fit.scaled.width - dw).abs() <= tol;
            let tight_h = (fit.scaled.height - dh).abs() <= tol;
            prop_assert!(tight_w || tight_h);
        }

        #[test]
        fn segment_projection_stays_on_segment(
            px in -500.0f64..500.0, py in -500.0f64..500.0,
            ax in -500.0f64..500.0, ay in -500.0f64..500.0,
            bx in -500.0f64..500.0, by in -500.0f64..500.0,
        ) {
            let a = MmPosition::new(ax, ay);
            let b = MmPosition::new(bx, by);
            let q = closest_point_on_segment(&MmPosition::new(px, py), &a, &b);
            let on = (a.distance_to(&q) + q.distance_to(&b) - a.distance_to(&b)).abs();
            prop_assert!(on < 1e-6);
        }
    }
}
