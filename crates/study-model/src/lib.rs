//! HandGuide Study Model
//!
//! Defines the core data contracts for hand-guidance studies:
//! - **Geometry:** Positions tagged with the coordinate space they live in
//! - **Calibration:** Display and world pixels-per-inch factors
//! - **Tasks:** MOVE/HOLD task definitions and the JSON task file format
//! - **Detections:** Wrist, fingertip, and pinch results from the detector
//! - **Samples:** Rows of the engaged-frame data log
//! - **Links:** Study deep-link encoding and decoding
//!
//! Coordinates never cross spaces implicitly: a `Position<Mm>` and a
//! `Position<DevicePx>` are different types, and only the mapper in
//! `handguide-processing-core` converts between them.

pub mod calibration;
pub mod detection;
pub mod geometry;
pub mod link;
pub mod sample;
pub mod task;

pub use calibration::*;
pub use detection::*;
pub use geometry::*;
pub use link::*;
pub use sample::*;
pub use task::*;
