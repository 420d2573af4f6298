//! HandGuide Processing Core
//!
//! The real-time engine of a guidance study:
//! - **Mapper:** Camera pixels to device pixels to millimeters
//! - **Feedback:** Dead-zone/saturating directional intensity
//! - **Progression:** Target, repetition, trial, and task sequencing
//! - **Calibration:** Display PPI adjustment and dual-pinch world PPI
//!
//! This crate is pure computation: no I/O, no clocks. Every
//! time-dependent call takes the current session time in milliseconds.

pub mod calibration;
pub mod feedback;
pub mod mapper;
pub mod progression;

pub use calibration::{DisplayCalibration, WorldCalibration, WorldCalibrationStatus};
pub use feedback::{directional_intensity, DirectionalFeedback};
pub use mapper::CoordinateMapper;
pub use progression::{
    Advance, Cue, EngagedFrame, FrameOutcome, HoldToken, Milestone, ProgressPhase,
    TaskProgression, TaskRunState,
};
