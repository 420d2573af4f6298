//! HandGuide Landmark Detection
//!
//! Wraps an opaque hand/pose landmark detector and turns its raw output
//! into device-pixel detections, one frame per tick:
//!
//! - **Detectors:** Traits for the video source and the two detector
//!   instances, plus an async provider that acquires them
//! - **Landmarks:** Wrist selection, fingertip extraction, pinch state
//! - **Adapter:** Tick-driven loop with soft stop and guaranteed teardown
//! - **Replay:** JSONL landmark recordings standing in for a live detector
//! - **Ticks:** Frame tick sources (real-time interval or scripted)

pub mod adapter;
pub mod detector;
pub mod landmarks;
pub mod replay;
pub mod ticks;

pub use adapter::{AdapterStats, DetectorSet, LandmarkAdapter, TickOutcome};
pub use detector::{
    DetectorProvider, HandDetector, PoseDetector, VideoFrame, VideoPoll, VideoSource,
};
pub use landmarks::{HandLandmarks, Landmark};
pub use replay::{ReplayFrame, ReplayProvider};
pub use ticks::{FrameTicker, ScriptedTicks, TickSource};
