//! Detector and video source interfaces.
//!
//! The landmark models are opaque. A [`DetectorProvider`] acquires a
//! video source and the two detector instances asynchronously; the
//! adapter owns them afterwards and releases them on teardown.

use handguide_common::error::HandguideResult;
use handguide_study_model::FrameSize;

use crate::landmarks::{HandLandmarks, Landmark};

/// Metadata of one video frame handed to the detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrame {
    /// Sequence number, starting at 0.
    pub index: u64,
    pub size: FrameSize,
    /// Capture time relative to the start of the stream (ms).
    pub timestamp_ms: u64,
}

/// Result of polling the video source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoPoll {
    Frame(VideoFrame),
    /// The stream has no decoded frame yet (zero dimensions).
    NotReady,
    /// The stream ended and will produce no more frames.
    Ended,
}

/// A live or recorded camera stream.
pub trait VideoSource: Send {
    /// Latest frame of the stream.
    fn poll_frame(&mut self) -> VideoPoll;

    /// Stop the stream's hardware tracks. Idempotent.
    fn stop_tracks(&mut self);
}

/// Body-pose detector producing the full pose landmark list.
pub trait PoseDetector: Send {
    fn detect(&mut self, frame: &VideoFrame) -> HandguideResult<Vec<Landmark>>;

    /// Release the model. Idempotent.
    fn close(&mut self);
}

/// Hand-landmark detector producing up to two hands.
pub trait HandDetector: Send {
    fn detect(&mut self, frame: &VideoFrame) -> HandguideResult<Vec<HandLandmarks>>;

    /// Release the model. Idempotent.
    fn close(&mut self);
}

/// Acquires the video source and detector instances.
#[async_trait::async_trait]
pub trait DetectorProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Open the camera stream (may fail on permission denial).
    async fn open_video(&self) -> HandguideResult<Box<dyn VideoSource>>;

    /// Load the pose model.
    async fn create_pose_detector(&self) -> HandguideResult<Box<dyn PoseDetector>>;

    /// Load the hand model.
    async fn create_hand_detector(&self) -> HandguideResult<Box<dyn HandDetector>>;
}
