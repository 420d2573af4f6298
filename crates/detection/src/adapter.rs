//! Landmark Detector Adapter.
//!
//! Owns the video source and detector instances, runs one detection per
//! tick, and publishes the latest [`FrameDetections`]. The loop never
//! stops on its own account: a missing detector, an unready frame, a
//! paused adapter, or a failing frame all yield an outcome and wait for
//! the next tick. Only the end of the video stream ends [`run`].
//!
//! [`run`]: LandmarkAdapter::run

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use handguide_common::error::{HandguideError, HandguideResult};
use handguide_common::{DetectionConfig, TestbedConfig};
use handguide_processing_core::CoordinateMapper;
use handguide_study_model::{CalibrationFactors, FrameDetections};
use tokio::sync::watch;

use crate::detector::{
    DetectorProvider, HandDetector, PoseDetector, VideoFrame, VideoPoll, VideoSource,
};
use crate::landmarks::{extract_fingertips, extract_wrists, pinch_states};
use crate::ticks::TickSource;

/// Which detector instances to acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorSet {
    pub pose: bool,
    pub hands: bool,
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self {
            pose: true,
            hands: true,
        }
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Initialization has not succeeded; nothing to do.
    NoDetector,
    /// Detection is paused.
    Inactive,
    /// The video has no frame with non-zero dimensions yet.
    NotReady,
    /// The video stream ended.
    Ended,
    Detected(FrameDetections),
}

/// Per-outcome tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    pub ticks: u64,
    pub detected: u64,
    pub not_ready: u64,
    pub inactive: u64,
    pub no_detector: u64,
    /// Frames where every detector failed.
    pub failures: u64,
    /// Detected frames where one of the two detectors failed.
    pub partial_failures: u64,
}

impl AdapterStats {
    fn record(&mut self, outcome: &HandguideResult<TickOutcome>) {
        self.ticks += 1;
        match outcome {
            Ok(TickOutcome::Detected(_)) => self.detected += 1,
            Ok(TickOutcome::NotReady) => self.not_ready += 1,
            Ok(TickOutcome::Inactive) => self.inactive += 1,
            Ok(TickOutcome::NoDetector) => self.no_detector += 1,
            Ok(TickOutcome::Ended) => {}
            Err(_) => self.failures += 1,
        }
    }
}

/// Adapter between an opaque detector and the study pipeline.
pub struct LandmarkAdapter {
    video: Option<Box<dyn VideoSource>>,
    pose: Option<Box<dyn PoseDetector>>,
    hands: Option<Box<dyn HandDetector>>,
    detectors: DetectorSet,
    active: Arc<AtomicBool>,
    mapper: CoordinateMapper,
    config: DetectionConfig,
    error: Option<String>,
    stats: AdapterStats,
    latest: watch::Sender<FrameDetections>,
}

impl LandmarkAdapter {
    pub fn new(
        detectors: DetectorSet,
        factors: CalibrationFactors,
        testbed: &TestbedConfig,
        config: DetectionConfig,
    ) -> Self {
        let (latest, _) = watch::channel(FrameDetections::default());
        Self {
            video: None,
            pose: None,
            hands: None,
            detectors,
            active: Arc::new(AtomicBool::new(true)),
            mapper: CoordinateMapper::new(factors, testbed),
            config,
            error: None,
            stats: AdapterStats::default(),
            latest,
        }
    }

    /// Acquire the video source and detectors.
    ///
    /// Any previously held resources are released first. On failure the
    /// partially acquired resources are released, the error is kept as
    /// the adapter's error state, and ticks report `NoDetector`.
    pub async fn initialize(&mut self, provider: &dyn DetectorProvider) -> HandguideResult<()> {
        self.teardown();
        self.error = None;
        tracing::info!(provider = provider.name(), "Initializing landmark detectors");

        match self.acquire(provider).await {
            Ok(()) => {
                tracing::info!(provider = provider.name(), "Landmark detectors ready");
                Ok(())
            }
            Err(e) => {
                tracing::error!(provider = provider.name(), error = %e, "Detector initialization failed");
                self.teardown();
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn acquire(&mut self, provider: &dyn DetectorProvider) -> HandguideResult<()> {
        if !self.detectors.pose && !self.detectors.hands {
            return Err(HandguideError::unsupported("no detector requested"));
        }
        self.video = Some(provider.open_video().await?);
        if self.detectors.pose {
            self.pose = Some(provider.create_pose_detector().await?);
        }
        if self.detectors.hands {
            self.hands = Some(provider.create_hand_detector().await?);
        }
        Ok(())
    }

    /// Release the video tracks and close both detectors. Idempotent.
    pub fn teardown(&mut self) {
        let mut released = false;
        if let Some(mut video) = self.video.take() {
            video.stop_tracks();
            released = true;
        }
        if let Some(mut pose) = self.pose.take() {
            pose.close();
            released = true;
        }
        if let Some(mut hands) = self.hands.take() {
            hands.close();
            released = true;
        }
        if released {
            tracing::debug!("Landmark detector resources released");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.video.is_some()
    }

    /// Error from the last failed initialization.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    /// Soft stop or resume. Models stay loaded.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Shared flag for pausing from another task.
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Latest published detections.
    pub fn subscribe(&self) -> watch::Receiver<FrameDetections> {
        self.latest.subscribe()
    }

    /// Rebuild the coordinate mapping after a calibration change.
    pub fn update_calibration(&mut self, factors: CalibrationFactors, testbed: &TestbedConfig) {
        self.mapper = CoordinateMapper::new(factors, testbed);
    }

    pub fn update_config(&mut self, config: DetectionConfig) {
        self.config = config;
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Run one detection step, record it, and publish any detections.
    ///
    /// Failures are logged and counted; the caller keeps ticking.
    pub fn tick(&mut self) -> HandguideResult<TickOutcome> {
        let outcome = self.step();
        self.stats.record(&outcome);
        match &outcome {
            Ok(TickOutcome::Detected(detections)) => {
                self.latest.send_replace(detections.clone());
            }
            Err(e) => {
                tracing::warn!(error = %e, failures = self.stats.failures, "Detection failed for frame");
            }
            Ok(_) => {}
        }
        outcome
    }

    fn step(&mut self) -> HandguideResult<TickOutcome> {
        let Some(video) = self.video.as_mut() else {
            return Ok(TickOutcome::NoDetector);
        };
        if !self.active.load(Ordering::Relaxed) {
            return Ok(TickOutcome::Inactive);
        }
        let frame = match video.poll_frame() {
            VideoPoll::Frame(frame) if !frame.size.is_empty() => frame,
            VideoPoll::Frame(_) | VideoPoll::NotReady => return Ok(TickOutcome::NotReady),
            VideoPoll::Ended => return Ok(TickOutcome::Ended),
        };
        self.detect(&frame).map(TickOutcome::Detected)
    }

    /// Run each detector on its own. A failing detector leaves only its
    /// own fields unset; the frame fails when no detector succeeded.
    fn detect(&mut self, frame: &VideoFrame) -> HandguideResult<FrameDetections> {
        let mut detections = FrameDetections::default();
        let mut attempted = 0;
        let mut failed = Vec::new();

        if let Some(pose) = self.pose.as_mut() {
            attempted += 1;
            match pose.detect(frame) {
                Ok(landmarks) => {
                    detections.wrists = Some(extract_wrists(
                        &landmarks,
                        frame.size,
                        &self.mapper,
                        self.config.visibility_threshold,
                    ));
                }
                Err(e) => {
                    tracing::debug!(frame = frame.index, error = %e, "Pose detection failed");
                    failed.push(e);
                }
            }
        }

        if let Some(hands) = self.hands.as_mut() {
            attempted += 1;
            match hands.detect(frame) {
                Ok(landmarks) => {
                    let tips = extract_fingertips(&landmarks, frame.size, &self.mapper);
                    let scale = self
                        .config
                        .pinch_scale
                        .unwrap_or_else(|| self.mapper.factors().css_ppi());
                    detections.pinches = pinch_states(&tips, scale, &self.config);
                    detections.fingertips = Some(tips);
                }
                Err(e) => {
                    tracing::debug!(frame = frame.index, error = %e, "Hand detection failed");
                    failed.push(e);
                }
            }
        }

        if failed.len() == attempted {
            if let Some(e) = failed.pop() {
                return Err(e);
            }
        } else if !failed.is_empty() {
            self.stats.partial_failures += 1;
        }
        Ok(detections)
    }

    /// Tick until the source is exhausted or the video ends.
    pub async fn run<T: TickSource + ?Sized>(&mut self, ticks: &mut T) -> AdapterStats {
        while ticks.next_tick().await.is_some() {
            if let Ok(TickOutcome::Ended) = self.tick() {
                tracing::info!("Video stream ended");
                break;
            }
        }
        self.stats
    }
}

impl Drop for LandmarkAdapter {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for LandmarkAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandmarkAdapter")
            .field("ready", &self.is_ready())
            .field("active", &self.is_active())
            .field("error", &self.error)
            .field("stats", &self.stats)
            .finish()
    }
}
