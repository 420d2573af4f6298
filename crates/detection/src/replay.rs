//! Replay detector backend.
//!
//! Plays back a JSONL landmark recording in place of a live camera and
//! detector. Each non-empty line that does not start with `#` is one
//! frame:
//!
//! ```json
//! {"t": 16, "video": {"width": 640, "height": 480},
//!  "pose": [{"x": 0.5, "y": 0.5, "visibility": 0.9}, ...],
//!  "hands": [{"handedness": "Left", "landmarks": [{"x": 0.4, "y": 0.6}, ...]}]}
//! ```
//!
//! A frame may carry `"error": "..."` to make detection fail for that
//! frame. The provider tracks open handles so tests can assert teardown.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use handguide_common::error::{HandguideError, HandguideResult};
use handguide_study_model::FrameSize;
use serde::{Deserialize, Serialize};

use crate::detector::{
    DetectorProvider, HandDetector, PoseDetector, VideoFrame, VideoPoll, VideoSource,
};
use crate::landmarks::{HandLandmarks, Landmark};

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Capture time (ms).
    #[serde(default)]
    pub t: u64,
    pub video: FrameSize,
    #[serde(default)]
    pub pose: Vec<Landmark>,
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parse a JSONL recording. Blank lines and `#` comments are skipped.
pub fn parse_replay(jsonl: &str) -> HandguideResult<Vec<ReplayFrame>> {
    jsonl
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                HandguideError::detection(format!("Replay line {}: {e}", i + 1))
            })
        })
        .collect()
}

/// Serialize frames as JSONL.
pub fn write_replay(frames: &[ReplayFrame]) -> HandguideResult<String> {
    let mut out = String::new();
    for frame in frames {
        out.push_str(&serde_json::to_string(frame)?);
        out.push('\n');
    }
    Ok(out)
}

/// Provider serving a recording.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    name: String,
    frames: Arc<[ReplayFrame]>,
    open_handles: Arc<AtomicUsize>,
}

impl ReplayProvider {
    pub fn new(name: impl Into<String>, frames: Vec<ReplayFrame>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_jsonl(name: impl Into<String>, jsonl: &str) -> HandguideResult<Self> {
        Ok(Self::new(name, parse_replay(jsonl)?))
    }

    pub fn from_path(path: &Path) -> HandguideResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| HandguideError::from_io_at(e, path))?;
        let provider = Self::from_jsonl(path.display().to_string(), &content)?;
        tracing::info!(path = %path.display(), frames = provider.frames.len(), "Loaded replay");
        Ok(provider)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Video sources and detectors acquired and not yet released.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    fn handle(&self) -> Handle {
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Handle {
            counter: Some(self.open_handles.clone()),
        }
    }
}

/// Counts as open until released.
#[derive(Debug)]
struct Handle {
    counter: Option<Arc<AtomicUsize>>,
}

impl Handle {
    fn release(&mut self) {
        if let Some(counter) = self.counter.take() {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.counter.is_some()
    }
}

struct ReplayVideo {
    frames: Arc<[ReplayFrame]>,
    next: usize,
    handle: Handle,
}

impl VideoSource for ReplayVideo {
    fn poll_frame(&mut self) -> VideoPoll {
        if !self.handle.is_open() {
            return VideoPoll::Ended;
        }
        let Some(frame) = self.frames.get(self.next) else {
            return VideoPoll::Ended;
        };
        let index = self.next as u64;
        self.next += 1;
        if frame.video.is_empty() {
            return VideoPoll::NotReady;
        }
        VideoPoll::Frame(VideoFrame {
            index,
            size: frame.video,
            timestamp_ms: frame.t,
        })
    }

    fn stop_tracks(&mut self) {
        self.handle.release();
    }
}

struct ReplayPose {
    frames: Arc<[ReplayFrame]>,
    handle: Handle,
}

fn recorded<'a>(
    frames: &'a [ReplayFrame],
    handle: &Handle,
    frame: &VideoFrame,
) -> HandguideResult<&'a ReplayFrame> {
    if !handle.is_open() {
        return Err(HandguideError::detection("detector is closed"));
    }
    let recorded = frames
        .get(frame.index as usize)
        .ok_or_else(|| HandguideError::detection(format!("no recorded frame {}", frame.index)))?;
    match &recorded.error {
        Some(message) => Err(HandguideError::detection(message.clone())),
        None => Ok(recorded),
    }
}

impl PoseDetector for ReplayPose {
    fn detect(&mut self, frame: &VideoFrame) -> HandguideResult<Vec<Landmark>> {
        Ok(recorded(&self.frames, &self.handle, frame)?.pose.clone())
    }

    fn close(&mut self) {
        self.handle.release();
    }
}

struct ReplayHands {
    frames: Arc<[ReplayFrame]>,
    handle: Handle,
}

impl HandDetector for ReplayHands {
    fn detect(&mut self, frame: &VideoFrame) -> HandguideResult<Vec<HandLandmarks>> {
        Ok(recorded(&self.frames, &self.handle, frame)?.hands.clone())
    }

    fn close(&mut self) {
        self.handle.release();
    }
}

#[async_trait::async_trait]
impl DetectorProvider for ReplayProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open_video(&self) -> HandguideResult<Box<dyn VideoSource>> {
        Ok(Box::new(ReplayVideo {
            frames: self.frames.clone(),
            next: 0,
            handle: self.handle(),
        }))
    }

    async fn create_pose_detector(&self) -> HandguideResult<Box<dyn PoseDetector>> {
        Ok(Box::new(ReplayPose {
            frames: self.frames.clone(),
            handle: self.handle(),
        }))
    }

    async fn create_hand_detector(&self) -> HandguideResult<Box<dyn HandDetector>> {
        Ok(Box::new(ReplayHands {
            frames: self.frames.clone(),
            handle: self.handle(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDING: &str = r#"# recorded at 60 fps
{"t": 0, "video": {"width": 0, "height": 0}}
{"t": 16, "video": {"width": 640, "height": 480}, "pose": [{"x": 0.5, "y": 0.5, "visibility": 0.9}]}

{"t": 33, "video": {"width": 640, "height": 480}, "error": "inference timeout"}
"#;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let frames = parse_replay(RECORDING).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].video.is_empty());
        assert_eq!(frames[1].pose.len(), 1);
        assert_eq!(frames[2].error.as_deref(), Some("inference timeout"));
    }

    #[test]
    fn test_parse_reports_line() {
        let err = parse_replay("{\"t\": 0, \"video\": {\"width\": 1, \"height\": 1}}\n{oops").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_write_then_parse() {
        let frames = parse_replay(RECORDING).unwrap();
        let again = parse_replay(&write_replay(&frames).unwrap()).unwrap();
        assert_eq!(again, frames);
    }

    #[tokio::test]
    async fn test_handles_are_counted() {
        let provider = ReplayProvider::from_jsonl("test", RECORDING).unwrap();
        let mut video = provider.open_video().await.unwrap();
        let mut pose = provider.create_pose_detector().await.unwrap();
        assert_eq!(provider.open_handles(), 2);

        assert_eq!(video.poll_frame(), VideoPoll::NotReady);
        let VideoPoll::Frame(frame) = video.poll_frame() else {
            panic!("expected frame");
        };
        assert_eq!(pose.detect(&frame).unwrap().len(), 1);
        let VideoPoll::Frame(frame) = video.poll_frame() else {
            panic!("expected frame");
        };
        assert!(pose.detect(&frame).is_err());
        assert_eq!(video.poll_frame(), VideoPoll::Ended);

        video.stop_tracks();
        video.stop_tracks();
        pose.close();
        assert_eq!(provider.open_handles(), 0);
    }
}
