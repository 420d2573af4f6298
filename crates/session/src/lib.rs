//! HandGuide Study Session
//!
//! Ties detection, progression, haptics, and data logging together:
//!
//! - **Session:** Per-frame pipeline from detections to task progress
//! - **Data log:** Engaged-frame samples in mm, px, and IMU tables
//! - **Export:** CSV bundle written at the end of a study
//! - **Cues:** Audible milestone signals
//! - **Runner:** One loop driving the detector adapter and the session

pub mod cues;
pub mod datalog;
pub mod export;
pub mod runner;
pub mod session;

pub use cues::{CueSink, LogCueSink, SilentCueSink};
pub use datalog::{DataLog, FrameContext};
pub use export::{bundle_name, export_bundle, ExportBundle};
pub use handguide_detection::{FrameTicker, ScriptedTicks, TickSource};
pub use runner::{run_study, RunEnd, RunSummary};
pub use session::StudySession;
