//! Application configuration and the live config store.
//!
//! [`ConfigStore`] is the single owner of the running configuration.
//! Components subscribe to it and read the latest snapshot every frame;
//! writers go through [`ConfigStore::update`], which validates before
//! publishing.

use std::path::{Path, PathBuf};

use handguide_study_model::{CalibrationFactors, CalibrationTool, TaskDefaults};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{HandguideError, HandguideResult};

/// Global application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display and world calibration factors.
    pub calibration: CalibrationFactors,

    /// Reference object used for display calibration.
    pub calibration_tool: CalibrationTool,

    /// Physical testbed rectangle.
    pub testbed: TestbedConfig,

    /// Haptic feedback thresholds.
    pub feedback: FeedbackConfig,

    /// Defaults for newly authored tasks.
    pub task_defaults: TaskDefaults,

    /// Landmark extraction thresholds.
    pub detection: DetectionConfig,

    /// Serial link settings.
    pub serial: SerialConfig,

    /// Task progression behavior.
    pub progression: ProgressionConfig,

    /// Directory where session bundles are written.
    pub data_dir: PathBuf,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Physical testbed dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestbedConfig {
    pub width_mm: f64,
    pub height_mm: f64,
    /// Diameter of a drawn marker dot.
    pub marker_diameter_mm: f64,
}

/// Dead zone and saturation of the directional feedback (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub min_vibration_threshold_mm: f64,
    pub max_vibration_threshold_mm: f64,
}

/// Landmark extraction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Wrists reported below this visibility are dropped.
    pub visibility_threshold: f64,

    /// Thumb-index distance (scaled) below which the index pinch holds.
    pub index_pinch_threshold: f64,

    /// Thumb-middle distance (scaled) below which the middle pinch holds.
    pub middle_pinch_threshold: f64,

    /// Pixels per pinch unit. `None` uses device-independent pixels per
    /// inch from the calibration factors.
    pub pinch_scale: Option<f64>,
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Last used port, if any.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Delimiter splitting inbound text lines.
    pub line_delimiter: String,
}

/// What happens to a scheduled HOLD completion when the hand leaves the
/// capture radius before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldExitPolicy {
    /// Leaving the radius cancels the pending completion and the dwell.
    #[default]
    CancelPending,
    /// The completion fires regardless once scheduled.
    KeepPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub hold_exit: HoldExitPolicy,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "handguide=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationFactors::default(),
            calibration_tool: CalibrationTool::default(),
            testbed: TestbedConfig::default(),
            feedback: FeedbackConfig::default(),
            task_defaults: TaskDefaults::default(),
            detection: DetectionConfig::default(),
            serial: SerialConfig::default(),
            progression: ProgressionConfig::default(),
            data_dir: default_data_dir(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TestbedConfig {
    fn default() -> Self {
        Self {
            width_mm: 160.0,
            height_mm: 100.0,
            marker_diameter_mm: 5.0,
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            min_vibration_threshold_mm: 5.0,
            max_vibration_threshold_mm: 25.0,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.8,
            index_pinch_threshold: 0.25,
            middle_pinch_threshold: 0.15,
            pinch_scale: None,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            line_delimiter: "\n".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
                    Ok(config) => match config.validate() {
                        Ok(()) => return config,
                        Err(e) => tracing::warn!("Ignoring invalid config at {:?}: {}", path, e),
                    },
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> HandguideResult<()> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> HandguideResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| HandguideError::from_io_at(e, path))
    }

    /// Reject configurations the mapper or feedback cannot work with.
    pub fn validate(&self) -> HandguideResult<()> {
        self.calibration
            .validate()
            .map_err(|e| HandguideError::config(e.to_string()))?;

        let fb = &self.feedback;
        if !(fb.min_vibration_threshold_mm >= 0.0
            && fb.min_vibration_threshold_mm < fb.max_vibration_threshold_mm)
        {
            return Err(HandguideError::config(format!(
                "vibration thresholds must satisfy 0 <= min < max, got {} / {}",
                fb.min_vibration_threshold_mm, fb.max_vibration_threshold_mm
            )));
        }

        if !(self.testbed.width_mm > 0.0 && self.testbed.height_mm > 0.0) {
            return Err(HandguideError::config("testbed dimensions must be positive"));
        }

        if let Some(scale) = self.detection.pinch_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(HandguideError::config("pinch_scale must be positive"));
            }
        }

        if self.serial.baud_rate == 0 {
            return Err(HandguideError::config("baud_rate must be non-zero"));
        }

        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("handguide").join("config.json")
}

/// Default session data directory.
fn default_data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("handguide").join("sessions")
}

/// Single owner of the live configuration.
///
/// Readers hold a [`watch::Receiver`] and see every accepted update.
#[derive(Debug)]
pub struct ConfigStore {
    tx: watch::Sender<AppConfig>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// An in-memory store that never touches disk.
    pub fn in_memory(config: AppConfig) -> Self {
        let (tx, _) = watch::channel(config);
        Self { tx, path: None }
    }

    /// A store backed by `path`. Missing or invalid files start from
    /// defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, _) = watch::channel(AppConfig::load_from(&path));
        Self {
            tx,
            path: Some(path),
        }
    }

    /// A store backed by the standard config location.
    pub fn open_default() -> Self {
        Self::open(config_file_path())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Clone of the current configuration.
    pub fn snapshot(&self) -> AppConfig {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.tx.subscribe()
    }

    /// Apply `edit` to a copy of the config, validate it, publish it, and
    /// persist it when file-backed. On error nothing changes.
    pub fn update<F>(&self, edit: F) -> HandguideResult<AppConfig>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut next = self.snapshot();
        edit(&mut next);
        next.validate()?;
        if let Some(path) = &self.path {
            next.save_to(path)?;
        }
        self.tx.send_replace(next.clone());
        tracing::debug!(persisted = self.path.is_some(), "Configuration updated");
        Ok(next)
    }

    /// Replace the whole configuration with defaults.
    pub fn reset(&self) -> HandguideResult<AppConfig> {
        self.update(|c| *c = AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.calibration.device_ppi, 109.0);
        assert_eq!(config.calibration.world_ppi, 24.0);
        assert_eq!(config.testbed.width_mm, 160.0);
        assert_eq!(config.testbed.marker_diameter_mm, 5.0);
        assert_eq!(config.feedback.max_vibration_threshold_mm, 25.0);
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.progression.hold_exit, HoldExitPolicy::CancelPending);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.feedback.min_vibration_threshold_mm = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"calibration":{"devicePPI":220,"devicePixelRatio":2,"worldPPI":78}}"#)
                .unwrap();
        assert_eq!(config.calibration.css_ppi(), 110.0);
        assert_eq!(config.testbed.height_mm, 100.0);
    }

    #[test]
    fn test_store_publishes_valid_updates() {
        let store = ConfigStore::in_memory(AppConfig::default());
        let mut rx = store.subscribe();

        store.update(|c| c.calibration.world_ppi = 78.0).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().calibration.world_ppi, 78.0);

        let err = store.update(|c| c.calibration.device_ppi = 0.0);
        assert!(err.is_err());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.snapshot().calibration.device_ppi, 109.0);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = std::env::temp_dir().join("handguide_test_config_store");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let store = ConfigStore::open(&path);
        assert_eq!(store.snapshot(), AppConfig::default());
        store.update(|c| c.calibration.device_ppi = 142.0).unwrap();

        let reopened = ConfigStore::open(&path);
        assert_eq!(reopened.snapshot().calibration.device_ppi, 142.0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
