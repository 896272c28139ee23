//! Configuration management for crabfocus
//!
//! One TOML file holds every tunable of a focus session: which camera and
//! lens drive to open, how the lens is calibrated, the search policy, the
//! sharpness meter and the loop itself.

use crate::calibration::CalibrationConfig;
use crate::controller::{ControllerConfig, DEFAULT_MIN_FOCUS_STEP, MAX_FOCUS_STEP};
use crate::errors::FocusError;
use crate::sharpness::SharpnessConfig;
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofocusConfig {
    pub camera: CameraConfig,
    pub lens: LensConfig,
    pub calibration: CalibrationConfig,
    pub controller: ControllerConfig,
    pub sharpness: SharpnessConfig,
    pub session: SessionConfig,
}

/// Which devices to open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera index as listed by `crabfocus list-devices`
    pub device_index: u32,
    /// V4L2 node carrying the relative focus control
    pub actuator_path: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            actuator_path: "/dev/video0".to_string(),
        }
    }
}

/// Lens drive settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Minimum honored step used when calibration is skipped or finds nothing
    pub min_focus_step: u32,
    /// Measure the minimum step before focusing
    pub calibrate: bool,
    /// Travel end calibration runs against
    pub calibration_direction: Direction,
    /// Magnitude of an operator step in manual or auto mode
    pub manual_step: u32,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            min_focus_step: DEFAULT_MIN_FOCUS_STEP,
            calibrate: true,
            calibration_direction: Direction::Near,
            manual_step: 100,
        }
    }
}

/// Loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target duration of one iteration
    pub frame_interval_ms: u64,
    /// Consecutive trivial iterations before focus counts as locked
    pub break_limit: u32,
    /// Nudge step armed on lock, as a multiple of the minimum step
    pub nudge_factor: u32,
    /// Stop after this many iterations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,
    /// Iterations of a measure run
    pub measure_iterations: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 30,
            break_limit: 5,
            nudge_factor: 4,
            max_iterations: None,
            measure_iterations: 200,
        }
    }
}

impl AutofocusConfig {
    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, FocusError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| FocusError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AutofocusConfig = toml::from_str(&contents)
            .map_err(|e| FocusError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(FocusError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FocusError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FocusError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| FocusError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| FocusError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabfocus.toml")
    }

    /// Load from the default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.lens.min_focus_step == 0 || self.lens.min_focus_step as i64 > MAX_FOCUS_STEP {
            return Err(format!(
                "Minimum focus step must be between 1 and {}",
                MAX_FOCUS_STEP
            ));
        }
        if self.lens.manual_step == 0 || self.lens.manual_step as i64 > MAX_FOCUS_STEP {
            return Err(format!("Manual step must be between 1 and {}", MAX_FOCUS_STEP));
        }

        self.calibration.validate()?;
        self.controller.validate()?;
        self.sharpness.validate()?;

        if self.session.break_limit == 0 {
            return Err("Break limit must be at least 1".to_string());
        }
        if self.session.nudge_factor == 0 {
            return Err("Nudge factor must be at least 1".to_string());
        }
        if self.session.frame_interval_ms > 10_000 {
            return Err("Frame interval must be at most 10000 ms".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AutofocusConfig::default();
        assert_eq!(config.lens.min_focus_step, 16);
        assert_eq!(config.session.break_limit, 5);
        assert_eq!(config.session.frame_interval_ms, 30);
        assert!(config.lens.calibrate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = AutofocusConfig::default();
        bad.lens.min_focus_step = 0;
        assert!(bad.validate().is_err());

        let mut bad = AutofocusConfig::default();
        bad.controller.decay = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = AutofocusConfig::default();
        bad.session.break_limit = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_toml_format() {
        let config = AutofocusConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        for table in ["[camera]", "[lens]", "[calibration]", "[controller]", "[sharpness]", "[session]"] {
            assert!(toml_string.contains(table), "missing {table}");
        }
        assert!(toml_string.contains("calibration_direction = \"near\""));
        assert!(!toml_string.contains("max_iterations"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AutofocusConfig = toml::from_str(
            r#"
            [lens]
            min_focus_step = 40

            [controller]
            decay = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.lens.min_focus_step, 40);
        assert_eq!(config.lens.manual_step, 100);
        assert_eq!(config.controller.decay, 0.5);
        assert_eq!(config.controller.epsilon, 0.001);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = AutofocusConfig::load_from_file("nonexistent_crabfocus.toml");
        assert_eq!(result.unwrap(), AutofocusConfig::default());
    }
}
