//! crabfocus: contrast-detection autofocus for tethered cameras
//!
//! The lens is driven to the point of maximum sharpness using nothing but
//! the video feed. There is no absolute lens position: the engine requests
//! relative focus steps, learns whether the lens accepted them, and scores
//! the frames that follow.
//!
//! # Components
//! - [`sharpness::SharpnessMeter`] reduces a frame to an edge-density score
//! - [`calibration::LensCalibrator`] finds the smallest step the lens honors
//! - [`controller::FocusController`] is the hill-climbing search
//! - [`session::FocusSession`] runs the capture, score and move loop
//!
//! # Usage
//! ```rust,ignore
//! use crabfocus::{AutofocusConfig, FocusSession, FlagInput};
//! use crabfocus::platform::{NokhwaFrameSource, V4l2FocusActuator};
//!
//! let config = AutofocusConfig::load_or_default();
//! let camera = NokhwaFrameSource::open(config.camera.device_index)?;
//! let lens = V4l2FocusActuator::open(&config.camera.actuator_path)?;
//!
//! let mut session = FocusSession::new(config, camera, lens)?;
//! session.calibrate()?;
//! let summary = session.run(&mut FlagInput::new())?;
//! ```
pub mod calibration;
pub mod config;
pub mod controller;
pub mod errors;
pub mod invariant_ppt;
pub mod platform;
pub mod session;
pub mod sharpness;
pub mod timing;
pub mod types;

#[cfg(feature = "recording")]
pub mod recording;

// Simulated rig - available for external tests
pub mod testing;

pub use calibration::{CalibrationConfig, CalibrationResult, LensCalibrator};
pub use config::AutofocusConfig;
pub use controller::{
    clamp_step, commanded_step, step_limit, ControllerConfig, Decision, FocusController, FocusSnapshot, FocusState,
    DEFAULT_FOCUS_STEP, DEFAULT_MIN_FOCUS_STEP, MAX_FOCUS_STEP,
};
pub use errors::{FocusError, FocusResult};
pub use platform::{FrameRecorder, FrameSource, LensActuator};
pub use session::{
    FlagInput, FocusSession, IterationReport, MeasureSample, NoInput, OperatorCommand,
    OperatorInput, RunSummary, ScriptedInput, SessionMode, StopReason,
};
pub use sharpness::{SharpnessConfig, SharpnessMeter};
pub use types::{CameraFrame, Direction, PixelFormat};

/// Initialize logging; `RUST_LOG` overrides the default `crabfocus=info`
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabfocus=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        assert_eq!(NAME, "crabfocus");
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
