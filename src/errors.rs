use thiserror::Error;

/// Errors raised by the autofocus engine and its collaborators.
///
/// A lens refusing a step is *not* an error: actuators report it as
/// `Ok(false)` and the controller treats it as a regular input.
#[derive(Debug, Error)]
pub enum FocusError {
    #[error("Frame source error: {0}")]
    FrameSource(String),
    #[error("Lens actuator error: {0}")]
    Actuator(String),
    #[error("Invalid frame: got {got} bytes, expected {expected} for {width}x{height}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
    #[error("Calibration error: {0}")]
    Calibration(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Recording error: {0}")]
    Recording(String),
    #[error("Operator input error: {0}")]
    Input(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FocusResult<T> = Result<T, FocusError>;
