//! Session recording to MP4
//!
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing
//!
//! # Example
//! ```rust,ignore
//! use crabfocus::recording::{Mp4Recorder, RecordingConfig};
//!
//! let recorder = Mp4Recorder::new("focus.mp4", RecordingConfig::for_interval_ms(30))?;
//! session.set_recorder(Box::new(recorder));
//! ```

mod config;
mod encoder;
mod recorder;

pub use config::{RecordingConfig, RecordingStats};
pub use encoder::{EncodedFrame, H264Encoder};
pub use recorder::Mp4Recorder;
