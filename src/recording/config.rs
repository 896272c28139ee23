//! Recording configuration types

use serde::{Deserialize, Serialize};

/// Encoder and container settings. Frame dimensions are taken from the first
/// recorded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Nominal frame rate written to the container
    pub fps: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Put the moov atom before mdat
    pub fast_start: bool,
    /// Optional title metadata
    pub title: Option<String>,
}

impl RecordingConfig {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            ..Self::default()
        }
    }

    /// Frame rate matching a loop paced at `interval_ms`
    pub fn for_interval_ms(interval_ms: u64) -> Self {
        let fps = if interval_ms == 0 {
            30.0
        } else {
            (1000.0 / interval_ms as f64).clamp(1.0, 120.0)
        };
        Self::new(fps)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.fps > 0.0) {
            return Err("Recording fps must be positive".to_string());
        }
        if self.bitrate == 0 {
            return Err("Recording bitrate must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            bitrate: 5_000_000,
            fast_start: true,
            title: None,
        }
    }
}

/// Statistics returned after finishing a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingStats {
    pub video_frames: u64,
    pub duration_secs: f64,
    pub bytes_written: u64,
    /// Frames the encoder produced no data for
    pub dropped_frames: u64,
    pub output_path: String,
}

impl RecordingStats {
    /// Average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}
