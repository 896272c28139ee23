//! Frame sharpness scoring
//!
//! Reduces a frame to the density of edge pixels found by a Canny detector
//! after a light Gaussian blur. In-focus images carry denser, crisper edges,
//! so the score rises toward best focus. The absolute value depends on the
//! camera and the scene; only compare scores taken within one session.

use crate::errors::FocusError;
use crate::types::CameraFrame;
use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

/// Sharpness meter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpnessConfig {
    /// Gaussian blur sigma applied before edge detection
    pub blur_sigma: f32,
    /// Canny hysteresis low threshold
    pub canny_low: f32,
    /// Canny hysteresis high threshold
    pub canny_high: f32,
}

impl Default for SharpnessConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            canny_low: 0.0,
            canny_high: 30.0,
        }
    }
}

impl SharpnessConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.blur_sigma > 0.0) {
            return Err("Blur sigma must be positive".to_string());
        }
        if self.canny_low < 0.0 || self.canny_high < self.canny_low {
            return Err("Canny thresholds must satisfy 0 <= low <= high".to_string());
        }
        Ok(())
    }
}

/// Stateless edge-density sharpness meter
#[derive(Debug, Clone, Default)]
pub struct SharpnessMeter {
    config: SharpnessConfig,
}

impl SharpnessMeter {
    pub fn new(config: SharpnessConfig) -> Result<Self, FocusError> {
        config.validate().map_err(FocusError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SharpnessConfig {
        &self.config
    }

    /// Score a frame in `[0, 1]`
    pub fn score(&self, frame: &CameraFrame) -> Result<f64, FocusError> {
        let luma = frame.to_luma()?;
        Ok(self.score_luma(&luma))
    }

    /// Score an already-converted luminance image
    pub fn score_luma(&self, luma: &GrayImage) -> f64 {
        let (width, height) = luma.dimensions();
        if width < 3 || height < 3 {
            return 0.0;
        }

        let edges = self.edge_mask(luma);
        let edge_pixels = edges.pixels().filter(|p| p[0] != 0).count();
        edge_pixels as f64 / (width as f64 * height as f64)
    }

    /// Binary edge mask (255 = edge) of a luminance image
    pub fn edge_mask(&self, luma: &GrayImage) -> GrayImage {
        let blurred = gaussian_blur_f32(luma, self.config.blur_sigma);
        // Hysteresis tracing accepts magnitudes >= low, so the low threshold
        // has to stay above zero or suppressed pixels would seed edges.
        let low = self.config.canny_low.max(f32::MIN_POSITIVE);
        let high = self.config.canny_high.max(low);
        canny(&blurred, low, high)
    }
}
