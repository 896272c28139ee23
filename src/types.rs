use crate::errors::FocusError;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Pixel layout of a [`CameraFrame`] buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel
    Rgb8,
    /// 8-bit luminance, 1 byte per pixel
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Gray8 => "GRAY8",
        }
    }
}

/// One captured video frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl CameraFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            sequence: 0,
            width,
            height,
            format: PixelFormat::Rgb8,
            timestamp: Utc::now(),
            device_id,
            data,
        }
    }

    pub fn from_rgb_image(image: RgbImage, device_id: String) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, device_id)
    }

    pub fn from_gray_image(image: GrayImage, device_id: String) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, device_id).with_format(PixelFormat::Gray8)
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    fn check_len(&self) -> Result<(), FocusError> {
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(FocusError::InvalidFrame {
                width: self.width,
                height: self.height,
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Single-channel luminance view of the frame
    pub fn to_luma(&self) -> Result<GrayImage, FocusError> {
        self.check_len()?;
        let luma = match self.format {
            PixelFormat::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.clone()),
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8()),
        };
        luma.ok_or(FocusError::InvalidFrame {
            width: self.width,
            height: self.height,
            expected: self.expected_len(),
            got: self.data.len(),
        })
    }

    /// Packed RGB8 bytes, expanding grayscale frames
    pub fn rgb_bytes(&self) -> Result<Cow<'_, [u8]>, FocusError> {
        self.check_len()?;
        Ok(match self.format {
            PixelFormat::Rgb8 => Cow::Borrowed(&self.data),
            PixelFormat::Gray8 => Cow::Owned(self.data.iter().flat_map(|&v| [v, v, v]).collect()),
        })
    }
}

/// Direction of lens travel. The sign convention matches actuator deltas:
/// negative moves toward the near end, positive toward far/infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Near,
    Far,
}

impl Direction {
    pub fn sign(self) -> i64 {
        match self {
            Direction::Near => -1,
            Direction::Far => 1,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Direction::Near => Direction::Far,
            Direction::Far => Direction::Near,
        }
    }

    /// Direction of a signed displacement, `None` for zero
    pub fn of(delta: i64) -> Option<Self> {
        match delta.signum() {
            -1 => Some(Direction::Near),
            1 => Some(Direction::Far),
            _ => None,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "near" | "in" => Ok(Direction::Near),
            "far" | "out" | "infinity" => Ok(Direction::Far),
            _ => Err(FocusError::Config(format!("unknown direction: {s}"))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Near => write!(f, "near"),
            Direction::Far => write!(f, "far"),
        }
    }
}
