use super::FrameSource;
use crate::errors::FocusError;
use crate::types::{CameraFrame, PixelFormat};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};
use serde::Serialize;

/// Camera as reported by the native backend
#[derive(Debug, Clone, Serialize)]
pub struct CameraDescriptor {
    pub index: String,
    pub name: String,
    pub description: String,
}

/// List cameras visible to the native capture backend
pub fn list_cameras() -> Result<Vec<CameraDescriptor>, FocusError> {
    let cameras = query(ApiBackend::Auto)
        .map_err(|e| FocusError::FrameSource(format!("Failed to query cameras: {}", e)))?;

    Ok(cameras
        .into_iter()
        .map(|info| CameraDescriptor {
            index: info.index().to_string(),
            name: info.human_name(),
            description: info.description().to_string(),
        })
        .collect())
}

/// Live frame source backed by nokhwa, decoding every frame to RGB8
pub struct NokhwaFrameSource {
    camera: CallbackCamera,
    device_id: String,
    sequence: u64,
}

impl NokhwaFrameSource {
    /// Open and start streaming from the camera at `index`.
    ///
    /// Failure here is fatal to the session: there is nothing to focus on.
    pub fn open(index: u32) -> Result<Self, FocusError> {
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);

        let mut camera = CallbackCamera::new(CameraIndex::Index(index), requested_format, |_| {})
            .map_err(|e| FocusError::FrameSource(format!("Failed to open camera {}: {}", index, e)))?;

        camera
            .open_stream()
            .map_err(|e| FocusError::FrameSource(format!("Failed to start stream: {}", e)))?;

        log::info!("Opened camera {} for autofocus preview", index);

        Ok(Self {
            camera,
            device_id: index.to_string(),
            sequence: 0,
        })
    }
}

impl FrameSource for NokhwaFrameSource {
    fn next_frame(&mut self) -> Result<CameraFrame, FocusError> {
        let buffer = self
            .camera
            .poll_frame()
            .map_err(|e| FocusError::FrameSource(format!("Failed to capture frame: {}", e)))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| FocusError::FrameSource(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        self.sequence += 1;

        Ok(CameraFrame::new(decoded.into_raw(), width, height, self.device_id.clone())
            .with_format(PixelFormat::Rgb8)
            .with_sequence(self.sequence))
    }
}

impl Drop for NokhwaFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::debug!("Failed to stop camera stream: {}", e);
        }
    }
}
