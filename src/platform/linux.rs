use super::LensActuator;
use crate::errors::FocusError;
use v4l::control::{Control, Value};
use v4l::prelude::*;

/// `V4L2_CID_FOCUS_RELATIVE` from `linux/v4l2-controls.h`
pub const V4L2_CID_FOCUS_RELATIVE: u32 = 0x009a_090b;

// errno values a driver uses to refuse a control write
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;
const ERANGE: i32 = 34;

/// Lens actuator driving the V4L2 relative focus control
pub struct V4l2FocusActuator {
    device: Device,
    path: String,
    minimum: i64,
    maximum: i64,
}

impl V4l2FocusActuator {
    /// Open `path` (e.g. `/dev/video0`) and look up its relative focus control
    pub fn open(path: &str) -> Result<Self, FocusError> {
        let device = Device::with_path(path)
            .map_err(|e| FocusError::Actuator(format!("Failed to open {}: {}", path, e)))?;

        let controls = device
            .query_controls()
            .map_err(|e| FocusError::Actuator(format!("Failed to query controls: {}", e)))?;

        let desc = controls
            .into_iter()
            .find(|desc| desc.id == V4L2_CID_FOCUS_RELATIVE)
            .ok_or_else(|| {
                FocusError::Actuator(format!("{} has no relative focus control", path))
            })?;

        log::info!(
            "Using '{}' on {} (range {}..={})",
            desc.name,
            path,
            desc.minimum,
            desc.maximum
        );

        Ok(Self {
            device,
            path: path.to_string(),
            minimum: desc.minimum,
            maximum: desc.maximum,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Largest single move the driver advertises in either direction
    pub fn symmetric_range(&self) -> u32 {
        self.maximum
            .min(self.minimum.saturating_neg())
            .clamp(0, u32::MAX as i64) as u32
    }
}

impl LensActuator for V4l2FocusActuator {
    fn request_step(&mut self, delta: i64) -> Result<bool, FocusError> {
        if delta < self.minimum || delta > self.maximum {
            log::debug!("Refusing out-of-range focus step {}", delta);
            return Ok(false);
        }

        let ctrl = Control {
            id: V4L2_CID_FOCUS_RELATIVE,
            value: Value::Integer(delta),
        };

        match self.device.set_control(ctrl) {
            Ok(()) => Ok(true),
            Err(e) if matches!(e.raw_os_error(), Some(EBUSY | EINVAL | ERANGE)) => {
                log::debug!("Lens refused focus step {}: {}", delta, e);
                Ok(false)
            }
            Err(e) => Err(FocusError::Actuator(format!(
                "Failed to drive focus on {}: {}",
                self.path, e
            ))),
        }
    }

    fn max_step(&self) -> Option<u32> {
        Some(self.symmetric_range())
    }
}
