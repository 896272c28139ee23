//! Collaborator seams of the autofocus loop
//!
//! The engine only ever talks to a camera, a lens and a recorder through
//! these traits. Hardware implementations live in the submodules and are
//! gated behind the `hardware` feature; simulated ones are in
//! [`crate::testing`].

use crate::errors::FocusError;
use crate::types::CameraFrame;

#[cfg(feature = "hardware")]
pub mod camera;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod linux;

#[cfg(feature = "hardware")]
pub use camera::{list_cameras, CameraDescriptor, NokhwaFrameSource};
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use linux::V4l2FocusActuator;

/// Source of live video frames
pub trait FrameSource {
    /// Block until the most recent frame is available
    fn next_frame(&mut self) -> Result<CameraFrame, FocusError>;
}

/// Relative lens focus drive
pub trait LensActuator {
    /// Request a signed focus displacement.
    ///
    /// Returns `Ok(false)` when the lens refuses the move (travel limit or an
    /// invalid request); the lens position is then assumed unchanged.
    /// `Err` is reserved for device failures.
    fn request_step(&mut self, delta: i64) -> Result<bool, FocusError>;

    /// Largest displacement the device takes in one request, if it has a limit.
    ///
    /// Callers keep every request within it; the engine otherwise assumes
    /// [`MAX_FOCUS_STEP`](crate::controller::MAX_FOCUS_STEP).
    fn max_step(&self) -> Option<u32> {
        None
    }
}

/// Sink receiving every captured frame verbatim
pub trait FrameRecorder {
    fn record(&mut self, frame: &CameraFrame) -> Result<(), FocusError>;

    /// Flush and close the output; called once when the session ends
    fn finish(&mut self) -> Result<(), FocusError> {
        Ok(())
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<CameraFrame, FocusError> {
        (**self).next_frame()
    }
}

impl<T: LensActuator + ?Sized> LensActuator for Box<T> {
    fn request_step(&mut self, delta: i64) -> Result<bool, FocusError> {
        (**self).request_step(delta)
    }

    fn max_step(&self) -> Option<u32> {
        (**self).max_step()
    }
}

impl<T: LensActuator + ?Sized> LensActuator for &mut T {
    fn request_step(&mut self, delta: i64) -> Result<bool, FocusError> {
        (**self).request_step(delta)
    }

    fn max_step(&self) -> Option<u32> {
        (**self).max_step()
    }
}
