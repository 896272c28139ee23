//! Simulated hardware for offline testing
//!
//! A lens with end stops and a minimum honored step, and a camera whose
//! frames of a block texture blur in proportion to the lens's distance from best focus. Both
//! halves share one [`LensModel`], so moves made through the lens show up in
//! the next frame.

mod camera;
mod lens;

pub use camera::{
    simulated_rig, texture_chart, MemoryRecorder, ScriptedFrames, SimulatedCamera, CHART_SCALES,
};
pub use lens::{LensModel, SimulatedLens, ThresholdActuator};
