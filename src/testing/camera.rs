//! Synthetic frames for the simulated rig

use super::lens::{LensModel, SimulatedLens};
use crate::errors::FocusError;
use crate::platform::{FrameRecorder, FrameSource};
use crate::types::CameraFrame;
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Block sizes layered into the test chart, in pixels
pub const CHART_SCALES: [u32; 4] = [2, 4, 8, 16];

const CHART_WIDTH: u32 = 128;
const CHART_HEIGHT: u32 = 96;

fn block_value(x: u32, y: u32, scale: u32) -> u32 {
    let mut n = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ scale.wrapping_mul(83_492_791);
    n = n.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    n ^= n >> 16;
    n = n.wrapping_mul(2_654_435_761);
    (n >> 8) & 0xff
}

/// Deterministic texture of random gray blocks at several scales.
///
/// Blur erases the small blocks first and the large ones last, so edge
/// density falls smoothly as defocus grows.
pub fn texture_chart() -> GrayImage {
    let raw: Vec<u32> = (0..CHART_HEIGHT)
        .flat_map(|y| (0..CHART_WIDTH).map(move |x| (x, y)))
        .map(|(x, y)| {
            CHART_SCALES
                .iter()
                .map(|&s| block_value(x / s, y / s, s))
                .sum::<u32>()
                / CHART_SCALES.len() as u32
        })
        .collect();

    let lo = raw.iter().copied().min().unwrap_or(0);
    let hi = raw.iter().copied().max().unwrap_or(0);
    let span = (hi - lo).max(1);
    let pixels = raw.iter().map(|v| ((v - lo) * 255 / span) as u8).collect();

    GrayImage::from_raw(CHART_WIDTH, CHART_HEIGHT, pixels)
        .unwrap_or_else(|| GrayImage::new(CHART_WIDTH, CHART_HEIGHT))
}

/// Camera half of the simulated rig: renders the chart blurred by defocus
pub struct SimulatedCamera {
    model: Rc<RefCell<LensModel>>,
    chart: GrayImage,
    sequence: u64,
}

impl SimulatedCamera {
    pub fn frame(&self) -> CameraFrame {
        let sigma = self.model.borrow().blur_sigma();
        let image = if sigma < 0.05 {
            self.chart.clone()
        } else {
            gaussian_blur_f32(&self.chart, sigma)
        };
        CameraFrame::from_gray_image(image, "simulated".to_string()).with_sequence(self.sequence)
    }
}

impl FrameSource for SimulatedCamera {
    fn next_frame(&mut self) -> Result<CameraFrame, FocusError> {
        let frame = self.frame();
        self.sequence += 1;
        Ok(frame)
    }
}

/// Build a camera and lens that share one optical model
pub fn simulated_rig(model: LensModel) -> (SimulatedCamera, SimulatedLens) {
    let lens = SimulatedLens::new(model);
    let camera = SimulatedCamera {
        model: lens.shared(),
        chart: texture_chart(),
        sequence: 0,
    };
    (camera, lens)
}

/// Frame source replaying a fixed list, then failing
#[derive(Debug, Default)]
pub struct ScriptedFrames {
    frames: VecDeque<CameraFrame>,
}

impl ScriptedFrames {
    pub fn new(frames: impl IntoIterator<Item = CameraFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` copies of one frame with increasing sequence numbers
    pub fn repeat(frame: CameraFrame, count: u64) -> Self {
        Self::new((0..count).map(|seq| frame.clone().with_sequence(seq)))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ScriptedFrames {
    fn next_frame(&mut self) -> Result<CameraFrame, FocusError> {
        self.frames
            .pop_front()
            .ok_or_else(|| FocusError::FrameSource("scripted frames exhausted".to_string()))
    }
}

/// Recorder that keeps frames in memory and can be told to fail
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    frames: Rc<RefCell<Vec<CameraFrame>>>,
    fail_after: Option<usize>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` frames, then fail every write
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    /// Shared view of the recorded frames, still valid after the recorder is moved
    pub fn frames(&self) -> Rc<RefCell<Vec<CameraFrame>>> {
        Rc::clone(&self.frames)
    }
}

impl FrameRecorder for MemoryRecorder {
    fn record(&mut self, frame: &CameraFrame) -> Result<(), FocusError> {
        let mut frames = self.frames.borrow_mut();
        if self.fail_after.is_some_and(|limit| frames.len() >= limit) {
            return Err(FocusError::Recording("disk full".to_string()));
        }
        frames.push(frame.clone());
        Ok(())
    }
}
