//! Lens models with mechanical travel limits

use crate::errors::FocusError;
use crate::platform::LensActuator;
use std::cell::RefCell;
use std::rc::Rc;

/// Actuator with a bounded travel range that ignores steps below a threshold.
///
/// Moves past an end stop are clamped to it; a move that cannot change the
/// position at all is refused.
#[derive(Debug, Clone)]
pub struct ThresholdActuator {
    position: i64,
    travel: i64,
    threshold: u64,
    /// Requests larger than this are refused outright
    max_step: Option<u32>,
    requests: Vec<(i64, bool)>,
}

impl ThresholdActuator {
    /// Lens with travel `0..=travel`, parked in the middle
    pub fn new(threshold: u64, travel: i64) -> Self {
        Self {
            position: travel / 2,
            travel,
            threshold: threshold.max(1),
            max_step: None,
            requests: Vec::new(),
        }
    }

    /// A lens that never honors any step
    pub fn refusing() -> Self {
        Self::new(u64::MAX, 100_000)
    }

    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position.clamp(0, self.travel);
        self
    }

    /// Refuse any request above `max_step`, like a driver with a narrow control range
    pub fn with_max_step(mut self, max_step: u32) -> Self {
        self.max_step = Some(max_step);
        self
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn travel(&self) -> i64 {
        self.travel
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Every request seen so far with its outcome
    pub fn requests(&self) -> &[(i64, bool)] {
        &self.requests
    }

    fn apply(&mut self, delta: i64) -> bool {
        if delta.unsigned_abs() < self.threshold {
            return false;
        }
        if self.max_step.is_some_and(|max| delta.unsigned_abs() > max as u64) {
            return false;
        }
        let target = self.position.saturating_add(delta).clamp(0, self.travel);
        if target == self.position {
            return false;
        }
        self.position = target;
        true
    }
}

impl LensActuator for ThresholdActuator {
    fn request_step(&mut self, delta: i64) -> Result<bool, FocusError> {
        let accepted = self.apply(delta);
        self.requests.push((delta, accepted));
        Ok(accepted)
    }

    fn max_step(&self) -> Option<u32> {
        self.max_step
    }
}

/// Shared optical state of the simulated rig
#[derive(Debug, Clone)]
pub struct LensModel {
    pub actuator: ThresholdActuator,
    /// Position at which the chart is perfectly sharp
    pub focus_position: i64,
    /// Actuator units per pixel of blur sigma
    pub units_per_sigma: f64,
    /// Blur never exceeds this sigma
    pub max_sigma: f32,
}

impl LensModel {
    pub fn new(actuator: ThresholdActuator, focus_position: i64) -> Self {
        Self {
            actuator,
            focus_position,
            units_per_sigma: 1000.0,
            max_sigma: 10.0,
        }
    }

    pub fn defocus(&self) -> i64 {
        (self.actuator.position() - self.focus_position).abs()
    }

    /// Gaussian sigma the camera applies at the current position
    pub fn blur_sigma(&self) -> f32 {
        ((self.defocus() as f64 / self.units_per_sigma) as f32).min(self.max_sigma)
    }
}

/// Lens half of the simulated rig
#[derive(Debug, Clone)]
pub struct SimulatedLens {
    model: Rc<RefCell<LensModel>>,
}

impl SimulatedLens {
    pub fn new(model: LensModel) -> Self {
        Self {
            model: Rc::new(RefCell::new(model)),
        }
    }

    pub(crate) fn shared(&self) -> Rc<RefCell<LensModel>> {
        Rc::clone(&self.model)
    }

    pub fn position(&self) -> i64 {
        self.model.borrow().actuator.position()
    }

    pub fn defocus(&self) -> i64 {
        self.model.borrow().defocus()
    }

    pub fn requests(&self) -> Vec<(i64, bool)> {
        self.model.borrow().actuator.requests().to_vec()
    }
}

impl LensActuator for SimulatedLens {
    fn request_step(&mut self, delta: i64) -> Result<bool, FocusError> {
        self.model.borrow_mut().actuator.request_step(delta)
    }

    fn max_step(&self) -> Option<u32> {
        self.model.borrow().actuator.max_step()
    }
}
