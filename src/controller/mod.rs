//! Hill-climbing focus controller
//!
//! Turns a stream of sharpness scores into signed lens displacements. The
//! search has no notion of absolute position: it walks in one direction while
//! the score improves, reverses with a shrinking step when it stops
//! improving, and jumps back to the best position seen when it has wandered
//! past the peak.
//!
//! Every value returned by [`FocusController::correct_focus`] is a signed
//! displacement; callers never apply the direction themselves. Pass it
//! through [`commanded_step`] before handing it to the lens.

mod state;

pub use state::{Decision, FocusSnapshot, FocusState};

use crate::assert_invariant;
use crate::types::Direction;
use serde::{Deserialize, Serialize};

/// Largest displacement the controller will ever request in one move
pub const MAX_FOCUS_STEP: i64 = 32767;
/// Nominal step the search starts with and returns to when lost
pub const DEFAULT_FOCUS_STEP: f64 = 1024.0;
/// Minimum reliable step assumed when neither calibration nor the operator provide one
pub const DEFAULT_MIN_FOCUS_STEP: u32 = 16;

/// Tuning of the search policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Score difference treated as noise
    pub epsilon: f64,
    /// Step multiplier applied on every reversal
    pub decay: f64,
    /// Nominal step magnitude
    pub nominal_step: f64,
    /// Iterations without a reversal before a drop below the best score counts as overshoot
    pub overshoot_iterations: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            decay: 0.75,
            nominal_step: DEFAULT_FOCUS_STEP,
            overshoot_iterations: 3,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.epsilon > 0.0) {
            return Err("Epsilon must be positive".to_string());
        }
        if !(self.decay > 0.0 && self.decay < 1.0) {
            return Err("Decay must be between 0.0 and 1.0 (exclusive)".to_string());
        }
        if !(self.nominal_step >= 1.0) || self.nominal_step > MAX_FOCUS_STEP as f64 {
            return Err(format!(
                "Nominal step must be between 1 and {}",
                MAX_FOCUS_STEP
            ));
        }
        Ok(())
    }
}

/// Clamp a controller displacement to what may be sent to the lens.
///
/// The magnitude is raised to `min_focus_step` and capped at
/// [`MAX_FOCUS_STEP`]; a zero displacement takes `fallback` as its direction.
pub fn commanded_step(offset: i64, min_focus_step: u32, fallback: Direction) -> i64 {
    clamp_step(offset, min_focus_step, MAX_FOCUS_STEP, fallback)
}

/// [`commanded_step`] for a lens that takes at most `max_step` per request.
///
/// The cap wins over the minimum when the two conflict.
pub fn clamp_step(offset: i64, min_focus_step: u32, max_step: i64, fallback: Direction) -> i64 {
    let direction = Direction::of(offset).unwrap_or(fallback);
    let cap = max_step.clamp(1, MAX_FOCUS_STEP) as u64;
    let magnitude = offset
        .unsigned_abs()
        .max(min_focus_step as u64)
        .min(cap) as i64;
    direction.sign() * magnitude
}

/// Per-request cap for a lens advertising `max_step`
pub fn step_limit(max_step: Option<u32>) -> i64 {
    max_step.map_or(MAX_FOCUS_STEP, |max| (max as i64).clamp(1, MAX_FOCUS_STEP))
}

/// The autofocus state machine
#[derive(Debug, Clone)]
pub struct FocusController {
    config: ControllerConfig,
    state: FocusState,
    last_decision: Option<Decision>,
    /// Clamped displacement of the previous command, undone if it was refused
    last_command: i64,
    /// Largest displacement the lens takes per request
    max_step: i64,
}

impl FocusController {
    pub fn new(config: ControllerConfig, min_focus_step: u32) -> Self {
        let state = FocusState::new(config.nominal_step, min_focus_step);
        Self {
            config,
            state,
            last_decision: None,
            last_command: 0,
            max_step: MAX_FOCUS_STEP,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> &FocusState {
        &self.state
    }

    pub fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    pub fn direction(&self) -> Direction {
        self.state.direction
    }

    pub fn min_focus_step(&self) -> u32 {
        self.state.min_focus_step
    }

    /// Replace the state wholesale, keeping the minimum step and heading
    /// in `direction`.
    pub fn reset(&mut self, direction: Direction) {
        let min = self.state.min_focus_step;
        self.state = FocusState::new(self.config.nominal_step, min);
        self.state.direction = direction;
        self.last_decision = None;
        self.last_command = 0;
    }

    pub fn set_min_focus_step(&mut self, min_focus_step: u32) {
        self.state.min_focus_step = min_focus_step;
    }

    /// Cap commands at what the lens accepts in one request
    pub fn set_max_step(&mut self, max_step: Option<u32>) {
        self.max_step = step_limit(max_step);
    }

    pub fn max_step(&self) -> i64 {
        self.max_step
    }

    /// The displacement that will actually be sent for `offset`
    pub fn command_for(&self, offset: i64) -> i64 {
        clamp_step(
            offset,
            self.state.min_focus_step,
            self.max_step,
            self.state.direction,
        )
    }

    /// Account for a lens move made outside the controller (manual nudge)
    pub fn note_external_move(&mut self, delta: i64) {
        self.state.step_to_last_max += delta;
    }

    /// Feed one observation and get the next signed displacement.
    ///
    /// `last_move_succeeded` reports whether the lens accepted the previous
    /// command; `rate` is the sharpness of the frame taken after it.
    pub fn correct_focus(&mut self, last_move_succeeded: bool, rate: f64) -> i64 {
        let previous_max = self.state.rate_max;
        let previous_direction = self.state.direction;

        if !last_move_succeeded {
            // The lens never moved, so the previous displacement is void.
            self.state.step_to_last_max -= self.last_command;
        }

        let decision = if !last_move_succeeded {
            self.state.direction = self.state.direction.flip();
            self.state.last_direction_change = 0;
            Decision::MoveFailed
        } else if rate < self.config.epsilon {
            self.state.step = self.config.nominal_step;
            Decision::Lost
        } else if rate - self.state.rate < self.config.epsilon {
            self.state.direction = self.state.direction.flip();
            self.state.step *= self.config.decay;
            self.state.last_direction_change = 0;
            Decision::Reversed
        } else if self.state.rate_max > rate
            && self.state.last_direction_change >= self.config.overshoot_iterations
            && self.state.step_to_last_max != 0
        {
            return self.return_to_peak(rate, previous_direction);
        } else {
            Decision::Continue
        };

        self.state.step = self.state.step.min(MAX_FOCUS_STEP as f64);

        let offset = self.state.direction.sign() * self.state.step.round() as i64;
        let command = self.command_for(offset);

        self.state.last_direction_change += 1;
        self.state.rate = rate;
        self.state.step_to_last_max += command;
        if rate > self.state.rate_max {
            self.state.rate_max = rate;
            self.state.step_to_last_max = 0;
            assert_invariant!(
                self.state.step_to_last_max == 0,
                "Displacement to best position is zero when a new best is recorded",
                "controller"
            );
        }

        self.check_invariants(previous_max, previous_direction, decision);

        log::debug!(
            "{:?}: rate={:.5} max={:.5} dir={} step={:.1} to_max={}",
            decision,
            rate,
            self.state.rate_max,
            self.state.direction,
            self.state.step,
            self.state.step_to_last_max
        );

        self.last_decision = Some(decision);
        self.last_command = command;
        offset
    }

    fn return_to_peak(&mut self, rate: f64, previous_direction: Direction) -> i64 {
        let correction = (-self.state.step_to_last_max).clamp(-MAX_FOCUS_STEP, MAX_FOCUS_STEP);
        if let Some(direction) = Direction::of(correction) {
            self.state.direction = direction;
        }
        self.state.last_direction_change = 0;
        self.state.rate = rate;

        // Zero only when the whole correction fits in one command.
        let command = self.command_for(correction);
        self.state.step_to_last_max += command;

        log::debug!(
            "Overshoot: rate={:.5} below max={:.5}, returning {}",
            rate,
            self.state.rate_max,
            correction
        );

        self.check_invariants(self.state.rate_max, previous_direction, Decision::Overshoot);
        self.last_decision = Some(Decision::Overshoot);
        self.last_command = command;
        correction
    }

    fn check_invariants(&self, previous_max: f64, previous_direction: Direction, decision: Decision) {
        assert_invariant!(
            self.state.rate_max >= previous_max,
            "Best score never decreases between resets",
            "controller"
        );
        assert_invariant!(
            self.state.direction == previous_direction || decision.may_reverse(),
            "Direction only changes on a failed move, a reversal or an overshoot",
            "controller"
        );
        assert_invariant!(
            self.state.step <= MAX_FOCUS_STEP as f64,
            "Step never exceeds the maximum focus step",
            "controller"
        );
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot::from_state(&self.state, self.last_decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> FocusController {
        FocusController::new(ControllerConfig::default(), 16)
    }

    #[test]
    fn test_first_improvement_continues_far() {
        let mut c = controller();
        let offset = c.correct_focus(true, 0.2);
        assert_eq!(offset, 1024);
        assert_eq!(c.last_decision(), Some(Decision::Continue));
        assert_eq!(c.state().rate_max, 0.2);
        assert_eq!(c.state().step_to_last_max, 0);
    }

    #[test]
    fn test_failed_move_flips_direction() {
        let mut c = controller();
        c.correct_focus(true, 0.2);
        c.correct_focus(true, 0.3);
        let offset = c.correct_focus(false, 0.35);
        assert_eq!(c.last_decision(), Some(Decision::MoveFailed));
        assert!(offset < 0);
        assert_eq!(c.direction(), Direction::Near);
        assert_eq!(c.state().last_direction_change, 1);
    }

    #[test]
    fn test_failed_move_voids_its_displacement() {
        let mut c = controller();
        c.correct_focus(true, 0.5); // new max, moves +1024
        c.correct_focus(true, 0.49); // reversal, moves -768
        assert_eq!(c.state().step_to_last_max, -768);
        // -768 refused: the lens is still where the previous frame was taken
        c.correct_focus(false, 0.3);
        // only the new command (+768 after the flip) is outstanding
        assert_eq!(c.state().step_to_last_max, 768);
    }

    #[test]
    fn test_lost_resets_step_and_keeps_direction() {
        let mut c = controller();
        c.correct_focus(true, 0.2);
        c.correct_focus(true, 0.1); // reversal, step 768
        assert_eq!(c.direction(), Direction::Near);
        let offset = c.correct_focus(true, 0.0005);
        assert_eq!(c.last_decision(), Some(Decision::Lost));
        assert_eq!(c.direction(), Direction::Near);
        assert_eq!(offset, -1024);
    }

    #[test]
    fn test_reversal_decays_step() {
        let mut c = controller();
        c.correct_focus(true, 0.2);
        let offset = c.correct_focus(true, 0.2);
        assert_eq!(c.last_decision(), Some(Decision::Reversed));
        assert_eq!(offset, -768);
        assert!((c.state().step - 768.0).abs() < 1e-9);
    }

    #[test]
    fn test_commanded_step_clamps_magnitude() {
        assert_eq!(commanded_step(3, 16, Direction::Near), 16);
        assert_eq!(commanded_step(-3, 16, Direction::Far), -16);
        assert_eq!(commanded_step(0, 16, Direction::Near), -16);
        assert_eq!(commanded_step(500, 16, Direction::Near), 500);
        assert_eq!(commanded_step(-100_000, 16, Direction::Far), -MAX_FOCUS_STEP);
    }

    #[test]
    fn test_clamp_step_honors_lens_limit() {
        assert_eq!(clamp_step(1024, 16, 255, Direction::Near), 255);
        assert_eq!(clamp_step(-1024, 16, 255, Direction::Far), -255);
        // the lens limit wins over the minimum
        assert_eq!(clamp_step(-5, 300, 255, Direction::Far), -255);
        assert_eq!(step_limit(None), MAX_FOCUS_STEP);
        assert_eq!(step_limit(Some(0)), 1);
        assert_eq!(step_limit(Some(100_000)), MAX_FOCUS_STEP);
    }

    #[test]
    fn test_partial_return_keeps_remaining_distance() {
        let mut c = controller();
        c.set_max_step(Some(500));
        for rate in [0.2, 0.5, 0.1, 0.2, 0.3] {
            c.correct_focus(true, rate);
        }
        // three capped moves of -500 since the best score
        assert_eq!(c.state().step_to_last_max, -1500);

        let offset = c.correct_focus(true, 0.35);
        assert_eq!(c.last_decision(), Some(Decision::Overshoot));
        assert_eq!(offset, 1500);
        assert_eq!(c.command_for(offset), 500);
        assert_eq!(c.direction(), Direction::Far);
        assert_eq!(c.state().step_to_last_max, -1000);
    }

    #[test]
    fn test_reset_keeps_max_step() {
        let mut c = controller();
        c.set_max_step(Some(200));
        c.reset(Direction::Near);
        assert_eq!(c.max_step(), 200);
        assert_eq!(c.command_for(-1024), -200);
    }

    #[test]
    fn test_reset_keeps_min_step_and_direction() {
        let mut c = controller();
        c.correct_focus(true, 0.4);
        c.correct_focus(true, 0.1);
        c.reset(Direction::Near);
        assert_eq!(c.state().rate_max, 0.0);
        assert_eq!(c.state().min_focus_step, 16);
        assert_eq!(c.direction(), Direction::Near);
        assert_eq!(c.last_decision(), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(ControllerConfig::default().validate().is_ok());
        let bad = ControllerConfig {
            decay: 1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = ControllerConfig {
            epsilon: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
