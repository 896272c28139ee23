//! Lens travel calibration
//!
//! Focus drives silently ignore steps below some lens-dependent minimum.
//! Commanding such a step "succeeds" without moving anything, which would
//! stall the search, so the smallest honored step is measured up front by
//! binary search against the travel end.

use crate::controller::{step_limit, DEFAULT_FOCUS_STEP, MAX_FOCUS_STEP};
use crate::errors::FocusError;
use crate::platform::LensActuator;
use crate::types::Direction;
use serde::{Deserialize, Serialize};

/// Calibration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Upper bound of the search
    pub start_with: u32,
    /// Step used to move away from the travel end before each probe
    pub nominal_step: u32,
    /// Magnitude of each move while driving to a travel end
    pub drive_step: u32,
    /// Moves allowed before a drive to the end is declared runaway
    pub max_drive_moves: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            start_with: (MAX_FOCUS_STEP / 16) as u32,
            nominal_step: DEFAULT_FOCUS_STEP as u32,
            drive_step: MAX_FOCUS_STEP as u32,
            max_drive_moves: 256,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.start_with == 0 || self.start_with as i64 > MAX_FOCUS_STEP {
            return Err(format!("start_with must be between 1 and {}", MAX_FOCUS_STEP));
        }
        if self.drive_step == 0 || self.drive_step as i64 > MAX_FOCUS_STEP {
            return Err(format!("drive_step must be between 1 and {}", MAX_FOCUS_STEP));
        }
        if self.max_drive_moves == 0 {
            return Err("max_drive_moves must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Smallest honored step toward one travel end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub direction: Direction,
    /// 0 when no step was ever honored
    pub min_step: u32,
}

impl CalibrationResult {
    /// The measured minimum, or `default` when calibration found nothing
    pub fn effective_min_step(&self, default: u32) -> u32 {
        if self.min_step == 0 {
            default
        } else {
            self.min_step
        }
    }
}

/// Finds the minimum honored step and drives the lens to its travel ends
#[derive(Debug, Clone, Default)]
pub struct LensCalibrator {
    config: CalibrationConfig,
}

impl LensCalibrator {
    pub fn new(config: CalibrationConfig) -> Result<Self, FocusError> {
        config.validate().map_err(FocusError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Drive the lens until it refuses to go further in `direction`.
    ///
    /// Moves are capped at what the actuator takes per request. The move
    /// budget grows with the cap so the distance covered before giving up
    /// stays the same. Returns the number of accepted moves.
    pub fn drive_to_end<A: LensActuator + ?Sized>(
        &self,
        actuator: &mut A,
        direction: Direction,
    ) -> Result<u32, FocusError> {
        let step = (self.config.drive_step as i64).min(step_limit(actuator.max_step()));
        let budget = self.drive_budget(step);
        let delta = direction.sign() * step;

        for moves in 0..budget {
            if !actuator.request_step(delta)? {
                log::debug!("Reached {} travel end after {} moves", direction, moves);
                return Ok(moves);
            }
        }

        Err(FocusError::Calibration(format!(
            "lens still moving {} after {} moves of {}",
            direction, budget, step
        )))
    }

    fn drive_budget(&self, step: i64) -> u32 {
        let drive_step = self.config.drive_step as i64;
        let scale = (drive_step + step - 1) / step.max(1);
        self.config
            .max_drive_moves
            .saturating_mul(scale.clamp(1, u32::MAX as i64) as u32)
    }

    /// Measure the smallest step honored toward the `direction` end.
    ///
    /// Leaves the lens pinned at that end. Frame content is not stable while
    /// this runs.
    pub fn calibrate<A: LensActuator + ?Sized>(
        &self,
        actuator: &mut A,
        direction: Direction,
    ) -> Result<CalibrationResult, FocusError> {
        log::info!(
            "Calibrating minimum focus step toward {} end (search 0..={})",
            direction,
            self.config.start_with
        );

        self.drive_to_end(actuator, direction)?;

        let limit = step_limit(actuator.max_step()) as u32;
        let mut lo = 0u32;
        let mut hi = self.config.start_with.min(limit);
        let mut any_accepted = false;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.probe(actuator, direction, mid)? {
                any_accepted = true;
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        if !any_accepted && !self.probe(actuator, direction, lo)? {
            lo = 0;
        }

        self.drive_to_end(actuator, direction)?;

        if lo == 0 {
            log::warn!("Lens never honored a probe toward {} end", direction);
        } else {
            log::info!("Minimum focus step toward {} end: {}", direction, lo);
        }

        Ok(CalibrationResult {
            direction,
            min_step: lo,
        })
    }

    /// Make space away from the end, then try `magnitude` back toward it
    fn probe<A: LensActuator + ?Sized>(
        &self,
        actuator: &mut A,
        direction: Direction,
        magnitude: u32,
    ) -> Result<bool, FocusError> {
        // Backing off at least as far as the probe keeps the end from
        // refusing it for lack of travel.
        let limit = step_limit(actuator.max_step());
        let space = (self.config.nominal_step.max(magnitude) as i64).min(limit);
        actuator.request_step(-direction.sign() * space)?;

        let accepted = actuator.request_step(direction.sign() * magnitude as i64)?;
        log::trace!("Probe {} toward {}: accepted={}", magnitude, direction, accepted);
        Ok(accepted)
    }
}
