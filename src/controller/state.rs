use crate::types::Direction;
use serde::{Deserialize, Serialize};

/// Search state owned by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusState {
    /// Magnitude of the next move in actuator units
    pub step: f64,
    pub direction: Direction,
    /// Smallest step the lens reliably honors
    pub min_focus_step: u32,
    /// Iterations since the direction last flipped
    pub last_direction_change: u32,
    /// Score of the previous iteration
    pub rate: f64,
    /// Best score since the last reset
    pub rate_max: f64,
    /// Commanded displacement accumulated since `rate_max` was reached
    pub step_to_last_max: i64,
}

impl FocusState {
    pub fn new(nominal_step: f64, min_focus_step: u32) -> Self {
        Self {
            step: nominal_step,
            direction: Direction::Far,
            min_focus_step,
            last_direction_change: 0,
            rate: 0.0,
            rate_max: 0.0,
            step_to_last_max: 0,
        }
    }
}

/// Which branch of the policy produced a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Lens refused the previous move; direction flipped
    MoveFailed,
    /// Score below the noise floor; step back to nominal
    Lost,
    /// No improvement; direction flipped and step decayed
    Reversed,
    /// Past the peak; returning to the best position
    Overshoot,
    /// Improving; keep going
    Continue,
}

impl Decision {
    pub fn may_reverse(self) -> bool {
        matches!(
            self,
            Decision::MoveFailed | Decision::Reversed | Decision::Overshoot
        )
    }
}

/// Copy of the controller state handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSnapshot {
    #[serde(flatten)]
    pub state: FocusState,
    pub decision: Option<Decision>,
}

impl FocusSnapshot {
    pub fn from_state(state: &FocusState, decision: Option<Decision>) -> Self {
        Self {
            state: state.clone(),
            decision,
        }
    }
}
