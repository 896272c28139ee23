use serde::{Deserialize, Serialize};
use std::fmt;

/// What the loop does with each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// The controller drives the lens
    Auto,
    /// Autofocus switched off by the operator; frames are still scored
    Manual,
    /// Autofocus concluded no further improvement is possible
    Locked,
}

impl SessionMode {
    pub fn is_auto(self) -> bool {
        self == SessionMode::Auto
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::Auto => "auto",
            SessionMode::Manual => "manual",
            SessionMode::Locked => "locked",
        };
        f.write_str(name)
    }
}

/// Counts consecutive iterations that went nowhere.
///
/// An iteration is trivial when its command was refused or the controller
/// asked for less than the minimum step. `break_limit` trivial iterations in
/// a row declare focus locked.
#[derive(Debug, Clone)]
pub struct LockDetector {
    break_limit: u32,
    remaining: u32,
}

impl LockDetector {
    pub fn new(break_limit: u32) -> Self {
        let break_limit = break_limit.max(1);
        Self {
            break_limit,
            remaining: break_limit,
        }
    }

    pub fn break_limit(&self) -> u32 {
        self.break_limit
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Record one iteration; returns true when focus just locked
    pub fn observe(&mut self, trivial: bool) -> bool {
        if !trivial {
            self.remaining = self.break_limit;
            return false;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.remaining = self.break_limit;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.remaining = self.break_limit;
    }
}
