//! Operator commands and the sources that produce them

use crate::errors::FocusError;
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Manual overrides available to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCommand {
    /// Manual step toward far/infinity
    StepOut,
    /// Manual step toward near
    StepIn,
    DriveNear,
    DriveFar,
    /// Discard the search state and start over
    Reset,
    ToggleAutofocus,
    Quit,
}

impl OperatorCommand {
    /// Travel end targeted by a drive command
    pub fn drive_target(self) -> Option<Direction> {
        match self {
            OperatorCommand::DriveNear => Some(Direction::Near),
            OperatorCommand::DriveFar => Some(Direction::Far),
            _ => None,
        }
    }

    /// Direction of a manual step command
    pub fn manual_direction(self) -> Option<Direction> {
        match self {
            OperatorCommand::StepOut => Some(Direction::Far),
            OperatorCommand::StepIn => Some(Direction::Near),
            _ => None,
        }
    }
}

/// Polled once per loop iteration, after actuation
pub trait OperatorInput {
    /// Next pending command, if any. Must not block.
    fn poll(&mut self) -> Result<Option<OperatorCommand>, FocusError>;
}

impl<T: OperatorInput + ?Sized> OperatorInput for Box<T> {
    fn poll(&mut self) -> Result<Option<OperatorCommand>, FocusError> {
        (**self).poll()
    }
}

/// Input that never produces a command
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl OperatorInput for NoInput {
    fn poll(&mut self) -> Result<Option<OperatorCommand>, FocusError> {
        Ok(None)
    }
}

/// Canned input: one entry consumed per poll, `None` entries are idle polls
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: VecDeque<Option<OperatorCommand>>,
    quit_when_done: bool,
}

impl ScriptedInput {
    pub fn new(script: impl IntoIterator<Item = Option<OperatorCommand>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            quit_when_done: false,
        }
    }

    /// Quit after `idle` empty polls
    pub fn quit_after(idle: usize) -> Self {
        Self::new(std::iter::repeat(None).take(idle).chain([Some(OperatorCommand::Quit)]))
    }

    /// Emit `Quit` once the script is exhausted
    pub fn then_quit(mut self) -> Self {
        self.quit_when_done = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl OperatorInput for ScriptedInput {
    fn poll(&mut self) -> Result<Option<OperatorCommand>, FocusError> {
        match self.script.pop_front() {
            Some(entry) => Ok(entry),
            None if self.quit_when_done => Ok(Some(OperatorCommand::Quit)),
            None => Ok(None),
        }
    }
}

/// Headless input: quits once a shared flag is raised (e.g. by a ctrl-c handler)
#[derive(Debug, Clone, Default)]
pub struct FlagInput {
    quit: Arc<AtomicBool>,
}

impl FlagInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to raise from another thread or a signal handler
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }
}

impl OperatorInput for FlagInput {
    fn poll(&mut self) -> Result<Option<OperatorCommand>, FocusError> {
        if self.quit.load(Ordering::SeqCst) {
            Ok(Some(OperatorCommand::Quit))
        } else {
            Ok(None)
        }
    }
}
