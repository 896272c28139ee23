//! The focus loop
//!
//! One iteration pulls a frame, hands it to the recorder, scores it, asks the
//! controller for the next move and sends the clamped move to the lens. The
//! operator is polled after the move, so a quit never interrupts an
//! iteration halfway.

pub mod input;
#[cfg(feature = "cli")]
pub mod keyboard;
mod mode;

pub use input::{FlagInput, NoInput, OperatorCommand, OperatorInput, ScriptedInput};
pub use mode::{LockDetector, SessionMode};

use crate::calibration::{CalibrationResult, LensCalibrator};
use crate::config::AutofocusConfig;
use crate::controller::{FocusController, FocusSnapshot};
use crate::errors::FocusError;
use crate::platform::{FrameRecorder, FrameSource, LensActuator};
use crate::sharpness::SharpnessMeter;
use crate::timing::{Pacer, SessionClock};
use crate::types::{CameraFrame, Direction};
use serde::{Deserialize, Serialize};

/// Everything that happened in one loop iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationReport {
    pub iteration: u64,
    pub frame_sequence: u64,
    pub elapsed_secs: f64,
    pub score: f64,
    /// Mode after the iteration
    pub mode: SessionMode,
    /// Displacement the controller asked for
    pub requested: Option<i64>,
    /// Clamped displacement sent to the lens
    pub command: Option<i64>,
    pub accepted: Option<bool>,
    /// Focus locked during this iteration
    pub locked: bool,
    pub controller: FocusSnapshot,
}

/// One reading of a measure run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureSample {
    pub iteration: u32,
    pub elapsed_secs: f64,
    /// Score of the frame taken before the move
    pub score: f64,
    pub command: i64,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Quit,
    IterationLimit,
}

/// How a [`FocusSession::run`] ended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub iterations: u64,
    pub reason: StopReason,
    pub final_mode: SessionMode,
    pub best_score: f64,
    pub min_focus_step: u32,
}

type Observer = Box<dyn FnMut(&IterationReport)>;

/// A camera, a lens and the autofocus engine between them
pub struct FocusSession<S, A> {
    config: AutofocusConfig,
    source: S,
    actuator: A,
    meter: SharpnessMeter,
    calibrator: LensCalibrator,
    controller: FocusController,
    lock: LockDetector,
    mode: SessionMode,
    nudge_step: Option<u32>,
    last_move_succeeded: bool,
    iteration: u64,
    pacer: Pacer,
    clock: SessionClock,
    recorder: Option<Box<dyn FrameRecorder>>,
    observer: Option<Observer>,
}

impl<S: FrameSource, A: LensActuator> FocusSession<S, A> {
    pub fn new(config: AutofocusConfig, source: S, actuator: A) -> Result<Self, FocusError> {
        config.validate().map_err(FocusError::Config)?;

        let meter = SharpnessMeter::new(config.sharpness.clone())?;
        let calibrator = LensCalibrator::new(config.calibration.clone())?;
        let mut controller =
            FocusController::new(config.controller.clone(), config.lens.min_focus_step);
        controller.set_max_step(actuator.max_step());
        if let Some(max) = actuator.max_step() {
            log::info!("Lens takes at most {} per focus request", max);
        }
        let lock = LockDetector::new(config.session.break_limit);
        let pacer = Pacer::from_millis(config.session.frame_interval_ms);

        Ok(Self {
            config,
            source,
            actuator,
            meter,
            calibrator,
            controller,
            lock,
            mode: SessionMode::Auto,
            nudge_step: None,
            last_move_succeeded: true,
            iteration: 0,
            pacer,
            clock: SessionClock::new(),
            recorder: None,
            observer: None,
        })
    }

    pub fn with_recorder(mut self, recorder: Box<dyn FrameRecorder>) -> Self {
        self.set_recorder(recorder);
        self
    }

    pub fn set_recorder(&mut self, recorder: Box<dyn FrameRecorder>) {
        self.recorder = Some(recorder);
    }

    /// Called with the report of every loop iteration
    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&IterationReport) + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    pub fn config(&self) -> &AutofocusConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn controller(&self) -> &FocusController {
        &self.controller
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Step used by manual commands after focus locked
    pub fn nudge_step(&self) -> Option<u32> {
        self.nudge_step
    }

    pub fn has_recorder(&self) -> bool {
        self.recorder.is_some()
    }

    /// Override the minimum step without calibrating
    pub fn set_min_focus_step(&mut self, min_focus_step: u32) {
        self.controller.set_min_focus_step(min_focus_step.max(1));
    }

    /// Measure the minimum honored step and restart the search from the
    /// travel end it leaves the lens at.
    pub fn calibrate(&mut self) -> Result<CalibrationResult, FocusError> {
        let direction = self.config.lens.calibration_direction;
        let result = self.calibrator.calibrate(&mut self.actuator, direction)?;
        let min = result.effective_min_step(self.config.lens.min_focus_step);
        if result.min_step == 0 {
            log::warn!(
                "Calibration found no honored step, using configured minimum {}",
                min
            );
        }

        self.controller.set_min_focus_step(min);
        self.restart_from_end(direction);
        Ok(result)
    }

    /// Run one capture, score and move cycle
    pub fn step_once(&mut self) -> Result<IterationReport, FocusError> {
        let frame = self.source.next_frame()?;
        self.record(&frame);
        let score = self.meter.score(&frame)?;

        let mut report = IterationReport {
            iteration: self.iteration,
            frame_sequence: frame.sequence,
            elapsed_secs: self.clock.elapsed_secs(),
            score,
            mode: self.mode,
            requested: None,
            command: None,
            accepted: None,
            locked: false,
            controller: self.controller.snapshot(),
        };

        if self.mode.is_auto() {
            let requested = self
                .controller
                .correct_focus(self.last_move_succeeded, score);
            let min = self.controller.min_focus_step();
            let command = self.controller.command_for(requested);
            let accepted = self.actuator.request_step(command)?;
            self.last_move_succeeded = accepted;

            let trivial = !accepted || requested.unsigned_abs() < min as u64;
            if self.lock.observe(trivial) {
                self.mode = SessionMode::Locked;
                let nudge = min.saturating_mul(self.config.session.nudge_factor);
                self.nudge_step = Some(nudge);
                report.locked = true;
                log::info!(
                    "Focus locked at score {:.5} (best {:.5}), nudge step {}",
                    score,
                    self.controller.state().rate_max,
                    nudge
                );
            }

            report.requested = Some(requested);
            report.command = Some(command);
            report.accepted = Some(accepted);
            report.mode = self.mode;
            report.controller = self.controller.snapshot();
        }

        if let Some(observer) = self.observer.as_mut() {
            observer(&report);
        }
        self.iteration += 1;
        Ok(report)
    }

    /// Apply an operator command. `Quit` is left to the caller.
    pub fn apply(&mut self, command: OperatorCommand) -> Result<(), FocusError> {
        match command {
            OperatorCommand::StepOut | OperatorCommand::StepIn => {
                let Some(direction) = command.manual_direction() else {
                    return Ok(());
                };
                let magnitude = self.nudge_step.unwrap_or(self.config.lens.manual_step) as i64;
                let delta = direction.sign() * magnitude.min(self.controller.max_step());
                let accepted = self.actuator.request_step(delta)?;
                if accepted {
                    self.controller.note_external_move(delta);
                }
                log::info!("Manual step {}: accepted={}", delta, accepted);
            }
            OperatorCommand::DriveNear | OperatorCommand::DriveFar => {
                let Some(end) = command.drive_target() else {
                    return Ok(());
                };
                let moves = self.calibrator.drive_to_end(&mut self.actuator, end)?;
                log::info!("Drove lens to {} end ({} moves)", end, moves);
                self.restart_from_end(end);
            }
            OperatorCommand::Reset => {
                self.restart(self.controller.direction());
                if self.mode == SessionMode::Locked {
                    self.set_mode(SessionMode::Auto);
                }
                log::info!("Autofocus state reset");
            }
            OperatorCommand::ToggleAutofocus => match self.mode {
                SessionMode::Auto => self.set_mode(SessionMode::Manual),
                SessionMode::Manual => self.set_mode(SessionMode::Auto),
                SessionMode::Locked => {
                    self.restart(self.controller.direction());
                    self.set_mode(SessionMode::Auto);
                }
            },
            OperatorCommand::Quit => {}
        }
        Ok(())
    }

    /// Loop until the operator quits or the iteration limit is hit.
    ///
    /// The recorder is finished however the loop ends.
    pub fn run<I: OperatorInput + ?Sized>(&mut self, input: &mut I) -> Result<RunSummary, FocusError> {
        log::info!(
            "Focus loop starting: mode {}, min step {}, interval {} ms",
            self.mode,
            self.controller.min_focus_step(),
            self.config.session.frame_interval_ms
        );

        let result = self.run_loop(input);
        self.finish_recording();

        let reason = result?;
        let summary = RunSummary {
            iterations: self.iteration,
            reason,
            final_mode: self.mode,
            best_score: self.controller.state().rate_max,
            min_focus_step: self.controller.min_focus_step(),
        };
        log::info!(
            "Focus loop ended ({:?}) after {} iterations in {} mode",
            summary.reason,
            summary.iterations,
            summary.final_mode
        );
        Ok(summary)
    }

    fn run_loop<I: OperatorInput + ?Sized>(&mut self, input: &mut I) -> Result<StopReason, FocusError> {
        loop {
            if let Some(limit) = self.config.session.max_iterations {
                if self.iteration >= limit {
                    return Ok(StopReason::IterationLimit);
                }
            }

            self.pacer.wait();
            self.step_once()?;

            match input.poll()? {
                Some(OperatorCommand::Quit) => return Ok(StopReason::Quit),
                Some(command) => self.apply(command)?,
                None => {}
            }
        }
    }

    /// Step the lens by the minimum step in the current direction and log
    /// the score of each frame. The controller is bypassed.
    ///
    /// Stops early at the first refused move.
    pub fn measure(&mut self, iterations: u32) -> Result<Vec<MeasureSample>, FocusError> {
        let direction = self.controller.direction();
        let command = self.controller.command_for(direction.sign());
        log::info!(
            "Measuring {} iterations of {} toward {}",
            iterations,
            command,
            direction
        );

        let mut samples = Vec::with_capacity(iterations as usize);
        for iteration in 0..iterations {
            self.pacer.wait();
            let frame = self.source.next_frame()?;
            self.record(&frame);
            let score = self.meter.score(&frame)?;
            let accepted = self.actuator.request_step(command)?;

            samples.push(MeasureSample {
                iteration,
                elapsed_secs: self.clock.elapsed_secs(),
                score,
                command,
                accepted,
            });

            if !accepted {
                log::info!("Lens refused measure step after {} iterations", iteration);
                break;
            }
        }

        self.finish_recording();
        Ok(samples)
    }

    fn record(&mut self, frame: &CameraFrame) {
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record(frame) {
                log::warn!("Recorder failed, recording disabled: {}", e);
                self.recorder = None;
            }
        }
    }

    fn finish_recording(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            if let Err(e) = recorder.finish() {
                log::warn!("Failed to finish recording: {}", e);
            }
        }
    }

    /// Fresh search state, same minimum step
    fn restart(&mut self, direction: Direction) {
        self.controller.reset(direction);
        self.lock.reset();
        self.nudge_step = None;
        self.last_move_succeeded = true;
    }

    /// Fresh search heading away from the travel end the lens sits at
    fn restart_from_end(&mut self, end: Direction) {
        self.restart(end.flip());
    }

    fn set_mode(&mut self, mode: SessionMode) {
        if self.mode != mode {
            log::info!("Session mode {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }
}
