//! Contract tests: the controller's invariants must actually be evaluated
//! while it runs, not merely declared.

use crabfocus::invariant_ppt::{clear_invariant_log, contract_test, times_checked};
use crabfocus::testing::{simulated_rig, LensModel, ThresholdActuator};
use crabfocus::{AutofocusConfig, ControllerConfig, FocusController, FocusSession};

const CONTROLLER_INVARIANTS: [&str; 4] = [
    "Displacement to best position is zero when a new best is recorded",
    "Best score never decreases between resets",
    "Direction only changes on a failed move, a reversal or an overshoot",
    "Step never exceeds the maximum focus step",
];

#[test]
fn contract_controller_policy() {
    clear_invariant_log();

    let mut controller = FocusController::new(ControllerConfig::default(), 16);
    // improve, fall past the peak, recover partway, fail a move
    for (ok, rate) in [(true, 0.2), (true, 0.5), (true, 0.1), (true, 0.2), (true, 0.3), (true, 0.35), (false, 0.4)] {
        controller.correct_focus(ok, rate);
    }

    contract_test("controller policy", &CONTROLLER_INVARIANTS);
}

#[test]
fn contract_invariants_checked_every_iteration() {
    clear_invariant_log();

    let mut controller = FocusController::new(ControllerConfig::default(), 16);
    for i in 0..10 {
        controller.correct_focus(true, 0.1 + i as f64 * 0.01);
    }
    assert_eq!(times_checked("Best score never decreases between resets"), 10);
    assert_eq!(times_checked("Step never exceeds the maximum focus step"), 10);
}

#[test]
fn contract_session_drives_controller_invariants() {
    clear_invariant_log();

    let actuator = ThresholdActuator::new(1, 40_000).with_position(17_000);
    let (camera, lens) = simulated_rig(LensModel::new(actuator, 20_000));
    let mut config = AutofocusConfig::default();
    config.session.frame_interval_ms = 0;
    let mut session = FocusSession::new(config, camera, lens).unwrap();
    for _ in 0..15 {
        session.step_once().unwrap();
    }

    contract_test("focus session", &CONTROLLER_INVARIANTS);
}
