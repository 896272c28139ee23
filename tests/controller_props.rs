//! Property-based tests for the hill-climbing focus controller
//!
//! Run with: cargo test --test controller_props

use crabfocus::{
    commanded_step, ControllerConfig, Decision, Direction, FocusController, MAX_FOCUS_STEP,
};
use proptest::prelude::*;

fn controller(min: u32) -> FocusController {
    FocusController::new(ControllerConfig::default(), min)
}

/// (move succeeded, score) pairs as the loop would feed them
fn observations() -> impl Strategy<Value = Vec<(bool, f64)>> {
    prop::collection::vec((prop::bool::weighted(0.85), 0.0f64..1.0), 1..120)
}

// ═══════════════════════════════════════════════════════════════════════════
// STATE INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Best score tracks the running maximum of all scores since reset
    #[test]
    fn rate_max_is_running_maximum(obs in observations()) {
        let mut c = controller(16);
        let mut best = 0.0f64;
        for (ok, rate) in obs {
            let previous = c.state().rate_max;
            c.correct_focus(ok, rate);
            best = best.max(rate);
            prop_assert!(c.state().rate_max >= previous);
            prop_assert_eq!(c.state().rate_max, best);
        }
    }

    /// The displacement back to the best position is zero whenever a new best is recorded
    #[test]
    fn displacement_zeroed_on_new_best(obs in observations()) {
        let mut c = controller(16);
        for (ok, rate) in obs {
            let previous = c.state().rate_max;
            c.correct_focus(ok, rate);
            if c.state().rate_max > previous {
                prop_assert_eq!(c.state().step_to_last_max, 0);
            }
        }
    }

    /// Direction only changes on a failed move, a reversal or an overshoot
    #[test]
    fn direction_changes_only_on_reversing_decisions(obs in observations()) {
        let mut c = controller(16);
        for (ok, rate) in obs {
            let before = c.direction();
            c.correct_focus(ok, rate);
            let decision = c.last_decision().expect("decision after a call");
            if c.direction() != before {
                prop_assert!(decision.may_reverse(), "direction flipped on {:?}", decision);
            }
        }
    }

    /// Step stays finite, positive and within the focus drive range
    #[test]
    fn step_stays_in_range(obs in observations()) {
        let mut c = controller(16);
        for (ok, rate) in obs {
            let offset = c.correct_focus(ok, rate);
            prop_assert!(c.state().step > 0.0);
            prop_assert!(c.state().step <= MAX_FOCUS_STEP as f64);
            prop_assert!(offset.abs() <= MAX_FOCUS_STEP);
        }
    }

    /// A failed move always flips the heading and restarts the reversal counter
    #[test]
    fn failed_move_flips_sign(obs in observations(), rate in 0.0f64..1.0) {
        let mut c = controller(16);
        for (ok, r) in obs {
            c.correct_focus(ok, r);
        }
        let before = c.direction();
        let offset = c.correct_focus(false, rate);
        prop_assert_eq!(c.last_decision(), Some(Decision::MoveFailed));
        prop_assert_eq!(c.direction(), before.flip());
        let command = commanded_step(offset, 16, c.direction());
        prop_assert_eq!(Direction::of(command), Some(before.flip()));
        prop_assert_eq!(c.state().last_direction_change, 1);
    }

    /// With a lens limit, commands stay within it and a return to the peak
    /// only cancels the distance actually commanded
    #[test]
    fn lens_limit_bounds_commands_and_return_path(obs in observations(), limit in 16u32..2000) {
        let mut c = controller(16);
        c.set_max_step(Some(limit));
        for (ok, rate) in obs {
            let before = c.state().step_to_last_max;
            let offset = c.correct_focus(ok, rate);
            let command = c.command_for(offset);
            prop_assert!(command.unsigned_abs() <= limit as u64);
            if c.last_decision() == Some(Decision::Overshoot) {
                prop_assert_eq!(c.state().step_to_last_max, before + command);
            }
        }
    }

    /// Commanded steps always honor the lens minimum and the drive maximum
    #[test]
    fn commanded_step_bounds(offset in -100_000i64..100_000, min in 1u32..4096) {
        let command = commanded_step(offset, min, Direction::Far);
        prop_assert!(command.abs() >= min as i64);
        prop_assert!(command.abs() <= MAX_FOCUS_STEP);
        if offset != 0 {
            prop_assert_eq!(command.signum(), offset.signum());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn flat_scores_decay_geometrically() {
    let mut c = controller(1);
    let first = c.correct_focus(true, 0.5);
    assert_eq!(first, 1024);

    let mut expected = 1024.0f64;
    let mut sign = 1i64;
    for _ in 0..12 {
        expected *= 0.75;
        sign = -sign;
        let offset = c.correct_focus(true, 0.5);
        assert_eq!(c.last_decision(), Some(Decision::Reversed));
        assert!((c.state().step - expected).abs() < 1e-9);
        assert_eq!(offset, sign * expected.round() as i64);
    }
}

#[test]
fn falling_scores_after_peak_reverse_with_damping() {
    let mut c = controller(16);
    let offsets: Vec<i64> = [0.2, 0.4, 0.3, 0.25, 0.2]
        .iter()
        .map(|&rate| c.correct_focus(true, rate))
        .collect();

    assert_eq!(offsets, vec![1024, 1024, -768, 576, -432]);
    assert_eq!(c.last_decision(), Some(Decision::Reversed));
    assert_eq!(c.state().rate_max, 0.4);
    // -768 + 576 - 432 commanded since the peak
    assert_eq!(c.state().step_to_last_max, -624);
}

#[test]
fn overshoot_returns_exactly_to_peak() {
    let mut c = controller(16);
    for rate in [0.2, 0.5, 0.1, 0.2, 0.3] {
        c.correct_focus(true, rate);
    }
    // three moves of -768 since the best score
    assert_eq!(c.state().step_to_last_max, -2304);
    assert_eq!(c.state().last_direction_change, 3);

    let offset = c.correct_focus(true, 0.35);
    assert_eq!(c.last_decision(), Some(Decision::Overshoot));
    assert_eq!(offset, 2304);
    assert_eq!(c.direction(), Direction::Far);
    assert_eq!(c.state().step_to_last_max, 0);
    assert_eq!(c.state().last_direction_change, 0);
    assert_eq!(c.state().rate, 0.35);

    // back at the peak the climb resumes in the corrected direction
    let next = c.correct_focus(true, 0.5);
    assert_eq!(c.last_decision(), Some(Decision::Continue));
    assert_eq!(next, 768);
}

#[test]
fn lost_signal_restores_nominal_step() {
    let mut c = controller(16);
    c.correct_focus(true, 0.3);
    for _ in 0..5 {
        c.correct_focus(true, 0.3);
    }
    assert!(c.state().step < 300.0);
    let direction = c.direction();

    let offset = c.correct_focus(true, 0.0);
    assert_eq!(c.last_decision(), Some(Decision::Lost));
    assert_eq!(c.direction(), direction);
    assert_eq!(offset, direction.sign() * 1024);
}

#[test]
fn external_moves_count_toward_return_path() {
    let mut c = controller(16);
    c.correct_focus(true, 0.5);
    c.correct_focus(true, 0.49);
    assert_eq!(c.state().step_to_last_max, -768);
    c.note_external_move(-100);
    assert_eq!(c.state().step_to_last_max, -868);
}
