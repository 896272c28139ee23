//! Runtime invariant checks with contract-test support
//!
//! Production code states its invariants with [`assert_invariant!`]. Every
//! checked invariant is remembered per thread, so a contract test can drive
//! the code and then demand that the invariants it cares about were really
//! evaluated, not just declared.
//!
//! ```rust,ignore
//! use crabfocus::invariant_ppt::*;
//!
//! assert_invariant!(
//!     state.rate_max >= previous_max,
//!     "Best score never decreases between resets",
//!     "controller"
//! );
//!
//! #[test]
//! fn contract_controller() {
//!     // ... drive the controller ...
//!     contract_test("controller", &["Best score never decreases between resets"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::thread_local;

thread_local! {
    static CHECKED: RefCell<HashMap<String, u64>> = RefCell::new(HashMap::new());
}

/// Assert an invariant and record that it was checked.
///
/// Panics with the message and optional context when the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check_invariant(condition: bool, message: &str, context: Option<&str>) {
    CHECKED.with(|checked| {
        *checked.borrow_mut().entry(message.to_string()).or_insert(0) += 1;
    });

    if !condition {
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// How many times an invariant was checked on this thread
pub fn times_checked(message: &str) -> u64 {
    CHECKED.with(|checked| checked.borrow().get(message).copied().unwrap_or(0))
}

/// Panic unless every listed invariant was checked at least once on this thread
pub fn contract_test(name: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|message| times_checked(message) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            name,
            missing.join("\n  - ")
        );
    }
}

/// Forget all recorded checks on this thread
pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_are_counted() {
        clear_invariant_log();
        crate::assert_invariant!(true, "counted");
        crate::assert_invariant!(true, "counted", "tests");
        assert_eq!(times_checked("counted"), 2);
        contract_test("counting", &["counted"]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [tests]: broken")]
    fn test_violation_panics() {
        crate::assert_invariant!(false, "broken", "tests");
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn test_missing_invariant_fails_contract() {
        clear_invariant_log();
        contract_test("empty", &["never checked"]);
    }
}
