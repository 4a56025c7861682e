//! Outcome classification and alert decision.

use super::types::{Check, CheckState, ProbeOutcome};

/// Result of judging one probe against a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub state: CheckState,
    pub alert: bool,
}

/// `up` iff a response arrived and its code is one of `success_codes`
pub fn classify(outcome: &ProbeOutcome, success_codes: &[u16]) -> CheckState {
    match outcome.response_code {
        Some(code) if !outcome.error_occurred && success_codes.contains(&code) => CheckState::Up,
        _ => CheckState::Down,
    }
}

/// An alert needs a previously observed state that differs from the new one.
///
/// The first probe of a check never alerts, whatever it finds.
pub fn alert_warranted(check: &Check, new_state: CheckState) -> bool {
    check.observed_state().is_some_and(|previous| previous != new_state)
}

pub fn evaluate(check: &Check, outcome: &ProbeOutcome) -> Verdict {
    let state = classify(outcome, &check.success_codes);
    Verdict { state, alert: alert_warranted(check, state) }
}
