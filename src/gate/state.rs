//! Validation progress of a gate.

use serde::Serialize;
use std::fmt;

/// Where a gate is in its single validation pass.
///
/// Transitions only move forward: `NotValidated -> Validating -> Completed`,
/// each taken once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Threshold not reached, predicate not started
    #[default]
    NotValidated,
    /// Predicate running on the leading slice
    Validating,
    /// Predicate settled; `failed` is set only for a false verdict. A
    /// predicate error settles with `failed: false` and is reported as an
    /// outcome
    Completed { failed: bool },
}

impl GateState {
    pub fn is_completed(&self) -> bool {
        matches!(self, GateState::Completed { .. })
    }

    /// True once the predicate answered `Ok(false)`
    pub fn failed(&self) -> bool {
        matches!(self, GateState::Completed { failed: true })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::NotValidated => "not_validated",
            GateState::Validating => "validating",
            GateState::Completed { failed: false } => "completed",
            GateState::Completed { failed: true } => "failed",
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(!GateState::NotValidated.is_completed());
        assert!(!GateState::Validating.is_completed());

        let settled = GateState::Completed { failed: false };
        assert!(settled.is_completed());
        assert!(!settled.failed());

        let failed = GateState::Completed { failed: true };
        assert!(failed.is_completed());
        assert!(failed.failed());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(GateState::default().to_string(), "not_validated");
        assert_eq!(GateState::Completed { failed: true }.to_string(), "failed");
        assert_eq!(
            GateState::Completed { failed: false }.to_string(),
            "completed"
        );
    }
}
