//! Terminal outcomes reported by a gate.
//!
//! Failures never travel downstream as data. Subscribers read them from the
//! outcome channel handed out when the gate is built.

use crate::error::ValidationError;
use tokio::sync::mpsc;

/// Out-of-band notification from a gate. Each variant fires at most once per
/// gate; `ValidationFailed` and `ValidationError` exclude each other.
#[derive(Debug)]
pub enum GateOutcome {
    /// The gate will not produce any further output
    Disposed,
    /// The predicate returned `Ok(false)`
    ValidationFailed,
    /// The predicate returned an error or panicked
    ValidationError(ValidationError),
}

impl GateOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            GateOutcome::Disposed => OutcomeKind::Disposed,
            GateOutcome::ValidationFailed => OutcomeKind::ValidationFailed,
            GateOutcome::ValidationError(_) => OutcomeKind::ValidationError,
        }
    }
}

/// Payload-free tag of a [`GateOutcome`], handy for ordering assertions and
/// reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Disposed,
    ValidationFailed,
    ValidationError,
}

pub type OutcomeSender = mpsc::UnboundedSender<GateOutcome>;

pub type OutcomeReceiver = mpsc::UnboundedReceiver<GateOutcome>;

/// Create the outcome channel. Unbounded so the gate never waits on a
/// subscriber.
pub fn outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
    mpsc::unbounded_channel()
}

/// Collect every outcome already delivered, without waiting
pub fn drain_outcomes(rx: &mut OutcomeReceiver) -> Vec<GateOutcome> {
    let mut outcomes = Vec::new();
    while let Ok(outcome) = rx.try_recv() {
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_outcomes_in_order() {
        let (tx, mut rx) = outcome_channel();
        tx.send(GateOutcome::ValidationFailed).unwrap();
        tx.send(GateOutcome::Disposed).unwrap();

        let kinds: Vec<_> = drain_outcomes(&mut rx).iter().map(|o| o.kind()).collect();
        assert_eq!(
            kinds,
            vec![OutcomeKind::ValidationFailed, OutcomeKind::Disposed]
        );
        assert!(drain_outcomes(&mut rx).is_empty());
    }
}
