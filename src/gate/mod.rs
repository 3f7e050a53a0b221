//! Validation gate: hold a stream back until its leading bytes check out.
//!
//! ```text
//! +----------+     +------------------------------+     +------------+
//! | Upstream | --> |        ValidationGate        | --> | Downstream |
//! | (chunks) |     | buffer -> predicate -> pass  |     | (forward)  |
//! +----------+     +------------------------------+     +------------+
//!                                 |
//!                                 v
//!                  GateOutcome (dispose / failed / error)
//! ```
//!
//! The gate buffers until `required_bytes` have arrived, then runs its
//! predicate once on that leading window. A pass forwards the whole buffer
//! and every later chunk unchanged. A failure or predicate error disposes
//! the gate: nothing reaches downstream and the reason is reported on the
//! outcome channel instead of in the data.

pub mod channel;
pub mod outcome;
pub mod pipeline;
pub mod predicate;
pub mod stage;
pub mod state;

pub use channel::{chunk_channel, ChunkReceiver, ChunkSender, Downstream, GateStats};
pub use outcome::{
    drain_outcomes, outcome_channel, GateOutcome, OutcomeKind, OutcomeReceiver, OutcomeSender,
};
pub use pipeline::{GateReport, GateVerdict, GatedStream};
pub use predicate::{
    async_predicate_fn, predicate_fn, AsyncFnPredicate, FnPredicate, HeadPattern, MagicPrefix,
    Predicate, Reject, SharedPredicate,
};
pub use stage::{EndCompletion, PendingValidation, ValidationGate, Verdict};
pub use state::GateState;
