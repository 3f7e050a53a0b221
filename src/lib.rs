//! stream-gate: an inline stream stage that withholds data until its leading
//! bytes pass a one-shot asynchronous validation.

pub mod config;
pub mod error;
pub mod gate;

pub use config::{coerce_threshold, GateConfig};
pub use error::{GateError, Result, ValidationError};
pub use gate::{
    GateOutcome, GateReport, GateState, GateVerdict, GatedStream, Predicate, ValidationGate,
};
