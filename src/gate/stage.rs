//! The validation gate itself.
//!
//! A gate buffers chunks until `required_bytes` have arrived, asks its
//! predicate about the leading slice once, then either forwards everything
//! (buffered and future chunks) or disposes and drops everything.
//!
//! The gate never awaits anything itself. Triggering validation hands a
//! [`PendingValidation`] back to the caller, who awaits it on the stream's
//! task and feeds the verdict to [`ValidationGate::complete_validation`].
//! Finalizing the state and running a deferred end-of-input completion both
//! happen inside that call, so completion can never overtake the verdict.

use crate::config::GateConfig;
use crate::error::ValidationError;
use crate::gate::channel::{Downstream, GateStats};
use crate::gate::outcome::{outcome_channel, GateOutcome, OutcomeReceiver, OutcomeSender};
use crate::gate::predicate::{Reject, SharedPredicate};
use crate::gate::state::GateState;
use bytes::{Bytes, BytesMut};
use futures::future::{BoxFuture, FutureExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Settled predicate result: `Ok(true)` passes, `Ok(false)` fails
pub type Verdict = std::result::Result<bool, ValidationError>;

/// In-flight predicate run. Owns everything it needs, so it can be awaited
/// while the gate keeps accepting chunks.
pub type PendingValidation = BoxFuture<'static, Verdict>;

/// Signal that lets the downstream side know the session finished cleanly
pub type EndCompletion = Box<dyn FnOnce() + Send>;

pub struct ValidationGate<D> {
    required_bytes: usize,
    predicate: SharedPredicate,
    state: GateState,
    errored: bool,
    disposed: bool,
    buffer: BytesMut,
    pending_end: Option<EndCompletion>,
    downstream: D,
    outcomes: OutcomeSender,
    stats: GateStats,
}

impl<D: Downstream> ValidationGate<D> {
    /// Build a gate. A `None` predicate falls back to [`Reject`].
    ///
    /// The returned receiver yields the gate's [`GateOutcome`]s; dropping it
    /// is fine when nobody cares.
    pub fn new(
        required_bytes: usize,
        predicate: Option<SharedPredicate>,
        downstream: D,
    ) -> (Self, OutcomeReceiver) {
        let (outcomes, rx) = outcome_channel();
        let gate = Self {
            required_bytes,
            predicate: predicate.unwrap_or_else(|| Arc::new(Reject) as SharedPredicate),
            state: GateState::NotValidated,
            errored: false,
            disposed: false,
            buffer: BytesMut::new(),
            pending_end: None,
            downstream,
            outcomes,
            stats: GateStats::new(),
        };
        (gate, rx)
    }

    pub fn from_config(
        config: &GateConfig,
        predicate: Option<SharedPredicate>,
        downstream: D,
    ) -> (Self, OutcomeReceiver) {
        Self::new(config.required_bytes, predicate, downstream)
    }

    /// Accept the next upstream chunk.
    ///
    /// Returns the predicate run when this chunk brought the buffer to the
    /// threshold.
    #[must_use = "a returned validation must be awaited and passed to complete_validation"]
    pub fn on_chunk(&mut self, chunk: Bytes) -> Option<PendingValidation> {
        self.stats.chunks_received += 1;
        self.stats.bytes_received += chunk.len() as u64;

        if self.disposed {
            self.stats.chunks_dropped += 1;
            return None;
        }

        match self.state {
            GateState::Completed { failed: false } => {
                self.forward(chunk);
                None
            }
            GateState::Completed { failed: true } => {
                self.stats.chunks_dropped += 1;
                None
            }
            GateState::Validating => {
                self.buffer.extend_from_slice(&chunk);
                None
            }
            GateState::NotValidated => {
                self.buffer.extend_from_slice(&chunk);
                if self.buffer.len() >= self.required_bytes {
                    self.validate()
                } else {
                    None
                }
            }
        }
    }

    /// Upstream has no more chunks.
    ///
    /// `complete` runs once validation has settled, right before the gate
    /// disposes. It never runs when the predicate answered `Ok(false)`; a
    /// predicate error still lets it run. Ending before the threshold
    /// validates whatever was buffered, and the returned run must be driven
    /// like one from [`on_chunk`](Self::on_chunk).
    #[must_use = "a returned validation must be awaited and passed to complete_validation"]
    pub fn on_end_of_input<F>(&mut self, complete: F) -> Option<PendingValidation>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.state {
            GateState::Completed { .. } => {
                self.finish_end(Box::new(complete));
                None
            }
            GateState::Validating => {
                self.pending_end = Some(Box::new(complete));
                None
            }
            GateState::NotValidated if self.disposed => {
                tracing::debug!("end of input after dispose, ignoring");
                None
            }
            GateState::NotValidated => {
                tracing::debug!(
                    buffered = self.buffer.len(),
                    required = self.required_bytes,
                    "input ended before threshold, validating partial buffer"
                );
                self.pending_end = Some(Box::new(complete));
                self.validate()
            }
        }
    }

    fn validate(&mut self) -> Option<PendingValidation> {
        if self.disposed || self.state != GateState::NotValidated {
            return None;
        }
        self.state = GateState::Validating;

        let take = self.buffer.len().min(self.required_bytes);
        let head = Bytes::copy_from_slice(&self.buffer[..take]);
        tracing::debug!(head_len = head.len(), "starting validation");

        let predicate = self.predicate.clone();
        let run = async move { predicate.validate(head).await.map_err(ValidationError::from) };

        Some(
            AssertUnwindSafe(run)
                .catch_unwind()
                .map(|result| result.unwrap_or_else(|panic| Err(ValidationError::from_panic(panic))))
                .boxed(),
        )
    }

    /// Apply a settled verdict: forward or dispose, mark the gate completed,
    /// then run any end-of-input completion that was waiting.
    pub fn complete_validation(&mut self, verdict: Verdict) {
        if self.state != GateState::Validating {
            tracing::warn!(state = %self.state, "verdict delivered outside validation, ignoring");
            return;
        }

        let failed = match verdict {
            Ok(true) => {
                tracing::info!(bytes = self.buffer.len(), "validation passed");
                let whole = Bytes::copy_from_slice(&self.buffer);
                self.forward(whole);
                false
            }
            Ok(false) => {
                tracing::info!("validation failed, blocking stream");
                self.emit(GateOutcome::ValidationFailed);
                self.dispose();
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "validation predicate errored, blocking stream");
                self.errored = true;
                self.emit(GateOutcome::ValidationError(err));
                self.dispose();
                false
            }
        };

        self.state = GateState::Completed { failed };

        if let Some(complete) = self.pending_end.take() {
            self.finish_end(complete);
        }
    }

    /// Await a run returned by this gate and apply its verdict
    pub async fn settle(&mut self, pending: PendingValidation) {
        let verdict = pending.await;
        self.complete_validation(verdict);
    }

    /// Stop producing output for good. Only the first call has any effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        tracing::debug!(state = %self.state, "disposing gate");
        self.emit(GateOutcome::Disposed);
        self.disposed = true;
    }

    fn finish_end(&mut self, complete: EndCompletion) {
        if self.state.failed() {
            tracing::debug!("validation failed, withholding end-of-input completion");
            return;
        }
        complete();
        self.dispose();
    }

    fn forward(&mut self, chunk: Bytes) {
        if self.disposed {
            self.stats.chunks_dropped += 1;
            return;
        }

        let len = chunk.len() as u64;
        match self.downstream.forward(chunk) {
            Ok(()) => self.stats.bytes_forwarded += len,
            Err(err) => {
                tracing::warn!(error = %err, "downstream rejected chunk, disposing gate");
                self.dispose();
            }
        }
    }

    fn emit(&self, outcome: GateOutcome) {
        if self.outcomes.send(outcome).is_err() {
            tracing::trace!("no outcome subscriber");
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The predicate answered `Ok(false)`
    pub fn validation_failed(&self) -> bool {
        self.state.failed()
    }

    /// The predicate returned an error or panicked
    pub fn validation_errored(&self) -> bool {
        self.errored
    }

    pub fn required_bytes(&self) -> usize {
        self.required_bytes
    }

    /// Everything accumulated before validation settled
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn has_pending_end(&self) -> bool {
        self.pending_end.is_some()
    }

    pub fn stats(&self) -> &GateStats {
        &self.stats
    }

    pub fn downstream(&self) -> &D {
        &self.downstream
    }
}
