//! Stream driver for a validation gate.
//!
//! Reads upstream from an `AsyncRead`, feeds the gate, and writes forwarded
//! chunks to an `AsyncWrite` after every step. Everything runs on the calling
//! task, so the gate keeps its single-threaded contract and reading pauses
//! while the writer catches up.

use crate::config::GateConfig;
use crate::error::ValidationError;
use crate::gate::channel::{chunk_channel, ChunkReceiver, ChunkSender, GateStats};
use crate::gate::outcome::{drain_outcomes, GateOutcome, OutcomeKind};
use crate::gate::predicate::SharedPredicate;
use crate::gate::stage::{PendingValidation, ValidationGate, Verdict};
use crate::gate::state::GateState;
use anyhow::Result;
use bytes::Bytes;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// How a gated stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    Passed,
    Failed,
    Errored,
    Undecided,
}

/// Summary of one gated stream
#[derive(Debug)]
pub struct GateReport {
    pub state: GateState,
    pub disposed: bool,
    /// The graceful end-of-input completion ran
    pub completed: bool,
    pub outcomes: Vec<GateOutcome>,
    pub stats: GateStats,
    pub bytes_written: u64,
}

impl GateReport {
    pub fn verdict(&self) -> GateVerdict {
        if self.error().is_some() {
            return GateVerdict::Errored;
        }
        match self.state {
            GateState::Completed { failed: false } => GateVerdict::Passed,
            GateState::Completed { failed: true } => GateVerdict::Failed,
            _ => GateVerdict::Undecided,
        }
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.outcomes.iter().find_map(|outcome| match outcome {
            GateOutcome::ValidationError(err) => Some(err),
            _ => None,
        })
    }

    pub fn outcome_kinds(&self) -> Vec<OutcomeKind> {
        self.outcomes.iter().map(|o| o.kind()).collect()
    }
}

/// Runs one gate over a reader/writer pair
pub struct GatedStream {
    config: GateConfig,
    predicate: Option<SharedPredicate>,
}

impl GatedStream {
    pub fn new(config: GateConfig, predicate: Option<SharedPredicate>) -> Self {
        Self { config, predicate }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Gate everything read from `reader` into `writer` until the reader
    /// hits EOF and validation has settled.
    ///
    /// A graceful end shuts `writer` down. A failed write disposes the gate
    /// and is returned as the error once the loop stops.
    pub async fn run<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<GateReport>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.config.validate()?;

        let (data_tx, data_rx) = chunk_channel();
        let (gate, mut outcomes) =
            ValidationGate::from_config(&self.config, self.predicate.clone(), data_tx);
        let completed = Arc::new(AtomicBool::new(false));

        let mut driver = Driver {
            gate,
            data_rx,
            bytes_written: 0,
            write_error: None,
        };
        driver
            .drive(&self.config, reader, writer, completed.clone())
            .await?;

        if let Some(err) = driver.write_error {
            return Err(anyhow::Error::new(err).context("Failed writing to downstream"));
        }

        let completed = completed.load(Ordering::SeqCst);
        if completed {
            writer.shutdown().await?;
        }

        let report = GateReport {
            state: driver.gate.state(),
            disposed: driver.gate.is_disposed(),
            completed,
            outcomes: drain_outcomes(&mut outcomes),
            stats: driver.gate.stats().clone(),
            bytes_written: driver.bytes_written,
        };
        tracing::info!(
            verdict = ?report.verdict(),
            bytes_in = report.stats.bytes_received,
            bytes_out = report.bytes_written,
            "gated stream finished"
        );
        Ok(report)
    }
}

/// Loop state for one run: the gate, the channel it forwards into, and what
/// reached the writer so far
struct Driver {
    gate: ValidationGate<ChunkSender>,
    data_rx: ChunkReceiver,
    bytes_written: u64,
    write_error: Option<std::io::Error>,
}

impl Driver {
    async fn drive<R, W>(
        &mut self,
        config: &GateConfig,
        reader: &mut R,
        writer: &mut W,
        completed: Arc<AtomicBool>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; config.read_chunk_size];
        let mut pending: Option<PendingValidation> = None;
        let mut upstream_open = true;

        loop {
            if !upstream_open && pending.is_none() {
                break;
            }
            if self.gate.is_disposed() && pending.is_none() && !config.drain_after_dispose {
                tracing::debug!("gate disposed, no longer reading upstream");
                break;
            }

            tokio::select! {
                verdict = wait_for(&mut pending), if pending.is_some() => {
                    pending = None;
                    self.gate.complete_validation(verdict);
                }
                read = reader.read(&mut buf), if upstream_open => {
                    let n = read?;
                    if n == 0 {
                        upstream_open = false;
                        let flag = completed.clone();
                        if let Some(run) =
                            self.gate.on_end_of_input(move || flag.store(true, Ordering::SeqCst))
                        {
                            pending = Some(run);
                        }
                    } else if let Some(run) =
                        self.gate.on_chunk(Bytes::copy_from_slice(&buf[..n]))
                    {
                        pending = Some(run);
                    }
                }
            }

            self.flush_forwarded(writer).await;
        }

        Ok(())
    }

    /// Write out whatever the gate forwarded during the last step. The first
    /// write failure closes the channel and disposes the gate.
    async fn flush_forwarded<W>(&mut self, writer: &mut W)
    where
        W: AsyncWrite + Unpin,
    {
        if self.write_error.is_some() {
            return;
        }

        while let Ok(bytes) = self.data_rx.try_recv() {
            if let Err(err) = writer.write_all(&bytes).await {
                tracing::warn!(error = %err, "downstream write failed, disposing gate");
                self.data_rx.close();
                self.gate.dispose();
                self.write_error = Some(err);
                return;
            }
            self.bytes_written += bytes.len() as u64;
        }
    }
}

async fn wait_for(pending: &mut Option<PendingValidation>) -> Verdict {
    match pending {
        Some(run) => run.await,
        None => std::future::pending().await,
    }
}
