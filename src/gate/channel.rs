//! Downstream plumbing and counters for the gate.

use crate::error::{GateError, Result};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

// =============================================================================
// Downstream
// =============================================================================

/// Receiver of forwarded chunks.
///
/// Called synchronously from the gate in arrival order. An error means the
/// consumer is gone; the gate disposes itself in response.
pub trait Downstream {
    fn forward(&mut self, chunk: Bytes) -> Result<()>;
}

impl Downstream for mpsc::UnboundedSender<Bytes> {
    fn forward(&mut self, chunk: Bytes) -> Result<()> {
        self.send(chunk).map_err(|err| GateError::DownstreamClosed {
            dropped: err.0.len(),
        })
    }
}

/// Collects forwarded chunks in memory
impl Downstream for Vec<Bytes> {
    fn forward(&mut self, chunk: Bytes) -> Result<()> {
        self.push(chunk);
        Ok(())
    }
}

/// Sender side of the chunk channel between a gate and its writer
pub type ChunkSender = mpsc::UnboundedSender<Bytes>;

/// Receiver side of the chunk channel between a gate and its writer
pub type ChunkReceiver = mpsc::UnboundedReceiver<Bytes>;

/// Create the channel a gate forwards into.
///
/// Unbounded: forwarding happens inside synchronous gate calls and must not
/// block.
pub fn chunk_channel() -> (ChunkSender, ChunkReceiver) {
    mpsc::unbounded_channel()
}

// =============================================================================
// Gate statistics
// =============================================================================

/// Counters for one gate
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Chunks handed to the gate, including dropped ones
    pub chunks_received: u64,

    /// Bytes handed to the gate, including dropped ones
    pub bytes_received: u64,

    /// Bytes passed downstream
    pub bytes_forwarded: u64,

    /// Chunks discarded after disposal or a failed validation
    pub chunks_dropped: u64,
}

impl GateStats {
    pub fn new() -> Self {
        Self::default()
    }
}
