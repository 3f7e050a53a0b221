//! Validation predicates.
//!
//! A predicate sees the leading slice of the stream once and answers
//! `Ok(true)` to open the gate, `Ok(false)` to close it, or `Err` when it
//! could not decide.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use regex::bytes::Regex;
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait Predicate: Send + Sync {
    async fn validate(&self, head: Bytes) -> Result<bool>;
}

/// Shared handle to a predicate, as stored by a gate
pub type SharedPredicate = Arc<dyn Predicate>;

// =============================================================================
// Closure adapters
// =============================================================================

/// Predicate backed by a synchronous closure over the leading bytes
pub struct FnPredicate<F>(F);

#[async_trait]
impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&[u8]) -> Result<bool> + Send + Sync + 'static,
{
    async fn validate(&self, head: Bytes) -> Result<bool> {
        (self.0)(&head[..])
    }
}

/// Predicate backed by a closure returning a future
pub struct AsyncFnPredicate<F>(F);

#[async_trait]
impl<F, Fut> Predicate for AsyncFnPredicate<F>
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    async fn validate(&self, head: Bytes) -> Result<bool> {
        (self.0)(head).await
    }
}

pub fn predicate_fn<F>(f: F) -> SharedPredicate
where
    F: Fn(&[u8]) -> Result<bool> + Send + Sync + 'static,
{
    Arc::new(FnPredicate(f))
}

pub fn async_predicate_fn<F, Fut>(f: F) -> SharedPredicate
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(AsyncFnPredicate(f))
}

// =============================================================================
// Built-in predicates
// =============================================================================

/// Always closes the gate. A gate built without a predicate uses this.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reject;

#[async_trait]
impl Predicate for Reject {
    async fn validate(&self, _head: Bytes) -> Result<bool> {
        Ok(false)
    }
}

/// Passes when the leading bytes start with a fixed signature
#[derive(Debug, Clone)]
pub struct MagicPrefix {
    magic: Bytes,
}

impl MagicPrefix {
    pub fn new(magic: impl Into<Bytes>) -> Self {
        Self {
            magic: magic.into(),
        }
    }

    /// Parse a hex-encoded signature such as `"89504e47"`
    pub fn from_hex(hex_magic: &str) -> Result<Self> {
        let magic = hex::decode(hex_magic.trim())
            .map_err(|e| anyhow::anyhow!("Invalid hex signature {:?}: {}", hex_magic, e))?;
        Ok(Self::new(magic))
    }

    pub fn len(&self) -> usize {
        self.magic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magic.is_empty()
    }
}

#[async_trait]
impl Predicate for MagicPrefix {
    async fn validate(&self, head: Bytes) -> Result<bool> {
        Ok(head.starts_with(&self.magic))
    }
}

/// Passes when a byte regex matches anywhere in the leading bytes
#[derive(Debug, Clone)]
pub struct HeadPattern {
    pattern: Regex,
}

impl HeadPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)?;
        Ok(Self { pattern })
    }
}

#[async_trait]
impl Predicate for HeadPattern {
    async fn validate(&self, head: Bytes) -> Result<bool> {
        Ok(self.pattern.is_match(&head))
    }
}
