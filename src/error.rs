//! Error types for stream-gate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Downstream closed, {dropped} bytes not delivered")]
    DownstreamClosed { dropped: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;

/// Why a validation predicate did not produce a verdict.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Predicate(#[from] anyhow::Error),

    #[error("Validation predicate panicked: {0}")]
    Panicked(String),
}

impl ValidationError {
    /// Build from a panic payload caught while polling the predicate.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ValidationError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_messages() {
        let err = ValidationError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Validation predicate panicked: boom");

        let err = ValidationError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "Validation predicate panicked: owned");

        let err = ValidationError::from_panic(Box::new(42u32));
        assert!(matches!(err, ValidationError::Panicked(_)));
    }

    #[test]
    fn test_predicate_error_is_transparent() {
        let err = ValidationError::from(anyhow::anyhow!("bad header"));
        assert_eq!(err.to_string(), "bad header");
    }
}
