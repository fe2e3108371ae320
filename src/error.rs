//! Error types shared across the crate.

use std::io;
use thiserror::Error;

/// Errors produced by track operations and file parsing.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A structural precondition (sortedness, monotonic offsets, matching
    /// lengths) was violated. Always a caller bug, never repaired.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// A requested slice, scale or extraction falls outside a signal's
    /// declared domain.
    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Unsupported orientation: {0}")]
    UnsupportedOrientation(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    pub fn invariant(message: impl Into<String>) -> Self {
        TrackError::Invariant(message.into())
    }

    pub fn domain(message: impl Into<String>) -> Self {
        TrackError::Domain(message.into())
    }
}
