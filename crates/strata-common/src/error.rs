use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrataError {
    /// Unknown tag kind, malformed header or a tree that does not have the expected shape.
    #[error("Format error: {0}")]
    Format(String),
    /// The stream ended before a complete value was read.
    #[error("Truncated input: stream ended mid-value")]
    Truncated,
    /// Coordinates outside the chunk, section or region domain, or a reserved sector.
    #[error("Bounds error: {0}")]
    Bounds(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The allocator left the stream in a state it must never reach.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl StrataError {
    pub fn format(msg: impl Into<String>) -> Self {
        StrataError::Format(msg.into())
    }

    pub fn bounds(msg: impl Into<String>) -> Self {
        StrataError::Bounds(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        StrataError::InvariantViolation(msg.into())
    }

    /// Classifies an I/O error raised while decoding: running out of bytes is
    /// truncation, everything else passes through untouched.
    pub fn from_decode(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => StrataError::Truncated,
            io::ErrorKind::InvalidData => StrataError::Format(err.to_string()),
            _ => StrataError::Io(err),
        }
    }
}
