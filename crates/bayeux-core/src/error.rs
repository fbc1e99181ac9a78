//! Error types for the Bayeux core

use thiserror::Error;

/// Result type alias for Bayeux core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bayeux core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unexpected character while scanning JSON text
    #[error("unknown char '{ch}' at position {pos}: {text}")]
    Parse { ch: char, pos: usize, text: String },

    /// Input ended in the middle of a value
    #[error("unexpected end of input at position {pos}")]
    UnexpectedEnd { pos: usize },

    /// Digit run that does not form a valid number
    #[error("invalid number literal: {0}")]
    InvalidNumber(String),
}
