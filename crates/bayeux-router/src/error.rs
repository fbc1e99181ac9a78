//! Router error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("payload decode error: {0}")]
    Decode(#[from] bayeux_core::Error),

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),
}
