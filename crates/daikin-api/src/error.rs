//! Error types reported by a Daikin client

use thiserror::Error;

/// Result type for client operations
pub type DaikinResult<T> = Result<T, DaikinError>;

/// Errors a Daikin client can report
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DaikinError {
    /// The unit did not answer in time
    #[error("timed out talking to Daikin unit")]
    Timeout,

    /// Transport-level failure (refused, unreachable, reset)
    #[error("connection failed: {0}")]
    Connection(String),

    /// The unit rejected the supplied key or password
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The unit does not implement this operation
    #[error("operation not supported by this unit: {0}")]
    Unsupported(&'static str),

    /// The unit answered with something the client could not use
    #[error("device error: {0}")]
    Device(String),
}

impl DaikinError {
    /// Whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, DaikinError::Timeout)
    }
}
