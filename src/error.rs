//! Library error type.
//!
//! Gateway implementations speak `anyhow`; everything above the gateway
//! returns [`NumeraiError`] so callers can tell bad input apart from a
//! failing tournament API.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NumeraiError {
    /// Caller supplied a value the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Input is well-formed but not supported yet.
    #[error("{0} not yet implemented")]
    NotImplemented(String),

    /// Anything raised by the gateway: network, auth, malformed response.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl NumeraiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        NumeraiError::InvalidArgument(msg.into())
    }

    /// Build an upstream error for a response that lacks something we need.
    pub fn malformed(msg: impl Into<String>) -> Self {
        NumeraiError::Upstream(anyhow::anyhow!("malformed response: {}", msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, NumeraiError>;
