//! The `error` module defines the error types used within `dualsub`.
//!
//! Each layer owns one enum: the codec reports [`DecodeError`], broker calls
//! report [`BrokerError`], startup reports [`ConnectionError`], and the binary
//! folds all of them into [`Error`].

use thiserror::Error;

/// A payload that could not be turned into a complete `Message`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A failed call against the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("broker call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Startup could not reach the broker.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {addr} after {attempts} attempts: {last}")]
    Exhausted {
        addr: String,
        attempts: u32,
        last: BrokerError,
    },
}

/// Top-level error returned by the binary's entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
