//! The `utils` module provides shared definitions used across `dualsub`.
//!
//! It centralizes the error types every layer propagates and the logging
//! setup performed once by the binary.

pub mod error;
pub mod logging;
