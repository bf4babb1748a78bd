//! # dualsub
//!
//! `dualsub` consumes messages from a Redis broker through two delivery
//! mechanisms at once: broadcast pub/sub on a channel, and a persistent work
//! queue drained with blocking pops. Every consumed message gets a global
//! receipt number, whichever mechanism delivered it.
//!
//! ## Core Modules
//!
//! - `broker`: the `MessageBroker` seam, with Redis and in-memory implementations
//!   and the startup retry policy.
//! - `codec`: decoding and encoding of the JSON wire payload.
//! - `config`: loading settings from `config/default` and the environment.
//! - `publisher`: a companion publisher for feeding a running subscriber.
//! - `subscriber`: the listeners, the receipt counter and shutdown coordination.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod codec;
pub mod config;
pub mod publisher;
pub mod subscriber;
pub mod utils;
