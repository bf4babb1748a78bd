//! The `codec` module turns broker payloads into [`Message`] records and back.
//!
//! Decoding is all-or-nothing: a payload either yields a complete `Message`
//! or a [`DecodeError`]. The one leniency is the timestamp, which falls back
//! to the current local time when it cannot be read.

pub mod message;

pub use message::{Message, decode, encode};

pub use crate::utils::error::DecodeError;
