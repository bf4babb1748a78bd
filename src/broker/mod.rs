//! The `broker` module is the seam between the listeners and the message
//! broker they consume from.
//!
//! [`MessageBroker`] covers the four calls the system needs: subscribing to a
//! broadcast channel, popping from a list with a timeout, and the matching
//! publish/push calls used by the companion publisher. [`RedisBroker`] talks
//! to a real Redis server; [`InMemoryBroker`] mimics the same semantics with
//! tokio primitives.

pub mod connect;
#[cfg(test)]
pub(crate) mod fake_server;
pub mod memory;
pub mod redis_broker;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;

pub use crate::utils::error::BrokerError;
pub use connect::connect_with_retry;
pub use memory::InMemoryBroker;
pub use redis_broker::RedisBroker;

/// Raw payloads delivered on a confirmed channel subscription.
///
/// The stream ends when the underlying connection goes away. Dropping it
/// releases the subscription.
pub type Subscription = BoxStream<'static, Vec<u8>>;

#[async_trait]
pub trait MessageBroker: Send + Sync + 'static {
    /// `host:port` or another human-readable location, for logs.
    fn addr(&self) -> &str;

    /// Subscribes to `channel`, resolving only once the broker has
    /// acknowledged the subscription.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError>;

    /// Pops the head of `queue`, waiting up to `timeout` for one to arrive.
    /// `Ok(None)` means the wait timed out.
    async fn blocking_pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError>;

    /// Returns how many subscribers received the payload.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, BrokerError>;

    /// Appends to the tail of `queue`, returning the new length.
    async fn push(&self, queue: &str, payload: &[u8]) -> Result<usize, BrokerError>;
}

/// Lets a caller keep its own handle to a broker it hands to a subscriber.
#[async_trait]
impl<B: MessageBroker> MessageBroker for Arc<B> {
    fn addr(&self) -> &str {
        (**self).addr()
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        (**self).subscribe(channel).await
    }

    async fn blocking_pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        (**self).blocking_pop(queue, timeout).await
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        (**self).publish(channel, payload).await
    }

    async fn push(&self, queue: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        (**self).push(queue, payload).await
    }
}

#[cfg(test)]
mod tests;
