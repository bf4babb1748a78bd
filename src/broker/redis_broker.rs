//! Redis-backed [`MessageBroker`].
//!
//! Queue and publish calls share one `ConnectionManager`, which reconnects
//! on its own after a dropped connection. Every channel subscription gets a
//! dedicated pub/sub connection that is closed when the subscription stream
//! is dropped.
//!
//! The manager never retries on its own: [`connect_with_retry`] is the only
//! retry policy, so each attempt is a single dial and `PING` and a failure
//! reports its real cause.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, info};

use super::{MessageBroker, Subscription, connect_with_retry};
use crate::config::{ConnectSettings, RedisSettings};
use crate::utils::error::{BrokerError, ConnectionError};

/// How long past the BLPOP timeout a silent server is waited on before the
/// pop fails.
pub const POP_GRACE: Duration = Duration::from_secs(2);

pub struct RedisBroker {
    client: Client,
    conn: ConnectionManager,
    addr: String,
}

impl RedisBroker {
    /// Connects and verifies the server with `PING`, retrying per `policy`.
    pub async fn connect(
        settings: &RedisSettings,
        policy: &ConnectSettings,
    ) -> Result<Self, ConnectionError> {
        let addr = settings.addr();
        let url = settings.url();

        let broker =
            connect_with_retry(&addr, policy, || Self::open(url.clone(), addr.clone())).await?;

        info!(addr = %broker.addr, "Connected to Redis");
        Ok(broker)
    }

    async fn open(url: String, addr: String) -> Result<Self, BrokerError> {
        let client = Client::open(url)?;
        let config = ConnectionManagerConfig::new().set_number_of_retries(0);
        let mut conn = ConnectionManager::new_with_config(client.clone(), config).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(addr = %addr, reply = %pong, "Redis answered PING");

        Ok(Self { client, conn, addr })
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        // Resolves after the server's subscribe acknowledgement
        pubsub.subscribe(channel).await?;

        Ok(pubsub
            .into_on_message()
            .map(|msg| msg.get_payload_bytes().to_vec())
            .boxed())
    }

    async fn blocking_pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        let mut conn = self.conn.clone();
        let deadline = timeout + POP_GRACE;
        let pop = conn.blpop(queue, timeout.as_secs_f64());
        let popped: Option<(String, Vec<u8>)> = tokio::time::timeout(deadline, pop)
            .await
            .map_err(|_| BrokerError::Timeout(deadline))??;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(channel, payload.to_vec()).await?;
        Ok(receivers)
    }

    async fn push(&self, queue: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        let mut conn = self.conn.clone();
        let len: usize = conn.rpush(queue, payload.to_vec()).await?;
        Ok(len)
    }
}
