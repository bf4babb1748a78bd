//! Companion publisher used to feed a running subscriber.
//!
//! Generates a message every interval and sends it through whichever
//! mechanisms the pattern selects: a broadcast on the channel, a push onto
//! the list, or both.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::broker::MessageBroker;
use crate::codec::{Message, encode};
use crate::config::{Pattern, Settings};
use crate::subscriber::ShutdownListener;
use crate::utils::error::BrokerError;

/// Pause after a failed publish before the next message.
const ERROR_PAUSE: Duration = Duration::from_secs(1);

pub struct Publisher<B: MessageBroker> {
    broker: Arc<B>,
    pattern: Pattern,
    channel: String,
    queue: String,
    sender: String,
    interval: Duration,
    created: u64,
}

impl<B: MessageBroker> Publisher<B> {
    pub fn new(broker: Arc<B>, settings: &Settings) -> Self {
        Self {
            broker,
            pattern: settings.pattern.clone(),
            channel: settings.redis.channel.clone(),
            queue: settings.redis.queue.clone(),
            sender: settings.publish.sender.clone(),
            interval: settings.publish.interval,
            created: 0,
        }
    }

    /// Builds the next message; its `sequence` counts from 1.
    pub fn next_message(&mut self) -> Message {
        self.created += 1;
        Message {
            id: Uuid::new_v4().to_string(),
            timestamp: Local::now().fixed_offset(),
            body: format!("Hello from Rust #{}", self.created),
            sender: self.sender.clone(),
            sequence: i64::try_from(self.created).unwrap_or(i64::MAX),
        }
    }

    /// Sends one message through every mechanism the pattern selects.
    pub async fn publish(&self, message: &Message) -> Result<(), BrokerError> {
        let payload = encode(message);

        if self.pattern.includes_pubsub() {
            let receivers = self.broker.publish(&self.channel, &payload).await?;
            info!(
                "Published to channel '{}' ({} subscribers): {}",
                self.channel, receivers, message.body
            );
        }

        if self.pattern.includes_queue() {
            let len = self.broker.push(&self.queue, &payload).await?;
            info!(
                "Pushed to queue '{}' (length: {}): {}",
                self.queue, len, message.body
            );
        }

        Ok(())
    }

    /// Publishes until cancelled or, with `limit`, until that many messages
    /// have been created. Returns the number created.
    pub async fn run(mut self, limit: Option<u64>, mut shutdown: ShutdownListener) -> u64 {
        info!(
            "Starting publisher: pattern '{}', interval {:?}",
            self.pattern, self.interval
        );
        if let Pattern::Unrecognized(raw) = &self.pattern {
            warn!("Unrecognized pattern '{}'; messages will not be sent anywhere", raw);
        }

        while !shutdown.is_cancelled() && limit.is_none_or(|max| self.created < max) {
            let message = self.next_message();
            let pause = match self.publish(&message).await {
                Ok(()) => self.interval,
                Err(err) => {
                    error!("Failed to publish message: {}", err);
                    ERROR_PAUSE
                }
            };

            if limit.is_some_and(|max| self.created >= max) {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }

        info!("Publisher stopped. Total messages sent: {}", self.created);
        self.created
    }
}
