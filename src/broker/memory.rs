//! In-process [`MessageBroker`] with the same delivery semantics as Redis.
//!
//! Channels are tokio broadcast channels: a payload published while nobody
//! is subscribed is gone. Queues are FIFO lists that keep their items until
//! someone pops them. Faults can be injected to exercise the listeners'
//! error paths.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::time::{Instant, timeout_at};

use super::{MessageBroker, Subscription};
use crate::utils::error::BrokerError;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct InMemoryBroker {
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    pushed: Notify,
    refuse_subscriptions: AtomicBool,
    failing_pops: AtomicUsize,
    pop_calls: AtomicUsize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `subscribe` call fail.
    pub fn refuse_subscriptions(&self) {
        self.refuse_subscriptions.store(true, Ordering::SeqCst);
    }

    /// Makes the next `count` pops fail with `BrokerError::Unavailable`.
    pub fn fail_next_pops(&self, count: usize) {
        self.failing_pops.store(count, Ordering::SeqCst);
    }

    /// Drops a channel; its subscription streams end once drained.
    pub fn close_channel(&self, channel: &str) {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).remove(channel);
    }

    /// Items currently waiting in `queue`.
    pub fn queue_len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of `blocking_pop` calls made so far, failed ones included.
    pub fn pop_calls(&self) -> usize {
        self.pop_calls.load(Ordering::SeqCst)
    }

    fn pop_front(&self, queue: &str) -> Option<Vec<u8>> {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }

    fn take_failure(&self) -> bool {
        self.failing_pops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    fn addr(&self) -> &str {
        "in-memory"
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        if self.refuse_subscriptions.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(format!(
                "subscription to '{channel}' refused"
            )));
        }

        let rx = self
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        let stream = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn blocking_pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        self.pop_calls.fetch_add(1, Ordering::SeqCst);

        if self.take_failure() {
            return Err(BrokerError::Unavailable(format!("pop on '{queue}' failed")));
        }

        let deadline = Instant::now() + timeout;
        loop {
            // Registered before checking so a push in between still wakes us
            let notified = self.pushed.notified();

            if let Some(payload) = self.pop_front(queue) {
                return Ok(Some(payload));
            }

            if timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let receivers = channels
            .get(channel)
            .and_then(|tx| tx.send(payload.to_vec()).ok())
            .unwrap_or(0);
        Ok(receivers)
    }

    async fn push(&self, queue: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        let len = {
            let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
            let list = queues.entry(queue.to_string()).or_default();
            list.push_back(payload.to_vec());
            list.len()
        };
        self.pushed.notify_waiters();
        Ok(len)
    }
}
