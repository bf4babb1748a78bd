//! The `subscriber` module is the concurrent consumption core.
//!
//! A [`Subscriber`] owns the broker handle, the receipt counter and the
//! cancellation signal. [`Subscriber::run`] starts the listeners chosen by
//! the pattern as tasks in one `JoinSet`, waits for cancellation, joins every
//! listener, and only then lets go of the broker connection.

pub mod counter;
pub mod dispatch;
pub mod pubsub;
pub mod queue;
pub mod shutdown;

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broker::MessageBroker;
use crate::config::{Pattern, QueueSettings, Settings};

pub use counter::ReceiptCounter;
pub use dispatch::{Dispatcher, Receipt, ReceiptSink, Source, StdoutSink};
pub use pubsub::run_pubsub_listener;
pub use queue::run_queue_listener;
pub use shutdown::{
    Shutdown, ShutdownListener, ShutdownReason, trigger_on_signals, wait_for_signal,
};

/// Why a listener returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Cancelled,
    SubscriptionFailed,
    StreamClosed,
}

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberReport {
    /// Final value of the receipt counter.
    pub received: u64,
    /// One entry per listener that was started, in join order.
    pub exits: Vec<(Source, ListenerExit)>,
    /// Whether the broker handle was released after the join.
    pub connection_closed: bool,
}

pub struct Subscriber<B: MessageBroker> {
    broker: Arc<B>,
    pattern: Pattern,
    channel: String,
    queue: String,
    queue_settings: QueueSettings,
    counter: Arc<ReceiptCounter>,
    sink: Arc<dyn ReceiptSink>,
    shutdown: Shutdown,
}

impl<B: MessageBroker> Subscriber<B> {
    /// Takes ownership of an already connected broker.
    pub fn new(broker: B, settings: &Settings) -> Self {
        Self {
            broker: Arc::new(broker),
            pattern: settings.pattern.clone(),
            channel: settings.redis.channel.clone(),
            queue: settings.redis.queue.clone(),
            queue_settings: settings.queue.clone(),
            counter: Arc::new(ReceiptCounter::new()),
            sink: Arc::new(StdoutSink),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_sink(mut self, sink: impl ReceiptSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Handle for cancelling a running subscriber from elsewhere.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn counter(&self) -> Arc<ReceiptCounter> {
        self.counter.clone()
    }

    /// Runs until the shutdown handle is triggered.
    ///
    /// Order after cancellation is fixed: join all listeners, release the
    /// broker, report the count.
    pub async fn run(self) -> SubscriberReport {
        let Subscriber {
            broker,
            pattern,
            channel,
            queue,
            queue_settings,
            counter,
            sink,
            shutdown,
        } = self;

        info!(addr = %broker.addr(), "Starting subscriber with pattern '{}'", pattern);

        let dispatcher = Dispatcher::new(counter.clone(), sink);
        let mut listeners = JoinSet::new();

        if pattern.includes_pubsub() {
            let broker = broker.clone();
            let dispatcher = dispatcher.clone();
            let listener = shutdown.listener();
            listeners.spawn(async move {
                let exit = run_pubsub_listener(broker, channel, dispatcher, listener).await;
                (Source::PubSub, exit)
            });
        }

        if pattern.includes_queue() {
            let broker = broker.clone();
            let dispatcher = dispatcher.clone();
            let listener = shutdown.listener();
            listeners.spawn(async move {
                let exit =
                    run_queue_listener(broker, queue, queue_settings, dispatcher, listener).await;
                (Source::Queue, exit)
            });
        }

        if let Pattern::Unrecognized(raw) = &pattern {
            warn!(
                "Unrecognized pattern '{}' (expected pubsub, queue or both); no listener started",
                raw
            );
        }

        drop(dispatcher);

        shutdown.listener().cancelled().await;

        let mut exits = Vec::with_capacity(listeners.len());
        while let Some(joined) = listeners.join_next().await {
            match joined {
                Ok((source, exit)) => {
                    debug!(source = %source, ?exit, "Listener exited");
                    exits.push((source, exit));
                }
                Err(err) => error!("Listener task failed: {}", err),
            }
        }

        // Every listener's handle is gone now, so this is the last owner
        let connection_closed = match Arc::try_unwrap(broker) {
            Ok(broker) => {
                let addr = broker.addr().to_string();
                drop(broker);
                info!(addr = %addr, "Broker connection closed");
                true
            }
            Err(_) => {
                warn!("Broker connection still shared after shutdown; not closing it here");
                false
            }
        };

        let received = counter.current();
        info!("Subscriber stopped. Total messages received: {}", received);

        SubscriberReport {
            received,
            exits,
            connection_closed,
        }
    }
}
