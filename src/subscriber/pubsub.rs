use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};

use super::ListenerExit;
use super::dispatch::{Dispatcher, Source};
use super::shutdown::ShutdownListener;
use crate::broker::MessageBroker;

/// Broadcast listener.
///
/// Waits for the subscription to be confirmed, then forwards every payload
/// until cancelled or until the broker ends the stream. A failed
/// subscription ends only this listener.
pub async fn run_pubsub_listener<B: MessageBroker>(
    broker: Arc<B>,
    channel: String,
    dispatcher: Dispatcher,
    mut shutdown: ShutdownListener,
) -> ListenerExit {
    info!("Starting pub-sub subscriber on channel '{}'", channel);

    let confirmed = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            info!("Pub-sub subscriber cancelled before subscribing");
            return ListenerExit::Cancelled;
        }
        result = broker.subscribe(&channel) => result,
    };

    let mut subscription = match confirmed {
        Ok(subscription) => subscription,
        Err(err) => {
            error!("Failed to confirm subscription to '{}': {}", channel, err);
            return ListenerExit::SubscriptionFailed;
        }
    };

    info!("Successfully subscribed to '{}' channel", channel);

    let exit = loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Pub-sub subscriber shutting down");
                break ListenerExit::Cancelled;
            }
            next = subscription.next() => match next {
                Some(payload) => {
                    dispatcher.dispatch(&payload, Source::PubSub);
                }
                None => {
                    warn!("Subscription to '{}' closed by the broker", channel);
                    break ListenerExit::StreamClosed;
                }
            },
        }
    };

    // Dropping the stream releases the subscription
    drop(subscription);
    exit
}
