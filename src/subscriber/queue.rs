use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use super::ListenerExit;
use super::dispatch::{Dispatcher, Source};
use super::shutdown::ShutdownListener;
use crate::broker::MessageBroker;
use crate::config::QueueSettings;

/// Queue listener.
///
/// Cancellation is checked between pops, so it is noticed at most one pop
/// timeout late. Broker errors are retried forever after a back-off; only
/// cancellation ends the loop.
pub async fn run_queue_listener<B: MessageBroker>(
    broker: Arc<B>,
    queue: String,
    settings: QueueSettings,
    dispatcher: Dispatcher,
    mut shutdown: ShutdownListener,
) -> ListenerExit {
    info!("Starting queue subscriber on list '{}'", queue);

    loop {
        if shutdown.is_cancelled() {
            info!("Queue subscriber shutting down");
            return ListenerExit::Cancelled;
        }

        // Never raced against cancellation: a pop the broker has already
        // served must reach the dispatcher.
        match broker.blocking_pop(&queue, settings.pop_timeout).await {
            Ok(Some(payload)) => {
                dispatcher.dispatch(&payload, Source::Queue);
            }
            Ok(None) => {}
            Err(err) => {
                warn!("Error in BLPOP on '{}': {}", queue, err);
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = sleep(settings.backoff) => {}
                }
            }
        }
    }
}
