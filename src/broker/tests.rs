use super::fake_server::FakeRedis;
use super::redis_broker::POP_GRACE;
use super::{InMemoryBroker, MessageBroker, RedisBroker, connect_with_retry};
use crate::config::ConnectSettings;
use crate::utils::error::{BrokerError, ConnectionError};
use futures::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

fn fast_policy(attempts: u32) -> ConnectSettings {
    ConnectSettings {
        attempts,
        delay: Duration::from_millis(20),
        timeout: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_retry_succeeds_on_later_attempt() {
    let calls = AtomicU32::new(0);

    let result = connect_with_retry("test:1", &fast_policy(5), || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n < 3 {
                Err(BrokerError::Unavailable("not yet".to_string()))
            } else {
                Ok(n)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_exhaustion_is_fatal() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let result: Result<(), _> = connect_with_retry("test:2", &fast_policy(5), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(BrokerError::Unavailable("down".to_string())) }
    })
    .await;

    let ConnectionError::Exhausted {
        addr,
        attempts,
        last,
    } = result.unwrap_err();
    assert_eq!(addr, "test:2");
    assert_eq!(attempts, 5);
    assert!(matches!(last, BrokerError::Unavailable(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    // Four delays between five attempts
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn test_unresponsive_attempt_times_out() {
    let result: Result<(), _> = connect_with_retry("test:3", &fast_policy(2), || async {
        std::future::pending::<Result<(), BrokerError>>().await
    })
    .await;

    let ConnectionError::Exhausted { attempts, last, .. } = result.unwrap_err();
    assert_eq!(attempts, 2);
    assert!(matches!(last, BrokerError::Timeout(d) if d == Duration::from_millis(50)));
}

#[tokio::test]
async fn test_zero_attempts_still_tries_once() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = connect_with_retry("test:4", &fast_policy(0), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(BrokerError::Unavailable("down".to_string())) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_memory_publish_reaches_subscribers_only() {
    let broker = InMemoryBroker::new();

    // Nobody listening: dropped
    assert_eq!(broker.publish("messages", b"lost").await.unwrap(), 0);

    let mut sub = broker.subscribe("messages").await.unwrap();
    assert_eq!(broker.subscriber_count("messages"), 1);
    assert_eq!(broker.publish("messages", b"kept").await.unwrap(), 1);

    assert_eq!(sub.next().await.unwrap(), b"kept".to_vec());
}

#[tokio::test]
async fn test_memory_closed_channel_ends_stream() {
    let broker = InMemoryBroker::new();
    let mut sub = broker.subscribe("messages").await.unwrap();

    broker.close_channel("messages");
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn test_memory_refused_subscription() {
    let broker = InMemoryBroker::new();
    broker.refuse_subscriptions();
    assert!(broker.subscribe("messages").await.is_err());
}

#[tokio::test]
async fn test_memory_queue_is_fifo_and_persistent() {
    let broker = InMemoryBroker::new();
    broker.push("message_queue", b"first").await.unwrap();
    assert_eq!(broker.push("message_queue", b"second").await.unwrap(), 2);
    assert_eq!(broker.queue_len("message_queue"), 2);

    let timeout = Duration::from_millis(50);
    let first = broker.blocking_pop("message_queue", timeout).await.unwrap();
    let second = broker.blocking_pop("message_queue", timeout).await.unwrap();
    let empty = broker.blocking_pop("message_queue", timeout).await.unwrap();

    assert_eq!(first, Some(b"first".to_vec()));
    assert_eq!(second, Some(b"second".to_vec()));
    assert_eq!(empty, None);
    assert_eq!(broker.pop_calls(), 3);
}

#[tokio::test]
async fn test_memory_pop_wakes_on_push() {
    let broker = std::sync::Arc::new(InMemoryBroker::new());

    let popper = {
        let broker = broker.clone();
        tokio::spawn(async move {
            broker
                .blocking_pop("message_queue", Duration::from_secs(5))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    broker.push("message_queue", b"late").await.unwrap();

    let popped = popper.await.unwrap().unwrap();
    assert_eq!(popped, Some(b"late".to_vec()));
}

#[tokio::test]
async fn test_memory_injected_pop_failures() {
    let broker = InMemoryBroker::new();
    broker.fail_next_pops(2);
    broker.push("message_queue", b"payload").await.unwrap();

    let timeout = Duration::from_millis(10);
    assert!(broker.blocking_pop("message_queue", timeout).await.is_err());
    assert!(broker.blocking_pop("message_queue", timeout).await.is_err());
    assert_eq!(
        broker.blocking_pop("message_queue", timeout).await.unwrap(),
        Some(b"payload".to_vec())
    );
}

fn redis_policy() -> ConnectSettings {
    ConnectSettings {
        attempts: 1,
        delay: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_redis_connect_verifies_with_ping() {
    let server = FakeRedis::start().await;

    let broker = RedisBroker::connect(&server.settings(), &redis_policy())
        .await
        .unwrap();

    assert_eq!(broker.addr(), format!("127.0.0.1:{}", server.settings().port));
    assert!(server.commands().contains(&"PING".to_string()));
}

#[tokio::test]
async fn test_redis_refused_connection_fails_fast_with_cause() {
    // Bind then release a port so nothing listens on it
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut settings = crate::config::Settings::default().redis;
    settings.host = "127.0.0.1".to_string();
    settings.port = port;

    let started = Instant::now();
    let result = RedisBroker::connect(&settings, &redis_policy()).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    let Err(ConnectionError::Exhausted { attempts, last, .. }) = result else {
        panic!("connection to a closed port succeeded");
    };
    assert_eq!(attempts, 1);
    assert!(matches!(last, BrokerError::Redis(_)), "got {last}");
}

#[tokio::test]
async fn test_redis_blocking_pop_unpacks_payload_and_nil() {
    let server = FakeRedis::start().await;
    server.enqueue(b"payload");
    let broker = RedisBroker::connect(&server.settings(), &redis_policy())
        .await
        .unwrap();

    let timeout = Duration::from_secs(1);
    let first = broker.blocking_pop("message_queue", timeout).await.unwrap();
    let empty = broker.blocking_pop("message_queue", timeout).await.unwrap();

    assert_eq!(first, Some(b"payload".to_vec()));
    assert_eq!(empty, None);
}

#[tokio::test]
async fn test_redis_silent_pop_fails_after_grace() {
    let server = FakeRedis::start().await;
    let broker = RedisBroker::connect(&server.settings(), &redis_policy())
        .await
        .unwrap();
    server.go_silent_on_pop();

    let timeout = Duration::from_millis(100);
    let started = Instant::now();
    let result = broker.blocking_pop("message_queue", timeout).await;

    assert!(matches!(result, Err(BrokerError::Timeout(d)) if d == timeout + POP_GRACE));
    assert!(started.elapsed() < timeout + POP_GRACE + Duration::from_secs(1));
}

#[tokio::test]
async fn test_redis_publish_and_push_report_counts() {
    let server = FakeRedis::start().await;
    let broker = RedisBroker::connect(&server.settings(), &redis_policy())
        .await
        .unwrap();

    assert_eq!(broker.publish("messages", b"hello").await.unwrap(), 1);
    assert_eq!(broker.push("message_queue", b"hello").await.unwrap(), 1);

    let commands = server.commands();
    assert!(commands.contains(&"PUBLISH".to_string()));
    assert!(commands.contains(&"RPUSH".to_string()));
}

#[tokio::test]
async fn test_redis_subscribe_waits_for_ack_then_streams() {
    let server = FakeRedis::start().await;
    server.broadcast_on_subscribe(b"first");
    let broker = RedisBroker::connect(&server.settings(), &redis_policy())
        .await
        .unwrap();

    let mut sub = broker.subscribe("messages").await.unwrap();
    assert!(server.commands().contains(&"SUBSCRIBE".to_string()));

    let payload = tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .expect("no message after subscribe");
    assert_eq!(payload, Some(b"first".to_vec()));
}
