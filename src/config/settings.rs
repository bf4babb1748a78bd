use serde::Deserialize;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration settings for the application.
///
/// Groups the broker location, the listener selection, and the timing knobs
/// for startup, queue polling and the companion publisher.
#[derive(Debug, Clone)]
pub struct Settings {
    pub redis: RedisSettings,
    pub pattern: Pattern,
    pub connect: ConnectSettings,
    pub queue: QueueSettings,
    pub publish: PublishSettings,
    pub log: LogSettings,
}

/// Where the broker lives and which channel/list carry messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub channel: String,
    pub queue: String,
}

impl RedisSettings {
    /// `host:port`, as shown in log lines.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Startup retry policy for reaching the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSettings {
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

/// Queue listener timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Timeout passed to each blocking pop; bounds shutdown latency.
    pub pop_timeout: Duration,
    /// Pause after a failed pop before trying again.
    pub backoff: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishSettings {
    pub interval: Duration,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

/// Which delivery mechanisms are active.
///
/// Values other than `pubsub`, `queue` and `both` are kept verbatim as
/// `Unrecognized`; such a pattern selects no listener at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    PubSub,
    Queue,
    Both,
    Unrecognized(String),
}

impl Pattern {
    pub fn includes_pubsub(&self) -> bool {
        matches!(self, Pattern::PubSub | Pattern::Both)
    }

    pub fn includes_queue(&self) -> bool {
        matches!(self, Pattern::Queue | Pattern::Both)
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        match s {
            "pubsub" => Pattern::PubSub,
            "queue" => Pattern::Queue,
            "both" => Pattern::Both,
            other => Pattern::Unrecognized(other.to_string()),
        }
    }
}

impl FromStr for Pattern {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Pattern::from(s))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::PubSub => f.write_str("pubsub"),
            Pattern::Queue => f.write_str("queue"),
            Pattern::Both => f.write_str("both"),
            Pattern::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Field names are single words because `_` doubles as the nesting
/// separator for environment variables (`REDIS_HOST` -> `redis.host`).
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub redis: Option<PartialRedisSettings>,
    pub pattern: Option<String>,
    pub connect: Option<PartialConnectSettings>,
    pub queue: Option<PartialQueueSettings>,
    pub publish: Option<PartialPublishSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRedisSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub channel: Option<String>,
    pub queue: Option<String>,
}

/// Durations are whole seconds.
#[derive(Debug, Deserialize)]
pub struct PartialConnectSettings {
    pub attempts: Option<u32>,
    pub delay: Option<u64>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialQueueSettings {
    pub timeout: Option<u64>,
    pub backoff: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPublishSettings {
    /// Seconds, fractional values allowed.
    pub interval: Option<f64>,
    pub sender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            redis: RedisSettings {
                host: "localhost".to_string(),
                port: 6379,
                db: 0,
                channel: "messages".to_string(),
                queue: "message_queue".to_string(),
            },
            pattern: Pattern::Both,
            connect: ConnectSettings {
                attempts: 5,
                delay: Duration::from_secs(5),
                timeout: Duration::from_secs(5),
            },
            queue: QueueSettings {
                pop_timeout: Duration::from_secs(1),
                backoff: Duration::from_secs(1),
            },
            publish: PublishSettings {
                interval: Duration::from_secs(2),
                sender: "rust-publisher".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
