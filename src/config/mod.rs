mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};
use std::time::Duration;

pub use settings::{
    ConnectSettings, LogSettings, Pattern, PublishSettings, QueueSettings, RedisSettings, Settings,
};

/// Loads the configuration from the default file and environment variables.
///
/// `config/default` is optional; environment variables use `_` as the
/// nesting separator. Anything left unspecified keeps its default.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let redis = partial.redis;
    let connect = partial.connect;
    let queue = partial.queue;
    let publish = partial.publish;

    Settings {
        redis: RedisSettings {
            host: redis
                .as_ref()
                .and_then(|r| r.host.clone())
                .unwrap_or(default.redis.host),
            port: redis
                .as_ref()
                .and_then(|r| r.port)
                .unwrap_or(default.redis.port),
            db: redis
                .as_ref()
                .and_then(|r| r.db)
                .unwrap_or(default.redis.db),
            channel: redis
                .as_ref()
                .and_then(|r| r.channel.clone())
                .unwrap_or(default.redis.channel),
            queue: redis
                .as_ref()
                .and_then(|r| r.queue.clone())
                .unwrap_or(default.redis.queue),
        },
        pattern: partial
            .pattern
            .map(|p| Pattern::from(p.as_str()))
            .unwrap_or(default.pattern),
        connect: ConnectSettings {
            attempts: connect
                .as_ref()
                .and_then(|c| c.attempts)
                .unwrap_or(default.connect.attempts),
            delay: connect
                .as_ref()
                .and_then(|c| c.delay)
                .map(Duration::from_secs)
                .unwrap_or(default.connect.delay),
            timeout: connect
                .as_ref()
                .and_then(|c| c.timeout)
                .map(Duration::from_secs)
                .unwrap_or(default.connect.timeout),
        },
        queue: QueueSettings {
            // BLPOP treats 0 as "block forever", which would hang shutdown
            pop_timeout: queue
                .as_ref()
                .and_then(|q| q.timeout)
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or(default.queue.pop_timeout),
            backoff: queue
                .as_ref()
                .and_then(|q| q.backoff)
                .map(Duration::from_secs)
                .unwrap_or(default.queue.backoff),
        },
        publish: PublishSettings {
            interval: publish
                .as_ref()
                .and_then(|p| p.interval)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .unwrap_or(default.publish.interval),
            sender: publish
                .as_ref()
                .and_then(|p| p.sender.clone())
                .unwrap_or(default.publish.sender),
        },
        log: LogSettings {
            level: partial
                .log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    }
}
