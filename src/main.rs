//! CLI for dualsub
//!
//! Subcommands:
//! - `subscribe` (default): consume from the channel and/or the queue
//! - `publish`: generate messages for a running subscriber

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dualsub::broker::RedisBroker;
use dualsub::config::{Pattern, Settings, load_config};
use dualsub::publisher::Publisher;
use dualsub::subscriber::{Shutdown, Subscriber, trigger_on_signals};
use dualsub::utils::error::Result;
use dualsub::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dualsub", version, about = "Redis pub/sub and work-queue consumer")]
struct Cli {
    /// Overrides PATTERN: pubsub, queue or both
    #[arg(long, global = true)]
    pattern: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Consume messages until SIGINT/SIGTERM
    Subscribe,
    /// Publish a generated message every PUBLISH_INTERVAL seconds
    Publish {
        /// Stop after this many messages
        #[arg(long)]
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(pattern) = cli.pattern.as_deref() {
        settings.pattern = Pattern::from(pattern);
    }

    logging::init(&settings.log.level);

    let result = match cli.command.unwrap_or(Command::Subscribe) {
        Command::Subscribe => run_subscriber(settings).await,
        Command::Publish { count } => run_publisher(settings, count).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_subscriber(settings: Settings) -> Result<()> {
    info!("Starting subscriber...");
    info!("Pattern: {}", settings.pattern);

    // Fatal if the broker never answers; no listener is started
    let broker = RedisBroker::connect(&settings.redis, &settings.connect).await?;

    let subscriber = Subscriber::new(broker, &settings);
    tokio::spawn(trigger_on_signals(subscriber.shutdown_handle()));

    subscriber.run().await;
    Ok(())
}

async fn run_publisher(settings: Settings, count: Option<u64>) -> Result<()> {
    let broker = Arc::new(RedisBroker::connect(&settings.redis, &settings.connect).await?);

    let shutdown = Shutdown::new();
    tokio::spawn(trigger_on_signals(shutdown.clone()));

    Publisher::new(broker, &settings)
        .run(count, shutdown.listener())
        .await;
    Ok(())
}
