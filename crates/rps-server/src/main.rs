use std::time::Duration;

use clap::Parser;
use rps_server::{RpsError, RpsServer, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Real-time Rock-Paper-Scissors server
#[derive(Parser, Debug)]
#[command(name = "rps-server", version, about = "Real-time Rock-Paper-Scissors server")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "RPS_BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Messages buffered per connection before it is dropped
    #[arg(long, env = "RPS_OUTBOUND_CAPACITY", default_value_t = 256)]
    outbound_capacity: usize,

    /// Seconds between sweeps of idle games and queue entries
    #[arg(long, env = "RPS_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Seconds of inactivity after which a game is removed
    #[arg(long, env = "RPS_GAME_MAX_AGE_SECS", default_value_t = 3600)]
    game_max_age_secs: u64,

    /// Seconds a player may wait in the match queue
    #[arg(long, env = "RPS_QUEUE_MAX_WAIT_SECS", default_value_t = 300)]
    queue_max_wait_secs: u64,

    /// Seconds a new socket may take to finish the WebSocket upgrade
    #[arg(long, env = "RPS_HANDSHAKE_TIMEOUT_SECS", default_value_t = 10)]
    handshake_timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            bind_addr: args.bind,
            outbound_capacity: args.outbound_capacity,
            sweep_interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
            game_max_age: Duration::from_secs(args.game_max_age_secs),
            queue_max_wait: Duration::from_secs(args.queue_max_wait_secs),
            handshake_timeout: Duration::from_secs(args.handshake_timeout_secs.max(1)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), RpsError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from(Args::parse());
    tracing::info!(
        bind = %config.bind_addr,
        "rps-server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let server = RpsServer::builder().config(config).build().await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
