use clap::Parser;
use log::{error, info};
use server::command_queue::DrainPolicy;
use server::config::ServerConfig;
use server::network::Server;
use shared::MovementPolicy;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=1000))]
    tick_rate: u32,

    /// Snapshots broadcast per second
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..=1000))]
    broadcast_rate: u32,

    /// Simulation backlog above this many milliseconds is dropped
    #[arg(long, default_value = "250")]
    max_lag_ms: u64,

    /// Maximum concurrent clients
    #[arg(long, default_value = "32")]
    max_clients: usize,

    /// Commands buffered per client before the oldest are dropped
    #[arg(long, default_value = "120")]
    max_pending_commands: usize,

    /// Commands applied per tick: one-per-tick, drain-all or coalesce-first
    #[arg(long, default_value = "one-per-tick")]
    drain_policy: DrainPolicy,

    /// Movement model: discrete or acceleration
    #[arg(long, default_value = "discrete")]
    movement: MovementPolicy,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_rate: args.tick_rate,
            broadcast_rate: args.broadcast_rate,
            max_lag: Duration::from_millis(args.max_lag_ms),
            max_clients: args.max_clients,
            max_pending_commands: args.max_pending_commands,
            drain_policy: args.drain_policy,
            movement_policy: args.movement,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(Args::parse());
    let server = Server::bind(config).await?;
    let shutdown = server.shutdown_handle();
    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => info!("Server stopped"),
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C");
            shutdown.shutdown();
        }
    }

    if let Err(e) = server_task.await? {
        error!("Server error during shutdown: {}", e);
    }

    Ok(())
}
