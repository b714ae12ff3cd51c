use clap::Parser;
use client::config::ClientConfig;
use shared::DEFAULT_TICK_RATE;
use client::input::ScriptedInput;
use client::network::Client;
use client::render::LogRenderer;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// How far behind server time remote entities are drawn
    #[arg(long, default_value = "200")]
    render_delay_ms: u64,

    /// Number of snapshots kept for interpolation
    #[arg(long, default_value = "120")]
    snapshot_capacity: usize,

    /// Batch outgoing commands over this many milliseconds (0 sends each immediately)
    #[arg(long, default_value = "0")]
    send_interval_ms: u64,

    /// Disable client-side prediction
    #[arg(long)]
    no_prediction: bool,

    /// Disable interpolation of remote entities
    #[arg(long)]
    no_interpolation: bool,

    /// Stop after this many seconds (0 runs until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration_secs: u64,

    /// Alternately flip prediction and interpolation every this many seconds (0 never)
    #[arg(long, default_value = "0")]
    toggle_every_secs: u64,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        ClientConfig {
            server_addr: args.server,
            fake_ping: Duration::from_millis(args.fake_ping),
            render_delay: Duration::from_millis(args.render_delay_ms),
            snapshot_capacity: args.snapshot_capacity,
            send_interval: Duration::from_millis(args.send_interval_ms),
            prediction: !args.no_prediction,
            interpolation: !args.no_interpolation,
            run_for: (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let toggle_every = args
        .toggle_every_secs
        .saturating_mul(u64::from(DEFAULT_TICK_RATE));
    let config = ClientConfig::from(args);

    info!("Starting client...");
    if !config.fake_ping.is_zero() {
        info!("Simulating {}ms latency", config.fake_ping.as_millis());
    }
    info!(
        "Prediction: {}, interpolation: {}",
        config.prediction, config.interpolation
    );

    let mut client = Client::connect(
        config,
        Box::new(ScriptedInput::default().with_toggle_every(toggle_every)),
        Box::new(LogRenderer::default()),
    )
    .await?;

    tokio::select! {
        result = client.run() => {
            let exit = result?;
            info!("Exited: {:?}", exit);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C");
        }
    }

    Ok(())
}
