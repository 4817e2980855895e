//! Diagnostic binary for the camera motion query.
//!
//! Usage:
//!   cargo run --bin motion-probe -- --count 5
//!
//! Queries the camera's motion-detection state and logs each raw result.
//! Nothing is published to the broker.

use clap::Parser;
use log::{error, info, warn};
use reolink_motion_bridge::config::{self, Config};
use reolink_motion_bridge::input::ReolinkClient;

#[derive(Parser, Debug)]
#[command(about = "Query a Reolink camera's motion state")]
struct Args {
    /// Accessory config JSON file.
    #[arg(long, env = "REOLINK_BRIDGE_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Number of queries to run.
    #[arg(long, default_value_t = 1)]
    count: u32,
}

#[tokio::main]
async fn main() {
    config::load_dotenv(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if config.camera.host.is_empty() {
        error!("No camera address configured (cameraIp / REOLINK_CAMERA_IP)");
        std::process::exit(1);
    }

    let client = match ReolinkClient::new(&config.camera) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create camera client: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Querying {} channel {} ({} time(s))",
        client.endpoint(),
        client.channel(),
        args.count
    );

    for attempt in 1..=args.count {
        match client.query_motion_state().await {
            Ok(state) => info!("[{}] motion state: {:?} ({})", attempt, state, state.payload()),
            Err(e) if e.is_malformed() => warn!("[{}] unexpected response: {}", attempt, e),
            Err(e) => warn!("[{}] query failed: {}", attempt, e),
        }

        if attempt < args.count {
            tokio::time::sleep(config.poll.interval()).await;
        }
    }

    info!("Probe complete.");
}
