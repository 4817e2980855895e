use clap::Parser;
use log::{error, info};
use reolink_motion_bridge::config::{self, Config};
use reolink_motion_bridge::MotionBridge;
use std::path::PathBuf;
use tokio::signal;

/// Bridge Reolink motion detection to a motion sensor and an MQTT topic.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Accessory config JSON file.
    #[arg(long, env = "REOLINK_BRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Load .env before the runtime starts any threads
    config::load_dotenv(".env");
    init_logger();

    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> reolink_motion_bridge::Result<()> {
    info!("Starting Reolink Motion Bridge");

    let config = Config::load(args.config.as_deref())?;
    let bridge = MotionBridge::new(config)?;

    let config = bridge.config();
    info!("Configuration loaded:");
    info!("  Name: {}", config.name);
    info!("  Camera: {} (channel {})", config.camera.host, config.camera.channel);
    info!("  Poll interval: {} ms", config.poll.interval_ms);
    info!("  MQTT broker: {}", config.mqtt.broker);
    info!("  MQTT topic: {}", config.mqtt.topic);

    let handle = bridge.start()?;

    // Stand-in for the home-automation host: log every pushed change
    let sensor = handle.sensor();
    let mut changes = sensor.subscribe();
    let watcher = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let detected = *changes.borrow_and_update();
            info!(
                "[Sensor] {} ({} {}): motion {}",
                sensor.info().name,
                sensor.info().manufacturer,
                sensor.info().model,
                if detected { "detected" } else { "cleared" }
            );
        }
    });

    info!("Reolink Motion Bridge is running, press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    handle.shutdown().await;
    watcher.abort();

    info!("Reolink Motion Bridge stopped");
    Ok(())
}
