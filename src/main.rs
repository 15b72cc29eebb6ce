//! Sensor manager daemon.
//!
//! Runs the manager against the simulated drivers and logs every sample it
//! receives as JSON.
//!
//! Usage:
//!   cargo run -- --sensors accelerometer,battery --adaptive --run-for 30

use clap::Parser;
use log::{error, info, warn};
use sensor_manager::config::{Config, load_dotenv};
use sensor_manager::power::StaticPermissions;
use sensor_manager::sensors::{
    GlobalConfig, SensorCategory, SensorConfig, SensorData, SensorDataListener,
};
use sensor_manager::simulation::simulated_drivers;
use sensor_manager::{Result, SensorManager, SensorType};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::signal;

#[derive(Parser)]
#[command(name = "sensor-manager")]
#[command(about = "Sensor subscription daemon running on simulated drivers")]
struct Cli {
    /// Sensors to subscribe to
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "accelerometer,battery,phone_state"
    )]
    sensors: Vec<SensorType>,

    /// Enable adaptive sensing on pull sensors
    #[arg(long)]
    adaptive: bool,

    /// Hold the wake lock while running
    #[arg(long)]
    wake_lock: bool,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    run_for: Option<u64>,

    /// Override SENSOR_PULL_INTERVAL_MS
    #[arg(long, env = "SENSOR_PULL_INTERVAL_MS")]
    pull_interval_ms: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Logs each delivery as a JSON line.
struct JsonLogListener {
    sensor_type: SensorType,
}

impl SensorDataListener for JsonLogListener {
    fn on_data_sensed(&self, data: &SensorData) {
        match serde_json::to_string(data) {
            Ok(json) => info!("[{}] {}", self.sensor_type, json),
            Err(e) => warn!("[{}] Unserializable sample: {}", self.sensor_type, e),
        }
    }

    fn on_crossing_low_battery_threshold(&self, is_below_threshold: bool) {
        info!(
            "[{}] Battery {} low threshold",
            self.sensor_type,
            if is_below_threshold { "dropped below" } else { "recovered above" }
        );
    }
}

fn main() {
    load_dotenv();
    let cli = Cli::parse();
    init_logger();

    let mut config = Config::from_env();
    if let Some(ms) = cli.pull_interval_ms
        && ms > 0
    {
        config.pull_interval_ms = ms;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli, config)) {
        error!("Sensor manager failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    info!("Starting sensor manager");
    info!("Configuration loaded:");
    info!("  Mailbox capacity: {}", config.mailbox_capacity);
    info!("  Pull interval: {}ms", config.pull_interval_ms);
    info!("  Low battery threshold: {}%", config.low_battery_threshold);
    info!("  Wake lock permitted: {}", config.wake_lock_permitted);

    let manager = SensorManager::builder(Handle::current())
        .with_sensors(simulated_drivers(
            Handle::current(),
            &config.simulation_settings(),
        ))
        .with_task_options(config.task_options())
        .with_permissions(Arc::new(StaticPermissions {
            wake_lock: config.wake_lock_permitted,
        }))
        .with_global_config(
            GlobalConfig::LOW_BATTERY_THRESHOLD,
            i64::from(config.low_battery_threshold),
        )
        .build()?;

    let mut subscriptions = Vec::new();
    for &sensor_type in &cli.sensors {
        match manager.subscribe(sensor_type, Arc::new(JsonLogListener { sensor_type })) {
            Ok(id) => subscriptions.push(id),
            Err(e) => warn!("Skipping {}: {}", sensor_type, e),
        }
    }

    let mut adaptive = Vec::new();
    if cli.adaptive {
        for sensor_type in manager.sensor_types().collect::<Vec<_>>() {
            if manager.sensor_category(sensor_type)? != SensorCategory::Pull {
                continue;
            }
            match manager.set_sensor_config(sensor_type, SensorConfig::ADAPTIVE_SENSING_ENABLED, true)
            {
                Ok(()) => adaptive.push(sensor_type),
                Err(e) => warn!("Adaptive sensing unavailable for {}: {}", sensor_type, e),
            }
        }
    }

    if cli.wake_lock
        && let Err(e) = manager.set_global_config(GlobalConfig::ACQUIRE_WAKE_LOCK, true)
    {
        warn!("Running without wake lock: {}", e);
    }

    info!("Sensor manager is running");
    info!("  - {} subscription(s)", subscriptions.len());
    info!("  - Press Ctrl+C to exit");

    match cli.run_for {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => info!("Run time elapsed"),
                _ = signal::ctrl_c() => info!("Received shutdown signal"),
            }
        }
        None => signal::ctrl_c().await?,
    }

    for id in subscriptions {
        manager.unsubscribe(id)?;
    }
    // Adaptive sensing keeps its pull sensors sampling
    for sensor_type in adaptive {
        manager.set_sensor_config(sensor_type, SensorConfig::ADAPTIVE_SENSING_ENABLED, false)?;
    }

    if manager.sensor_types().any(|t| t == SensorType::Accelerometer) {
        match manager.get_snapshot(SensorType::Accelerometer) {
            Ok(snapshot) => info!(
                "Final accelerometer snapshot: {}",
                serde_json::to_string(&snapshot)?
            ),
            Err(e) => warn!("No final accelerometer snapshot: {}", e),
        }
    }

    drop(manager);
    info!("Sensor manager stopped");
    Ok(())
}
