use crate::simulation::SimulationSettings;
use crate::tasks::TaskOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Load `KEY=value` pairs from `.env` in the working directory.
///
/// Variables already present in the environment win. Values may be quoted
/// but don't have to be. Returns how many variables were set.
pub fn load_dotenv() -> usize {
    let env_path = Path::new(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return 0;
    };

    let mut loaded = 0;
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = unquote(value.trim());

        if std::env::var_os(key).is_none() {
            // SAFETY: called from main before the tokio runtime spawns workers
            unsafe { std::env::set_var(key, value) };
            loaded += 1;
        }
    }
    loaded
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Daemon configuration, read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mailbox_capacity: usize,
    pub pull_interval_ms: u64,
    pub low_battery_threshold: u8,
    pub wake_lock_permitted: bool,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub battery_tick_ms: u64,
    pub battery_start_level: u8,
    pub phone_event_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox_capacity: 32,
            pull_interval_ms: 1000,
            low_battery_threshold: 20,
            wake_lock_permitted: false,
            simulation: SimulationConfig {
                battery_tick_ms: 2000,
                battery_start_level: 30,
                phone_event_interval_ms: 10_000,
            },
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(capacity) = env_parse::<usize>("SENSOR_MAILBOX_CAPACITY")
            && capacity > 0
        {
            config.mailbox_capacity = capacity;
        }
        if let Some(ms) = env_parse::<u64>("SENSOR_PULL_INTERVAL_MS")
            && ms > 0
        {
            config.pull_interval_ms = ms;
        }
        if let Some(threshold) = env_parse::<u8>("SENSOR_LOW_BATTERY_THRESHOLD")
            && threshold <= 100
        {
            config.low_battery_threshold = threshold;
        }
        if let Ok(permitted) = std::env::var("SENSOR_WAKE_LOCK_PERMITTED") {
            config.wake_lock_permitted =
                matches!(permitted.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        // Simulated drivers
        if let Some(ms) = env_parse("SENSOR_SIM_BATTERY_TICK_MS") {
            config.simulation.battery_tick_ms = ms;
        }
        if let Some(level) = env_parse::<u8>("SENSOR_SIM_BATTERY_START_LEVEL") {
            config.simulation.battery_start_level = level.min(100);
        }
        if let Some(ms) = env_parse("SENSOR_SIM_PHONE_INTERVAL_MS") {
            config.simulation.phone_event_interval_ms = ms;
        }

        config
    }

    pub fn task_options(&self) -> TaskOptions {
        TaskOptions {
            mailbox_capacity: self.mailbox_capacity,
            default_pull_interval: Duration::from_millis(self.pull_interval_ms),
        }
    }

    pub fn simulation_settings(&self) -> SimulationSettings {
        SimulationSettings {
            pull_interval: Duration::from_millis(self.pull_interval_ms),
            battery_tick: Duration::from_millis(self.simulation.battery_tick_ms.max(1)),
            battery_start_level: self.simulation.battery_start_level,
            low_battery_threshold: self.low_battery_threshold,
            phone_event_interval: Duration::from_millis(
                self.simulation.phone_event_interval_ms.max(1),
            ),
        }
    }
}
