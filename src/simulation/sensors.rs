//! Simulated sensor drivers for development and testing.
//!
//! Provides an accelerometer (pull), a draining battery (push) and a
//! telephony event source (push), so the manager can run on hosts without
//! real sensors.

use crate::error::Result;
use crate::sensors::{
    ConfigStore, PhoneStateEvent, PullSensor, PushSensor, Sensor, SensorConfig, SensorData,
    SensorDriver, SensorPayload, SensorType,
};
use crate::tasks::PushSink;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::Rng;
use rand::seq::SliceRandom;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Tuning for the simulated drivers.
#[derive(Clone, Debug)]
pub struct SimulationSettings {
    pub pull_interval: Duration,
    pub battery_tick: Duration,
    pub battery_start_level: u8,
    pub low_battery_threshold: u8,
    pub phone_event_interval: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            pull_interval: Duration::from_secs(1),
            battery_tick: Duration::from_secs(2),
            battery_start_level: 30,
            low_battery_threshold: 20,
            phone_event_interval: Duration::from_secs(10),
        }
    }
}

/// All simulated drivers, ready to hand to the manager builder.
pub fn simulated_drivers(runtime: Handle, settings: &SimulationSettings) -> Vec<SensorDriver> {
    vec![
        SensorDriver::pull(SimulatedAccelerometer::new(settings.pull_interval)),
        SensorDriver::push(SimulatedBattery::new(runtime.clone(), settings)),
        SensorDriver::push(SimulatedPhoneState::new(
            runtime,
            settings.phone_event_interval,
        )),
    ]
}

/// Accelerometer resting flat, with occasional bursts of movement.
pub struct SimulatedAccelerometer {
    config: ConfigStore,
}

impl SimulatedAccelerometer {
    pub fn new(pull_interval: Duration) -> Self {
        Self {
            config: SensorConfig::pull_defaults(pull_interval.as_millis() as i64),
        }
    }

    fn window_len(&self) -> usize {
        let key = SensorConfig::SENSE_WINDOW_LENGTH_MILLIS;
        // One reading per 10ms of window
        let millis = self
            .config
            .get_integer(key)
            .unwrap_or(SensorConfig::DEFAULT_SENSE_WINDOW_MILLIS);
        (millis / 10).clamp(1, 500) as usize
    }
}

impl Sensor for SimulatedAccelerometer {
    fn sensor_type(&self) -> SensorType {
        SensorType::Accelerometer
    }

    fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl PullSensor for SimulatedAccelerometer {
    fn fetch(&self) -> Result<SensorData> {
        let mut rng = rand::thread_rng();
        let moving = rng.gen_bool(0.2);
        let spread: f32 = if moving { 3.0 } else { 0.02 };
        let samples: Vec<[f32; 3]> = (0..self.window_len())
            .map(|_| {
                [
                    rng.gen_range(-spread..spread),
                    rng.gen_range(-spread..spread),
                    9.81 + rng.gen_range(-spread..spread),
                ]
            })
            .collect();
        Ok(SensorData::new(
            SensorType::Accelerometer,
            SensorPayload::Accelerometer { samples },
        ))
    }
}

/// Battery charge model: drains one percent per step, starts charging when
/// empty and stops when full.
#[derive(Clone, Debug, PartialEq)]
pub struct BatteryModel {
    pub level: u8,
    pub charging: bool,
    pub threshold: u8,
}

impl BatteryModel {
    /// Advance one step. Returns the new reading and, if the low threshold
    /// was crossed, which way (`true` = now below).
    pub fn step(&mut self) -> (SensorData, Option<bool>) {
        let was_below = self.level < self.threshold;
        if self.charging {
            self.level = (self.level + 5).min(100);
            if self.level == 100 {
                self.charging = false;
            }
        } else {
            self.level = self.level.saturating_sub(1);
            if self.level == 0 {
                self.charging = true;
            }
        }
        let is_below = self.level < self.threshold;
        let sample = SensorData::new(
            SensorType::Battery,
            SensorPayload::Battery {
                level_percent: self.level,
                charging: self.charging,
            },
        );
        (sample, (was_below != is_below).then_some(is_below))
    }
}

pub struct SimulatedBattery {
    config: ConfigStore,
    runtime: Handle,
    tick: Duration,
    model: Mutex<Option<BatteryModel>>,
    shutdown: CancellationToken,
}

impl SimulatedBattery {
    pub fn new(runtime: Handle, settings: &SimulationSettings) -> Self {
        Self {
            config: SensorConfig::push_defaults(),
            runtime,
            tick: settings.battery_tick,
            model: Mutex::new(Some(BatteryModel {
                level: settings.battery_start_level.min(100),
                charging: false,
                threshold: settings.low_battery_threshold,
            })),
            shutdown: CancellationToken::new(),
        }
    }
}

impl Sensor for SimulatedBattery {
    fn sensor_type(&self) -> SensorType {
        SensorType::Battery
    }

    fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl PushSensor for SimulatedBattery {
    fn start(&self, sink: PushSink) -> Result<()> {
        let Some(mut model) = self.model.lock().take() else {
            debug!("[Sim] Battery already started");
            return Ok(());
        };
        let shutdown = self.shutdown.clone();
        let tick = self.tick;
        self.runtime.spawn(async move {
            let mut ticker = interval(tick);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let (sample, crossing) = model.step();
                if let Err(e) = sink.publish(sample) {
                    warn!("[Sim] Battery sample rejected: {}", e);
                }
                if let Some(below) = crossing {
                    info!("[Sim] Battery at {}%, below threshold: {}", model.level, below);
                    sink.low_battery_threshold(below);
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Emits a random telephony event at a fixed interval.
pub struct SimulatedPhoneState {
    config: ConfigStore,
    runtime: Handle,
    every: Duration,
    shutdown: CancellationToken,
}

impl SimulatedPhoneState {
    const EVENTS: [PhoneStateEvent; 6] = [
        PhoneStateEvent::CallStateIdle,
        PhoneStateEvent::CallStateRinging,
        PhoneStateEvent::CallStateOffHook,
        PhoneStateEvent::CallStateOutgoing,
        PhoneStateEvent::DataActivity,
        PhoneStateEvent::ServiceStateChanged,
    ];

    pub fn new(runtime: Handle, every: Duration) -> Self {
        Self {
            config: SensorConfig::push_defaults(),
            runtime,
            every,
            shutdown: CancellationToken::new(),
        }
    }
}

impl Sensor for SimulatedPhoneState {
    fn sensor_type(&self) -> SensorType {
        SensorType::PhoneState
    }

    fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl PushSensor for SimulatedPhoneState {
    fn start(&self, sink: PushSink) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let every = self.every;
        self.runtime.spawn(async move {
            let mut ticker = interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let (event, number) = {
                    let mut rng = rand::thread_rng();
                    let event = *Self::EVENTS
                        .choose(&mut rng)
                        .unwrap_or(&PhoneStateEvent::CallStateIdle);
                    (event, format!("+44{:09}", rng.gen_range(0..1_000_000_000u32)))
                };
                if let Err(e) = sink.publish(SensorData::phone_state(event, number)) {
                    warn!("[Sim] Phone state event rejected: {}", e);
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SensorManager;
    use crate::testing::{RecordingListener, wait_for};
    use std::sync::Arc;
    use tokio_test::assert_ok;

    #[test]
    fn test_battery_model_reports_crossings() {
        let mut model = BatteryModel {
            level: 21,
            charging: false,
            threshold: 20,
        };
        let (_, crossing) = model.step();
        assert_eq!(crossing, None);
        assert_eq!(model.level, 20);
        let (sample, crossing) = model.step();
        assert_eq!(crossing, Some(true));
        assert_eq!(
            sample.payload,
            SensorPayload::Battery {
                level_percent: 19,
                charging: false
            }
        );
    }

    #[test]
    fn test_battery_model_recharges_and_clears() {
        let mut model = BatteryModel {
            level: 1,
            charging: false,
            threshold: 20,
        };
        model.step();
        assert!(model.charging);
        let crossings: Vec<_> = (0..10).filter_map(|_| model.step().1).collect();
        assert_eq!(crossings, vec![false]);
    }

    #[test]
    fn test_accelerometer_window_follows_config() {
        let accel = SimulatedAccelerometer::new(Duration::from_millis(100));
        assert_ok!(accel.set_sensor_config(
            SensorConfig::SENSE_WINDOW_LENGTH_MILLIS,
            crate::sensors::ConfigValue::Integer(50)
        ));
        let sample = assert_ok!(accel.fetch());
        let SensorPayload::Accelerometer { samples } = sample.payload else {
            panic!("expected accelerometer payload");
        };
        assert_eq!(samples.len(), 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_simulated_battery_drives_manager_broadcast() {
        let settings = SimulationSettings {
            pull_interval: Duration::from_millis(20),
            battery_tick: Duration::from_millis(10),
            battery_start_level: 40,
            low_battery_threshold: 20,
            phone_event_interval: Duration::from_secs(60),
        };
        let manager = SensorManager::builder(Handle::current())
            .with_sensors(simulated_drivers(Handle::current(), &settings))
            .build()
            .expect("manager builds");

        let listener = Arc::new(RecordingListener::new());
        assert_ok!(manager.subscribe(SensorType::PhoneState, listener.clone()));
        wait_for(|| listener.battery_signals().contains(&true)).await;
    }
}
