//! Sensor catalogue and the driver capability interfaces.
//!
//! Drivers are external collaborators: this module only describes what a
//! driver must offer to be managed. The pull/push category of a driver is
//! carried by the [`SensorDriver`] variant it is registered as, never
//! inferred from its numeric code.

pub mod config;
pub mod data;
pub mod listener;

pub use config::{ConfigStore, ConfigValue, GlobalConfig, SensorConfig};
pub use data::{PhoneStateData, PhoneStateEvent, SensorData, SensorPayload};
pub use listener::SensorDataListener;

use crate::adaptive::{AlwaysInteresting, SensorDataClassifier};
use crate::error::{Result, SensorError};
use crate::tasks::PushSink;
use serde::Serialize;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString, FromRepr};

/// Sensor catalogue with stable numeric codes.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    FromRepr,
    EnumString,
    EnumIter,
    Display,
    Serialize,
)]
#[repr(u16)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Accelerometer = 5001,
    Battery = 5002,
    Bluetooth = 5003,
    Location = 5004,
    Microphone = 5005,
    PhoneState = 5006,
    Proximity = 5007,
    Screen = 5008,
    Sms = 5009,
    Wifi = 5010,
    ConnectionState = 5011,
}

impl SensorType {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Resolve a numeric sensor code.
    pub fn from_code(code: u16) -> Result<Self> {
        Self::from_repr(code)
            .ok_or_else(|| SensorError::InvalidParameter(format!("unknown sensor code: {}", code)))
    }
}

/// How a sensor produces samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SensorCategory {
    /// Polled on demand; offers a synchronous point-in-time read.
    Pull,
    /// Emits samples whenever the underlying event occurs.
    Push,
}

/// Capabilities shared by every driver.
pub trait Sensor: Send + Sync {
    fn sensor_type(&self) -> SensorType;

    /// The driver's own configuration store.
    fn config(&self) -> &ConfigStore;

    fn get_sensor_config(&self, key: &str) -> Result<ConfigValue> {
        self.config().get(key)
    }

    fn set_sensor_config(&self, key: &str, value: ConfigValue) -> Result<()> {
        self.config().set(key, value).map(|_| ())
    }
}

/// A sensor that must be polled.
pub trait PullSensor: Sensor {
    /// Take one sample synchronously.
    fn fetch(&self) -> Result<SensorData>;

    /// Classifier used when adaptive sensing is enabled for this sensor.
    fn classifier(&self) -> Arc<dyn SensorDataClassifier> {
        Arc::new(AlwaysInteresting)
    }
}

/// A sensor driven by external events.
pub trait PushSensor: Sensor {
    /// Register the driver's event source. Samples are handed to `sink`.
    fn start(&self, sink: PushSink) -> Result<()>;

    /// Detach from the event source. Called on manager teardown.
    fn stop(&self) {}
}

/// A driver tagged with its category.
#[derive(Clone)]
pub enum SensorDriver {
    Pull(Arc<dyn PullSensor>),
    Push(Arc<dyn PushSensor>),
}

impl SensorDriver {
    pub fn pull(driver: impl PullSensor + 'static) -> Self {
        SensorDriver::Pull(Arc::new(driver))
    }

    pub fn push(driver: impl PushSensor + 'static) -> Self {
        SensorDriver::Push(Arc::new(driver))
    }

    pub fn sensor_type(&self) -> SensorType {
        match self {
            SensorDriver::Pull(s) => s.sensor_type(),
            SensorDriver::Push(s) => s.sensor_type(),
        }
    }

    pub fn category(&self) -> SensorCategory {
        match self {
            SensorDriver::Pull(_) => SensorCategory::Pull,
            SensorDriver::Push(_) => SensorCategory::Push,
        }
    }

    pub fn get_sensor_config(&self, key: &str) -> Result<ConfigValue> {
        match self {
            SensorDriver::Pull(s) => s.get_sensor_config(key),
            SensorDriver::Push(s) => s.get_sensor_config(key),
        }
    }

    pub fn set_sensor_config(&self, key: &str, value: ConfigValue) -> Result<()> {
        match self {
            SensorDriver::Pull(s) => s.set_sensor_config(key, value),
            SensorDriver::Push(s) => s.set_sensor_config(key, value),
        }
    }

    pub fn as_pull(&self) -> Option<&Arc<dyn PullSensor>> {
        match self {
            SensorDriver::Pull(s) => Some(s),
            SensorDriver::Push(_) => None,
        }
    }
}

impl std::fmt::Debug for SensorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorDriver")
            .field("sensor_type", &self.sensor_type())
            .field("category", &self.category())
            .finish()
    }
}
