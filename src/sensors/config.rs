//! Key/value configuration stores for the manager and for individual sensors.
//!
//! Keys are namespaced strings. Values are tagged so that a consumer asking
//! for the wrong type gets a [`SensorError::ConfigTypeMismatch`] instead of a
//! silent coercion.

use crate::error::{Result, SensorError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A single configuration value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ConfigValue {
    /// Name of the variant, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::Text(_) => "text",
        }
    }

    /// Interpret the value as a boolean on behalf of `key`.
    pub fn require_bool(&self, key: &str) -> Result<bool> {
        match self {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch(key, "bool")),
        }
    }

    /// Interpret the value as an integer on behalf of `key`.
    pub fn require_integer(&self, key: &str) -> Result<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(other.mismatch(key, "integer")),
        }
    }

    /// Interpret the value as a float. Integers widen losslessly enough for config use.
    pub fn require_float(&self, key: &str) -> Result<f64> {
        match self {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Integer(i) => Ok(*i as f64),
            other => Err(other.mismatch(key, "float")),
        }
    }

    pub fn require_text(&self, key: &str) -> Result<&str> {
        match self {
            ConfigValue::Text(s) => Ok(s),
            other => Err(other.mismatch(key, "text")),
        }
    }

    /// Parse a command-line style value: `true`/`false`, integers, floats, else text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(b) = raw.parse::<bool>() {
            ConfigValue::Bool(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            ConfigValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            ConfigValue::Float(f)
        } else {
            ConfigValue::Text(raw.to_string())
        }
    }

    fn mismatch(&self, key: &str, expected: &'static str) -> SensorError {
        SensorError::ConfigTypeMismatch {
            key: key.to_string(),
            expected,
            found: self.type_name(),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

/// Thread-safe string-keyed configuration store.
#[derive(Debug, Default)]
pub struct ConfigStore {
    values: RwLock<HashMap<String, ConfigValue>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used when assembling defaults.
    pub fn with(self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.values.write().insert(key.to_string(), value.into());
        self
    }

    /// Look up a key. Unset keys are an invalid parameter.
    pub fn get(&self, key: &str) -> Result<ConfigValue> {
        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SensorError::InvalidParameter(format!("unknown config key: {}", key)))
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, key: &str, value: impl Into<ConfigValue>) -> Result<Option<ConfigValue>> {
        if key.trim().is_empty() {
            return Err(SensorError::InvalidParameter(
                "config key must not be empty".to_string(),
            ));
        }
        Ok(self.values.write().insert(key.to_string(), value.into()))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)?.require_bool(key)
    }

    pub fn get_integer(&self, key: &str) -> Result<i64> {
        self.get(key)?.require_integer(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Copy of every entry, for diagnostics.
    pub fn snapshot(&self) -> HashMap<String, ConfigValue> {
        self.values.read().clone()
    }
}

/// Manager-wide configuration keys and defaults.
pub struct GlobalConfig;

impl GlobalConfig {
    /// Hold a process-wide wake resource while `true`.
    pub const ACQUIRE_WAKE_LOCK: &'static str = "ACQUIRE_WAKE_LOCK";
    /// Battery level (percent) below which battery drivers signal a crossing.
    pub const LOW_BATTERY_THRESHOLD: &'static str = "LOW_BATTERY_THRESHOLD";

    pub const DEFAULT_LOW_BATTERY_THRESHOLD: i64 = 20;

    pub fn defaults() -> ConfigStore {
        ConfigStore::new()
            .with(Self::ACQUIRE_WAKE_LOCK, false)
            .with(Self::LOW_BATTERY_THRESHOLD, Self::DEFAULT_LOW_BATTERY_THRESHOLD)
    }
}

/// Per-sensor configuration keys and defaults.
pub struct SensorConfig;

impl SensorConfig {
    pub const ADAPTIVE_SENSING_ENABLED: &'static str = "ADAPTIVE_SENSING_ENABLED";
    /// Pause between two pull samples.
    pub const POST_SENSE_SLEEP_LENGTH_MILLIS: &'static str = "POST_SENSE_SLEEP_LENGTH_MILLIS";
    /// Length of a single pull sampling window.
    pub const SENSE_WINDOW_LENGTH_MILLIS: &'static str = "SENSE_WINDOW_LENGTH_MILLIS";

    pub const DEFAULT_POST_SENSE_SLEEP_MILLIS: i64 = 1_000;
    pub const DEFAULT_SENSE_WINDOW_MILLIS: i64 = 200;

    /// Defaults shared by every push sensor.
    pub fn push_defaults() -> ConfigStore {
        ConfigStore::new().with(Self::ADAPTIVE_SENSING_ENABLED, false)
    }

    /// Defaults shared by every pull sensor.
    pub fn pull_defaults(sleep_millis: i64) -> ConfigStore {
        Self::push_defaults()
            .with(Self::POST_SENSE_SLEEP_LENGTH_MILLIS, sleep_millis)
            .with(Self::SENSE_WINDOW_LENGTH_MILLIS, Self::DEFAULT_SENSE_WINDOW_MILLIS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_typed_accessors() {
        let store = GlobalConfig::defaults();
        assert!(!assert_ok!(store.get_bool(GlobalConfig::ACQUIRE_WAKE_LOCK)));
        assert_eq!(
            assert_ok!(store.get_integer(GlobalConfig::LOW_BATTERY_THRESHOLD)),
            GlobalConfig::DEFAULT_LOW_BATTERY_THRESHOLD
        );
    }

    #[test]
    fn test_type_mismatch_reports_key_and_types() {
        let store = ConfigStore::new().with("flag", "yes");
        match store.get_bool("flag") {
            Err(SensorError::ConfigTypeMismatch {
                key,
                expected,
                found,
            }) => {
                assert_eq!(key, "flag");
                assert_eq!(expected, "bool");
                assert_eq!(found, "text");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_and_empty_key() {
        let store = ConfigStore::new();
        assert!(matches!(
            store.get("missing"),
            Err(SensorError::InvalidParameter(_))
        ));
        assert_err!(store.set("  ", true));
    }

    #[test]
    fn test_set_returns_previous_value() {
        let store = ConfigStore::new();
        assert_eq!(assert_ok!(store.set("k", 1i64)), None);
        assert_eq!(
            assert_ok!(store.set("k", 2i64)),
            Some(ConfigValue::Integer(1))
        );
        assert!(store.contains("k"));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(ConfigValue::parse("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse(" 42 "), ConfigValue::Integer(42));
        assert_eq!(ConfigValue::parse("1.5"), ConfigValue::Float(1.5));
        assert_eq!(ConfigValue::parse("fast"), ConfigValue::Text("fast".into()));
        assert_eq!(assert_ok!(ConfigValue::Integer(3).require_float("x")), 3.0);
    }
}
