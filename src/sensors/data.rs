//! Sample data produced by sensor drivers.

use super::SensorType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, FromRepr};

/// One sample emitted by a driver.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorData {
    pub sensor_type: SensorType,
    pub timestamp: DateTime<Utc>,
    pub payload: SensorPayload,
}

impl SensorData {
    /// Create a sample stamped with the current time.
    pub fn new(sensor_type: SensorType, payload: SensorPayload) -> Self {
        Self::at(sensor_type, Utc::now(), payload)
    }

    pub fn at(sensor_type: SensorType, timestamp: DateTime<Utc>, payload: SensorPayload) -> Self {
        Self {
            sensor_type,
            timestamp,
            payload,
        }
    }

    /// Convenience constructor for telephony events.
    pub fn phone_state(event: PhoneStateEvent, data: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self::at(
            SensorType::PhoneState,
            timestamp,
            SensorPayload::PhoneState(PhoneStateData {
                timestamp,
                event,
                data: data.into(),
            }),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorPayload {
    /// Raw x/y/z readings collected during one sensing window.
    Accelerometer { samples: Vec<[f32; 3]> },
    Battery { level_percent: u8, charging: bool },
    PhoneState(PhoneStateData),
    Proximity { distance_cm: f32, max_range_cm: f32 },
    Screen { on: bool },
    Text { value: String },
}

/// Telephony event codes. These live in their own numeric range, separate
/// from [`SensorType`] codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromRepr, Display, Serialize)]
#[repr(u32)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PhoneStateEvent {
    CallStateIdle = 54401,
    CallStateOffHook = 54402,
    CallStateRinging = 54403,
    CallStateOutgoing = 54404,
    CellLocationChanged = 5441,
    DataActivity = 5442,
    DataConnectionStateChanged = 5443,
    ServiceStateChanged = 5444,
}

impl PhoneStateEvent {
    pub fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhoneStateData {
    pub timestamp: DateTime<Utc>,
    pub event: PhoneStateEvent,
    pub data: String,
}

impl PhoneStateData {
    pub fn is_ringing(&self) -> bool {
        self.event == PhoneStateEvent::CallStateRinging
    }

    pub fn is_off_hook(&self) -> bool {
        self.event == PhoneStateEvent::CallStateOffHook
    }

    pub fn is_idle(&self) -> bool {
        self.event == PhoneStateEvent::CallStateIdle
    }

    /// `"<event code> <data>"`.
    pub fn data_string(&self) -> String {
        format!("{} {}", self.event.code(), self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_state_codes() {
        assert_eq!(
            PhoneStateEvent::from_repr(54403),
            Some(PhoneStateEvent::CallStateRinging)
        );
        assert_eq!(
            PhoneStateEvent::from_repr(5442),
            Some(PhoneStateEvent::DataActivity)
        );
        assert_eq!(PhoneStateEvent::from_repr(5001), None);
    }

    #[test]
    fn test_phone_state_accessors() {
        let sample = SensorData::phone_state(PhoneStateEvent::CallStateRinging, "+4412345");
        assert_eq!(sample.sensor_type, SensorType::PhoneState);
        let SensorPayload::PhoneState(data) = sample.payload else {
            panic!("expected phone state payload");
        };
        assert!(data.is_ringing());
        assert!(!data.is_idle());
        assert!(!data.is_off_hook());
        assert_eq!(data.data_string(), "54403 +4412345");
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let sample = SensorData::new(
            SensorType::Battery,
            SensorPayload::Battery {
                level_percent: 15,
                charging: false,
            },
        );
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["sensor_type"], "battery");
        assert_eq!(json["payload"]["kind"], "battery");
        assert_eq!(json["payload"]["level_percent"], 15);
    }
}
