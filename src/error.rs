use crate::sensors::SensorType;
use crate::tasks::SubscriptionId;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum SensorError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown sensor type: {0}")]
    UnknownSensorType(SensorType),

    #[error("Un-mapped subscription id: {0}")]
    InvalidState(SubscriptionId),

    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Config key {key} expects {expected}, found {found}")]
    ConfigTypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Sensor driver error: {0}")]
    Driver(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SensorError>;
