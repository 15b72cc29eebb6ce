//! Sensor subscription and distribution core.
//!
//! A [`SensorManager`] owns one [`SensorTask`](tasks::SensorTask) per
//! registered driver and fans each sample out to the listeners subscribed
//! to that sensor. Pull sensors are polled only while someone listens;
//! push sensors forward whatever their event source produces.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod manager;
pub mod power;
pub mod sensors;
pub mod simulation;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use error::{Result, SensorError};
pub use manager::{SensorManager, SensorManagerBuilder};
pub use sensors::{SensorCategory, SensorData, SensorDataListener, SensorType};
pub use tasks::SubscriptionId;
