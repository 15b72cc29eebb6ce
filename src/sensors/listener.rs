//! Listener capability implemented by subscribers.

use super::SensorData;

/// Receives samples and battery threshold signals for one subscription.
///
/// Callbacks run on a blocking worker owned by the subscription's mailbox,
/// never on the driver's own context, so a slow implementation only delays
/// its own deliveries.
pub trait SensorDataListener: Send + Sync {
    fn on_data_sensed(&self, data: &SensorData);

    /// Battery level crossed the configured low threshold (`true` = now below).
    fn on_crossing_low_battery_threshold(&self, is_below_threshold: bool);
}
