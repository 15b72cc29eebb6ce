//! Adaptive sensing: stretch a pull sensor's polling interval while nothing
//! interesting is happening, and snap it back when something is.
//!
//! [`AdaptiveSensing`] is the seam the manager talks to. [`DutyCycler`] is
//! the default implementation; it watches samples through an internal
//! subscription on the sensor's task and rewrites the driver's
//! `POST_SENSE_SLEEP_LENGTH_MILLIS` setting.

use crate::error::{Result, SensorError};
use crate::sensors::{
    ConfigValue, PullSensor, Sensor, SensorConfig, SensorData, SensorDataListener,
    SensorPayload, SensorType,
};
use crate::tasks::{SensorTask, Subscription};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a sample indicates activity worth sampling faster for.
pub trait SensorDataClassifier: Send + Sync {
    fn is_interesting(&self, data: &SensorData) -> bool;
}

/// Treats every sample as interesting, which pins the interval at its minimum.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysInteresting;

impl SensorDataClassifier for AlwaysInteresting {
    fn is_interesting(&self, _data: &SensorData) -> bool {
        true
    }
}

/// Flags accelerometer windows whose magnitude spread exceeds `threshold`.
#[derive(Clone, Copy, Debug)]
pub struct AccelerometerMotion {
    pub threshold: f32,
}

impl SensorDataClassifier for AccelerometerMotion {
    fn is_interesting(&self, data: &SensorData) -> bool {
        let SensorPayload::Accelerometer { samples } = &data.payload else {
            return true;
        };
        let magnitudes = samples
            .iter()
            .map(|[x, y, z]| (x * x + y * y + z * z).sqrt());
        let (min, max) = magnitudes.fold((f32::MAX, f32::MIN), |(lo, hi), m| {
            (lo.min(m), hi.max(m))
        });
        max > min && max - min > self.threshold
    }
}

/// Collaborator that adjusts pull sensors based on classified activity.
pub trait AdaptiveSensing: Send + Sync {
    fn register_sensor(
        &self,
        driver: Arc<dyn PullSensor>,
        classifier: Arc<dyn SensorDataClassifier>,
        task: Arc<SensorTask>,
    ) -> Result<()>;

    fn unregister_sensor(&self, sensor_type: SensorType) -> Result<()>;

    fn is_sensor_registered(&self, sensor_type: SensorType) -> bool;
}

/// Interval bounds for [`DutyCycler`].
#[derive(Clone, Debug)]
pub struct DutyCyclePolicy {
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// Multiplier applied after each uninteresting sample.
    pub backoff: f64,
}

impl Default for DutyCyclePolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(
                SensorConfig::DEFAULT_POST_SENSE_SLEEP_MILLIS as u64,
            ),
            max_interval: Duration::from_secs(60),
            backoff: 2.0,
        }
    }
}

impl DutyCyclePolicy {
    /// Interval to use after a sample, given the current one.
    pub fn next_interval(&self, current: Duration, interesting: bool) -> Duration {
        if interesting {
            return self.min_interval;
        }
        let stretched = current.max(self.min_interval).mul_f64(self.backoff.max(1.0));
        stretched.min(self.max_interval)
    }
}

#[derive(Default)]
pub struct DutyCycler {
    policy: DutyCyclePolicy,
    registrations: Mutex<HashMap<SensorType, Arc<Subscription>>>,
}

impl DutyCycler {
    pub fn new(policy: DutyCyclePolicy) -> Self {
        Self {
            policy,
            registrations: Mutex::new(HashMap::new()),
        }
    }
}

impl AdaptiveSensing for DutyCycler {
    fn register_sensor(
        &self,
        driver: Arc<dyn PullSensor>,
        classifier: Arc<dyn SensorDataClassifier>,
        task: Arc<SensorTask>,
    ) -> Result<()> {
        let sensor_type = task.sensor_type();
        let mut registrations = self.registrations.lock();
        if registrations.contains_key(&sensor_type) {
            return Err(SensorError::OperationNotSupported(format!(
                "adaptive sensing already enabled for {}",
                sensor_type
            )));
        }
        let observer = Arc::new(DutyCycleObserver {
            driver,
            classifier,
            policy: self.policy.clone(),
        });
        registrations.insert(sensor_type, Subscription::new(task, observer));
        info!("[Adaptive] Registered {}", sensor_type);
        Ok(())
    }

    fn unregister_sensor(&self, sensor_type: SensorType) -> Result<()> {
        let subscription = self
            .registrations
            .lock()
            .remove(&sensor_type)
            .ok_or_else(|| {
                SensorError::OperationNotSupported(format!(
                    "adaptive sensing not enabled for {}",
                    sensor_type
                ))
            })?;
        subscription.unregister();
        info!("[Adaptive] Unregistered {}", sensor_type);
        Ok(())
    }

    fn is_sensor_registered(&self, sensor_type: SensorType) -> bool {
        self.registrations.lock().contains_key(&sensor_type)
    }
}

struct DutyCycleObserver {
    driver: Arc<dyn PullSensor>,
    classifier: Arc<dyn SensorDataClassifier>,
    policy: DutyCyclePolicy,
}

impl SensorDataListener for DutyCycleObserver {
    fn on_data_sensed(&self, data: &SensorData) {
        let key = SensorConfig::POST_SENSE_SLEEP_LENGTH_MILLIS;
        let current = self
            .driver
            .get_sensor_config(key)
            .and_then(|v| v.require_integer(key))
            .map(|ms| Duration::from_millis(ms.max(0) as u64))
            .unwrap_or(self.policy.min_interval);
        let interesting = self.classifier.is_interesting(data);
        let next = self.policy.next_interval(current, interesting);
        if next != current {
            debug!(
                "[Adaptive] {} interval {:?} -> {:?}",
                data.sensor_type, current, next
            );
            let millis = ConfigValue::Integer(next.as_millis() as i64);
            if let Err(e) = self.driver.set_sensor_config(key, millis) {
                warn!("[Adaptive] Failed to update {}: {}", data.sensor_type, e);
            }
        }
    }

    fn on_crossing_low_battery_threshold(&self, _is_below_threshold: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorDriver;
    use crate::tasks::TaskOptions;
    use crate::testing::{CountingPullSensor, wait_for};
    use tokio::runtime::Handle;
    use tokio_test::{assert_err, assert_ok};

    fn accel(samples: Vec<[f32; 3]>) -> SensorData {
        SensorData::new(
            SensorType::Accelerometer,
            SensorPayload::Accelerometer { samples },
        )
    }

    #[test]
    fn test_motion_classifier() {
        let classifier = AccelerometerMotion { threshold: 0.5 };
        assert!(!classifier.is_interesting(&accel(vec![[0.0, 0.0, 9.8], [0.0, 0.1, 9.8]])));
        assert!(classifier.is_interesting(&accel(vec![[0.0, 0.0, 9.8], [3.0, 2.0, 9.8]])));
        assert!(!classifier.is_interesting(&accel(vec![])));
    }

    #[test]
    fn test_policy_backs_off_and_resets() {
        let policy = DutyCyclePolicy {
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(350),
            backoff: 2.0,
        };
        let mut interval = policy.min_interval;
        interval = policy.next_interval(interval, false);
        assert_eq!(interval, Duration::from_millis(200));
        interval = policy.next_interval(interval, false);
        assert_eq!(interval, Duration::from_millis(350));
        assert_eq!(
            policy.next_interval(interval, true),
            Duration::from_millis(100)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_register_twice_and_unregister_unknown() {
        let sensor = Arc::new(CountingPullSensor::new(5));
        let task = SensorTask::new(
            SensorDriver::Pull(sensor.clone()),
            Handle::current(),
            TaskOptions::default(),
        );
        let cycler = DutyCycler::default();

        let always: Arc<dyn SensorDataClassifier> = Arc::new(AlwaysInteresting);
        assert_ok!(cycler.register_sensor(sensor.clone(), always.clone(), task.clone()));
        assert!(cycler.is_sensor_registered(SensorType::Accelerometer));
        assert_err!(cycler.register_sensor(sensor, always, task.clone()));

        assert_ok!(cycler.unregister_sensor(SensorType::Accelerometer));
        assert_eq!(task.subscriber_count(), 0);
        assert_err!(cycler.unregister_sensor(SensorType::Accelerometer));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quiet_sensor_interval_stretches() {
        let sensor = Arc::new(CountingPullSensor::new(5));
        let key = SensorConfig::POST_SENSE_SLEEP_LENGTH_MILLIS;
        assert_ok!(sensor.set_sensor_config(key, ConfigValue::Integer(10)));
        let task = SensorTask::new(
            SensorDriver::Pull(sensor.clone()),
            Handle::current(),
            TaskOptions::default(),
        );
        assert_ok!(task.start());

        let cycler = DutyCycler::new(DutyCyclePolicy {
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(80),
            backoff: 2.0,
        });
        // Constant readings never count as motion
        let quiet = Arc::new(AccelerometerMotion { threshold: 0.5 });
        assert_ok!(cycler.register_sensor(sensor.clone(), quiet, task.clone()));

        wait_for(|| sensor.config().get_integer(key).ok() == Some(80)).await;
        task.stop();
    }
}
