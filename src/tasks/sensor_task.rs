//! Per-sensor task: owns one driver and fans its samples out to subscribers.
//!
//! Pull tasks run a polling loop on the runtime that samples only while at
//! least one subscription is attached, and cache the most recent sample.
//! Push tasks hand the driver a [`PushSink`] and relay whatever it emits.

use super::Subscription;
use super::mailbox::Delivery;
use crate::error::{Result, SensorError};
use crate::sensors::{
    PullSensor, SensorCategory, SensorConfig, SensorData, SensorDriver, SensorType,
};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Tuning shared by every task a manager creates.
#[derive(Clone, Debug)]
pub struct TaskOptions {
    /// Capacity of each subscriber's mailbox.
    pub mailbox_capacity: usize,
    /// Polling pause used when a pull driver has no usable sleep setting.
    pub default_pull_interval: Duration,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            mailbox_capacity: 32,
            default_pull_interval: Duration::from_millis(
                SensorConfig::DEFAULT_POST_SENSE_SLEEP_MILLIS as u64,
            ),
        }
    }
}

pub struct SensorTask {
    sensor_type: SensorType,
    driver: SensorDriver,
    runtime: Handle,
    options: TaskOptions,
    subscribers: RwLock<Vec<Weak<Subscription>>>,
    started: AtomicBool,
    /// Last pull sample, retained even while every subscriber is paused.
    latest: Mutex<Option<SensorData>>,
    wake: Notify,
    shutdown: CancellationToken,
}

impl SensorTask {
    pub fn new(driver: SensorDriver, runtime: Handle, options: TaskOptions) -> Arc<Self> {
        Arc::new(Self {
            sensor_type: driver.sensor_type(),
            driver,
            runtime,
            options,
            subscribers: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
            latest: Mutex::new(None),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Begin producing samples. Starting twice is a no-op.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            debug!("[Task] {} already started", self.sensor_type);
            return Ok(());
        }
        if self.shutdown.is_cancelled() {
            return Err(SensorError::OperationNotSupported(format!(
                "{} has been stopped",
                self.sensor_type
            )));
        }
        match &self.driver {
            SensorDriver::Pull(driver) => {
                self.runtime
                    .spawn(poll_loop(Arc::clone(self), Arc::clone(driver)));
            }
            SensorDriver::Push(driver) => {
                driver.start(PushSink {
                    task: Arc::downgrade(self),
                })?;
            }
        }
        self.started.store(true, Ordering::SeqCst);
        info!("[Task] {} started ({})", self.sensor_type, self.category());
        Ok(())
    }

    /// Stop the polling loop or detach the push driver. A stopped task
    /// cannot be started again.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        if let SensorDriver::Push(driver) = &self.driver {
            driver.stop();
        }
        info!("[Task] {} stopped", self.sensor_type);
    }

    /// Pull tasks count as running only while sampling for a subscriber;
    /// push tasks are running once started.
    pub fn is_running(&self) -> bool {
        if !self.started.load(Ordering::SeqCst) {
            return false;
        }
        match self.category() {
            SensorCategory::Pull => self.subscriber_count() > 0,
            SensorCategory::Push => true,
        }
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    pub fn category(&self) -> SensorCategory {
        self.driver.category()
    }

    /// The driver, for configuration calls.
    pub fn sensor(&self) -> &SensorDriver {
        &self.driver
    }

    /// Synchronous read for pull sensors that are not currently sampling.
    ///
    /// Returns the cached sample, or takes one if nothing has been cached yet.
    pub fn current_sensor_data(&self) -> Result<SensorData> {
        let Some(driver) = self.driver.as_pull() else {
            return Err(SensorError::OperationNotSupported(format!(
                "{} is a push sensor",
                self.sensor_type
            )));
        };
        if self.is_running() {
            return Err(SensorError::OperationNotSupported(format!(
                "{} is running; unsubscribe all listeners and disable adaptive sensing \
                 before a one-shot read",
                self.sensor_type
            )));
        }
        let mut latest = self.latest.lock();
        if let Some(sample) = latest.as_ref() {
            return Ok(sample.clone());
        }
        let sample = driver.fetch()?;
        *latest = Some(sample.clone());
        Ok(sample)
    }

    /// The cached pull sample, if any.
    pub fn latest(&self) -> Option<SensorData> {
        self.latest.lock().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub(crate) fn mailbox_capacity(&self) -> usize {
        self.options.mailbox_capacity
    }

    pub(crate) fn attach(&self, subscription: &Arc<Subscription>) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|s| s.strong_count() > 0);
        subscribers.push(Arc::downgrade(subscription));
        drop(subscribers);
        self.wake.notify_one();
    }

    pub(crate) fn detach(&self, subscription: &Subscription) {
        let target = subscription as *const Subscription;
        self.subscribers
            .write()
            .retain(|s| s.strong_count() > 0 && s.as_ptr() != target);
    }

    /// Cache (pull only) and fan a sample out. Returns how many mailboxes took it.
    pub(crate) fn publish_data(&self, data: SensorData) -> usize {
        if self.category() == SensorCategory::Pull {
            *self.latest.lock() = Some(data.clone());
        }
        self.fan_out(Delivery::Data(Arc::new(data)))
    }

    pub(crate) fn publish_low_battery(&self, is_below_threshold: bool) -> usize {
        self.fan_out(Delivery::LowBatteryThreshold(is_below_threshold))
    }

    fn fan_out(&self, delivery: Delivery) -> usize {
        let live: Vec<Arc<Subscription>> = self
            .subscribers
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        live.iter()
            .filter(|sub| sub.deliver(delivery.clone()))
            .count()
    }

    fn pull_interval(&self, driver: &dyn PullSensor) -> Duration {
        let key = SensorConfig::POST_SENSE_SLEEP_LENGTH_MILLIS;
        match driver.get_sensor_config(key).and_then(|v| v.require_integer(key)) {
            Ok(ms) if ms >= 0 => Duration::from_millis(ms as u64),
            _ => self.options.default_pull_interval,
        }
    }
}

async fn poll_loop(task: Arc<SensorTask>, driver: Arc<dyn PullSensor>) {
    debug!("[Task] {} polling loop running", task.sensor_type);
    loop {
        if task.subscriber_count() == 0 {
            tokio::select! {
                _ = task.shutdown.cancelled() => break,
                _ = task.wake.notified() => continue,
            }
        }

        let fetcher = driver.clone();
        match tokio::task::spawn_blocking(move || fetcher.fetch()).await {
            Ok(Ok(sample)) => {
                task.publish_data(sample);
            }
            Ok(Err(e)) => warn!("[Task] {} sample failed: {}", task.sensor_type, e),
            Err(e) => error!("[Task] {} driver panicked: {}", task.sensor_type, e),
        }

        let pause = task.pull_interval(driver.as_ref());
        tokio::select! {
            _ = task.shutdown.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }
    debug!("[Task] {} polling loop exited", task.sensor_type);
}

/// Handle given to push drivers for emitting events.
#[derive(Clone)]
pub struct PushSink {
    task: Weak<SensorTask>,
}

impl PushSink {
    /// Fan a sample out to the task's subscribers.
    pub fn publish(&self, data: SensorData) -> Result<usize> {
        let Some(task) = self.task.upgrade() else {
            return Ok(0);
        };
        if data.sensor_type != task.sensor_type {
            return Err(SensorError::InvalidParameter(format!(
                "{} sample published on {} task",
                data.sensor_type, task.sensor_type
            )));
        }
        Ok(task.publish_data(data))
    }

    /// Signal a low-battery threshold crossing.
    pub fn low_battery_threshold(&self, is_below_threshold: bool) -> usize {
        self.task
            .upgrade()
            .map(|task| task.publish_low_battery(is_below_threshold))
            .unwrap_or(0)
    }
}
