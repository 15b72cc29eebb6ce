//! Sensor manager: the public entry point.
//!
//! Owns one [`SensorTask`] per discovered driver and the
//! [`SubscriptionRegistry`]. Construction is explicit: build one manager per
//! process with [`SensorManager::builder`] and hand out `Arc<SensorManager>`
//! to whoever needs it.
//!
//! The manager listens to the battery sensor itself and re-broadcasts
//! low-battery threshold crossings to every non-paused subscriber.

use crate::adaptive::{AdaptiveSensing, DutyCycler};
use crate::error::{Result, SensorError};
use crate::power::{
    LoggingPowerManager, Permission, PermissionChecker, PowerManager, StaticPermissions,
    WakeLockGuard,
};
use crate::sensors::{
    ConfigStore, ConfigValue, GlobalConfig, SensorCategory, SensorConfig, SensorData,
    SensorDataListener, SensorDriver, SensorType,
};
use crate::tasks::{
    SensorTask, Subscription, SubscriptionId, SubscriptionRegistry, TaskOptions,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

/// Assembles a [`SensorManager`] from its collaborators.
pub struct SensorManagerBuilder {
    runtime: Handle,
    drivers: Vec<SensorDriver>,
    options: TaskOptions,
    permissions: Arc<dyn PermissionChecker>,
    power: Arc<dyn PowerManager>,
    adaptive: Option<Arc<dyn AdaptiveSensing>>,
    global_config: ConfigStore,
}

impl SensorManagerBuilder {
    /// Add a driver discovered on the host.
    pub fn with_sensor(mut self, driver: SensorDriver) -> Self {
        self.drivers.push(driver);
        self
    }

    pub fn with_sensors(mut self, drivers: impl IntoIterator<Item = SensorDriver>) -> Self {
        self.drivers.extend(drivers);
        self
    }

    pub fn with_task_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_power_manager(mut self, power: Arc<dyn PowerManager>) -> Self {
        self.power = power;
        self
    }

    /// Replace the adaptive-sensing collaborator.
    pub fn with_adaptive_sensing(mut self, adaptive: Arc<dyn AdaptiveSensing>) -> Self {
        self.adaptive = Some(adaptive);
        self
    }

    /// Run without adaptive sensing; enabling it then fails.
    pub fn without_adaptive_sensing(mut self) -> Self {
        self.adaptive = None;
        self
    }

    pub fn with_global_config(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.global_config = self.global_config.with(key, value);
        self
    }

    /// Create and start one task per driver, then attach the battery relay.
    ///
    /// A driver that fails to start is logged and kept; its task simply
    /// never produces samples.
    pub fn build(self) -> Result<SensorManager> {
        let mut tasks = BTreeMap::new();
        for driver in self.drivers {
            let sensor_type = driver.sensor_type();
            if tasks.contains_key(&sensor_type) {
                return Err(SensorError::InvalidParameter(format!(
                    "duplicate driver for {}",
                    sensor_type
                )));
            }
            let task = SensorTask::new(driver, self.runtime.clone(), self.options.clone());
            if let Err(e) = task.start() {
                warn!("[Manager] Failed to start {}: {}", sensor_type, e);
            }
            tasks.insert(sensor_type, task);
        }

        let registry = Arc::new(SubscriptionRegistry::new());
        let battery_relay = tasks.get(&SensorType::Battery).map(|task| {
            let relay = Arc::new(BatteryRelay {
                registry: Arc::downgrade(&registry),
            });
            Subscription::new(task.clone(), relay)
        });
        if battery_relay.is_none() {
            debug!("[Manager] No battery sensor; low-battery relay disabled");
        }

        info!("[Manager] Started with {} sensor(s)", tasks.len());
        Ok(SensorManager {
            tasks,
            registry,
            ops: Mutex::new(()),
            sensor_config: Mutex::new(()),
            global_config: self.global_config,
            wake_lock: Mutex::new(None),
            permissions: self.permissions,
            power: self.power,
            adaptive: self.adaptive,
            battery_relay,
        })
    }
}

pub struct SensorManager {
    tasks: BTreeMap<SensorType, Arc<SensorTask>>,
    registry: Arc<SubscriptionRegistry>,
    /// Serializes subscribe/unsubscribe/pause/unpause.
    ops: Mutex<()>,
    /// Serializes the adaptive toggle with the driver config write.
    sensor_config: Mutex<()>,
    global_config: ConfigStore,
    /// Doubles as the global-config critical section.
    wake_lock: Mutex<Option<WakeLockGuard>>,
    permissions: Arc<dyn PermissionChecker>,
    power: Arc<dyn PowerManager>,
    adaptive: Option<Arc<dyn AdaptiveSensing>>,
    battery_relay: Option<Arc<Subscription>>,
}

impl SensorManager {
    /// Start a builder. Tasks and mailboxes are spawned on `runtime`.
    pub fn builder(runtime: Handle) -> SensorManagerBuilder {
        SensorManagerBuilder {
            runtime,
            drivers: Vec::new(),
            options: TaskOptions::default(),
            permissions: Arc::new(StaticPermissions::none()),
            power: Arc::new(LoggingPowerManager::new()),
            adaptive: Some(Arc::new(DutyCycler::default())),
            global_config: GlobalConfig::defaults(),
        }
    }

    pub fn subscribe(
        &self,
        sensor_type: SensorType,
        listener: Arc<dyn SensorDataListener>,
    ) -> Result<SubscriptionId> {
        let _ops = self.ops.lock();
        let task = self.task(sensor_type)?;
        let id = self
            .registry
            .register(Subscription::new(task.clone(), listener));
        info!("[Manager] Subscription {} -> {}", id, sensor_type);
        Ok(id)
    }

    /// Remove a subscription. No delivery starts after this returns.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let _ops = self.ops.lock();
        let subscription = self.registry.remove(id)?;
        subscription.unregister();
        info!("[Manager] Subscription {} removed", id);
        Ok(())
    }

    pub fn pause(&self, id: SubscriptionId) -> Result<()> {
        let _ops = self.ops.lock();
        self.registry.get(id)?.pause();
        debug!("[Manager] Subscription {} paused", id);
        Ok(())
    }

    pub fn unpause(&self, id: SubscriptionId) -> Result<()> {
        let _ops = self.ops.lock();
        self.registry.get(id)?.unpause();
        debug!("[Manager] Subscription {} unpaused", id);
        Ok(())
    }

    pub fn is_paused(&self, id: SubscriptionId) -> Result<bool> {
        Ok(self.registry.get(id)?.is_paused())
    }

    /// One-shot read of a pull sensor that nobody is subscribed to.
    pub fn get_snapshot(&self, sensor_type: SensorType) -> Result<SensorData> {
        self.task(sensor_type)?.current_sensor_data()
    }

    pub fn set_sensor_config(
        &self,
        sensor_type: SensorType,
        key: &str,
        value: impl Into<ConfigValue>,
    ) -> Result<()> {
        let task = self.task(sensor_type)?;
        let value = value.into();
        let _config = self.sensor_config.lock();
        if key == SensorConfig::ADAPTIVE_SENSING_ENABLED {
            if value.require_bool(key)? {
                self.enable_adaptive_sensing(task)?;
            } else {
                self.disable_adaptive_sensing(task)?;
            }
        }
        task.sensor().set_sensor_config(key, value)
    }

    pub fn get_sensor_config_value(
        &self,
        sensor_type: SensorType,
        key: &str,
    ) -> Result<ConfigValue> {
        self.task(sensor_type)?.sensor().get_sensor_config(key)
    }

    /// Store a manager-wide setting. `ACQUIRE_WAKE_LOCK` additionally takes
    /// or releases the wake resource and needs [`Permission::WakeLock`].
    pub fn set_global_config(&self, key: &str, value: impl Into<ConfigValue>) -> Result<()> {
        let value = value.into();
        let mut wake_lock = self.wake_lock.lock();
        if key == GlobalConfig::ACQUIRE_WAKE_LOCK {
            let enable = value.require_bool(key)?;
            if !self.permissions.is_granted(Permission::WakeLock) {
                return Err(SensorError::PermissionDenied(format!(
                    "sensor manager requires the {} permission",
                    Permission::WakeLock
                )));
            }
            match (enable, wake_lock.is_some()) {
                (true, false) => *wake_lock = Some(WakeLockGuard::acquire(self.power.clone())?),
                (false, true) => *wake_lock = None,
                _ => debug!(
                    "[Manager] Wake lock already {}",
                    if enable { "held" } else { "released" }
                ),
            }
        }
        self.global_config.set(key, value).map(|_| ())
    }

    pub fn get_global_config(&self, key: &str) -> Result<ConfigValue> {
        let _guard = self.wake_lock.lock();
        self.global_config.get(key)
    }

    /// Forward a low-battery crossing to every non-paused subscription.
    /// Returns how many listeners it was queued for.
    pub fn broadcast_low_battery_crossing(&self, is_below_threshold: bool) -> usize {
        relay_low_battery(&self.registry, is_below_threshold, None)
    }

    pub fn sensor_types(&self) -> impl Iterator<Item = SensorType> + '_ {
        self.tasks.keys().copied()
    }

    pub fn sensor_category(&self, sensor_type: SensorType) -> Result<SensorCategory> {
        Ok(self.task(sensor_type)?.category())
    }

    pub fn is_running(&self, sensor_type: SensorType) -> Result<bool> {
        Ok(self.task(sensor_type)?.is_running())
    }

    /// Whether `id` refers to a live subscription.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.registry.contains(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    fn task(&self, sensor_type: SensorType) -> Result<&Arc<SensorTask>> {
        self.tasks
            .get(&sensor_type)
            .ok_or(SensorError::UnknownSensorType(sensor_type))
    }

    fn adaptive(&self) -> Result<&Arc<dyn AdaptiveSensing>> {
        self.adaptive.as_ref().ok_or_else(|| {
            SensorError::OperationNotSupported("adaptive sensing is not available".to_string())
        })
    }

    fn enable_adaptive_sensing(&self, task: &Arc<SensorTask>) -> Result<()> {
        let sensor_type = task.sensor_type();
        let Some(driver) = task.sensor().as_pull() else {
            return Err(SensorError::OperationNotSupported(format!(
                "adaptive sensing is supported only for pull sensors, {} is push",
                sensor_type
            )));
        };
        let adaptive = self.adaptive()?;
        if adaptive.is_sensor_registered(sensor_type) {
            return Err(SensorError::OperationNotSupported(format!(
                "adaptive sensing already enabled for {}",
                sensor_type
            )));
        }
        adaptive.register_sensor(driver.clone(), driver.classifier(), task.clone())
    }

    fn disable_adaptive_sensing(&self, task: &Arc<SensorTask>) -> Result<()> {
        let sensor_type = task.sensor_type();
        let adaptive = self.adaptive()?;
        if !adaptive.is_sensor_registered(sensor_type) {
            return Err(SensorError::OperationNotSupported(format!(
                "adaptive sensing not enabled for {}",
                sensor_type
            )));
        }
        adaptive.unregister_sensor(sensor_type)
    }
}

impl Drop for SensorManager {
    fn drop(&mut self) {
        if let Some(relay) = self.battery_relay.take() {
            relay.unregister();
        }
        for (_, subscription) in self.registry.all_subscriptions() {
            subscription.unregister();
        }
        for task in self.tasks.values() {
            task.stop();
        }
        if self.wake_lock.get_mut().take().is_some() {
            debug!("[Manager] Wake lock released on teardown");
        }
        info!("[Manager] Stopped");
    }
}

fn relay_low_battery(
    registry: &SubscriptionRegistry,
    is_below_threshold: bool,
    skip: Option<SensorType>,
) -> usize {
    registry
        .all_subscriptions()
        .into_iter()
        .filter(|(_, sub)| Some(sub.sensor_type()) != skip)
        .filter(|(_, sub)| sub.notify_low_battery(is_below_threshold))
        .count()
}

/// The manager's own listener on the battery channel.
struct BatteryRelay {
    registry: Weak<SubscriptionRegistry>,
}

impl SensorDataListener for BatteryRelay {
    fn on_data_sensed(&self, _data: &SensorData) {}

    fn on_crossing_low_battery_threshold(&self, is_below_threshold: bool) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // Battery subscribers already got the signal from the battery task itself
        let delivered =
            relay_low_battery(&registry, is_below_threshold, Some(SensorType::Battery));
        info!(
            "[Manager] Low battery {} relayed to {} subscriber(s)",
            if is_below_threshold { "entered" } else { "cleared" },
            delivered
        );
    }
}
