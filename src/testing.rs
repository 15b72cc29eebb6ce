//! Fakes shared by the unit tests.

use crate::error::{Result, SensorError};
use crate::sensors::{
    ConfigStore, PullSensor, PushSensor, Sensor, SensorConfig, SensorData, SensorDataListener,
    SensorDriver, SensorPayload, SensorType,
};
use crate::tasks::{PushSink, SensorTask, TaskOptions};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;

/// Poll `condition` until it holds, failing the test after a few seconds.
pub(crate) async fn wait_for(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached before timeout");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

enum Behaviour {
    Record,
    PanicOnce(AtomicBool),
    Block(Duration),
}

/// Listener that records everything it is handed.
pub(crate) struct RecordingListener {
    samples: Mutex<Vec<SensorData>>,
    battery: Mutex<Vec<bool>>,
    behaviour: Behaviour,
}

impl RecordingListener {
    pub(crate) fn new() -> Self {
        Self::with(Behaviour::Record)
    }

    /// Panics on its first callback, records afterwards.
    pub(crate) fn panicking_once() -> Self {
        Self::with(Behaviour::PanicOnce(AtomicBool::new(false)))
    }

    /// Sleeps for `delay` inside every callback before recording.
    pub(crate) fn blocking(delay: Duration) -> Self {
        Self::with(Behaviour::Block(delay))
    }

    fn with(behaviour: Behaviour) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            battery: Mutex::new(Vec::new()),
            behaviour,
        }
    }

    pub(crate) fn samples(&self) -> Vec<SensorData> {
        self.samples.lock().clone()
    }

    pub(crate) fn battery_signals(&self) -> Vec<bool> {
        self.battery.lock().clone()
    }

    fn before_callback(&self) {
        match &self.behaviour {
            Behaviour::Record => {}
            Behaviour::PanicOnce(fired) => {
                if !fired.swap(true, Ordering::SeqCst) {
                    panic!("listener failure");
                }
            }
            Behaviour::Block(delay) => std::thread::sleep(*delay),
        }
    }
}

impl SensorDataListener for RecordingListener {
    fn on_data_sensed(&self, data: &SensorData) {
        self.before_callback();
        self.samples.lock().push(data.clone());
    }

    fn on_crossing_low_battery_threshold(&self, is_below_threshold: bool) {
        self.before_callback();
        self.battery.lock().push(is_below_threshold);
    }
}

/// Pull accelerometer returning a constant window and counting fetches.
pub(crate) struct CountingPullSensor {
    config: ConfigStore,
    window: usize,
    fetches: Arc<AtomicUsize>,
}

impl CountingPullSensor {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            config: SensorConfig::pull_defaults(10),
            window,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

impl Sensor for CountingPullSensor {
    fn sensor_type(&self) -> SensorType {
        SensorType::Accelerometer
    }

    fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl PullSensor for CountingPullSensor {
    fn fetch(&self) -> Result<SensorData> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(SensorData::new(
            SensorType::Accelerometer,
            SensorPayload::Accelerometer {
                samples: vec![[0.0, 0.0, 9.81]; self.window],
            },
        ))
    }
}

/// Push driver that hands its sink back to the test.
pub(crate) struct ScriptedPushSensor {
    sensor_type: SensorType,
    config: ConfigStore,
    sink: Arc<Mutex<Option<PushSink>>>,
}

impl ScriptedPushSensor {
    pub(crate) fn new(sensor_type: SensorType) -> Self {
        Self {
            sensor_type,
            config: SensorConfig::push_defaults(),
            sink: Arc::new(Mutex::new(None)),
        }
    }

    /// Shared slot the sink lands in once the task starts the driver.
    pub(crate) fn sink_slot(&self) -> Arc<Mutex<Option<PushSink>>> {
        self.sink.clone()
    }
}

impl Sensor for ScriptedPushSensor {
    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl PushSensor for ScriptedPushSensor {
    fn start(&self, sink: PushSink) -> Result<()> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FailingPushSensor {
    config: ConfigStore,
}

impl Sensor for FailingPushSensor {
    fn sensor_type(&self) -> SensorType {
        SensorType::Bluetooth
    }

    fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl PushSensor for FailingPushSensor {
    fn start(&self, _sink: PushSink) -> Result<()> {
        Err(SensorError::Driver("radio unavailable".to_string()))
    }
}

/// A started push task and the sink its driver received.
pub(crate) fn push_task(sensor_type: SensorType) -> (Arc<SensorTask>, PushSink) {
    let driver = ScriptedPushSensor::new(sensor_type);
    let slot = driver.sink_slot();
    let task = SensorTask::new(
        SensorDriver::push(driver),
        Handle::current(),
        TaskOptions::default(),
    );
    task.start().expect("scripted driver starts");
    let sink = slot.lock().clone().expect("sink handed over on start");
    (task, sink)
}
