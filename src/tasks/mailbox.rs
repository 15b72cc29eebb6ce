//! Per-listener delivery queue.
//!
//! Every subscription owns a bounded mailbox drained by its own worker, so
//! the fan-out in a sensor task only ever does a non-blocking `try_send`.
//! A listener that blocks or panics affects nothing but its own queue.

use crate::sensors::{SensorData, SensorDataListener};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Something to hand to a listener.
#[derive(Clone, Debug)]
pub(crate) enum Delivery {
    Data(Arc<SensorData>),
    LowBatteryThreshold(bool),
}

/// Flags shared between a subscription and its mailbox worker.
#[derive(Debug)]
pub(crate) struct DeliveryGate {
    paused: AtomicBool,
    active: AtomicBool,
}

impl DeliveryGate {
    pub(crate) fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Close the gate. Returns `true` only for the call that closed it.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn accepts(&self) -> bool {
        self.is_active() && !self.is_paused()
    }
}

pub(crate) struct Mailbox {
    sender: Mutex<Option<mpsc::Sender<Delivery>>>,
}

impl Mailbox {
    /// Spawn the worker that drains this mailbox into `listener`.
    pub(crate) fn spawn(
        runtime: &Handle,
        listener: Arc<dyn SensorDataListener>,
        gate: Arc<DeliveryGate>,
        capacity: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Delivery>(capacity.max(1));

        runtime.spawn(async move {
            while let Some(delivery) = rx.recv().await {
                // Paused or unregistered after the item was queued
                if !gate.accepts() {
                    continue;
                }
                let listener = listener.clone();
                let outcome = tokio::task::spawn_blocking(move || match &delivery {
                    Delivery::Data(data) => listener.on_data_sensed(data),
                    Delivery::LowBatteryThreshold(below) => {
                        listener.on_crossing_low_battery_threshold(*below)
                    }
                })
                .await;
                if let Err(e) = outcome {
                    error!("[Dispatch] Listener callback failed: {}", e);
                }
            }
            debug!("[Dispatch] Mailbox closed");
        });

        Self {
            sender: Mutex::new(Some(tx)),
        }
    }

    /// Queue a delivery without blocking. Returns `false` if it was dropped.
    pub(crate) fn post(&self, delivery: Delivery) -> bool {
        let guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        match tx.try_send(delivery) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("[Dispatch] Listener mailbox full, dropping delivery");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Stop accepting deliveries; the worker exits once the queue drains.
    pub(crate) fn close(&self) {
        self.sender.lock().take();
    }
}
