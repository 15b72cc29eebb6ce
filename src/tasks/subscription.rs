//! Binding of one listener to one sensor task.

use super::SensorTask;
use super::mailbox::{Delivery, DeliveryGate, Mailbox};
use crate::sensors::{SensorDataListener, SensorType};
use std::sync::Arc;

/// A listener attached to a [`SensorTask`], independently pausable.
///
/// The task only keeps a weak back-reference; ownership lives with the
/// [`SubscriptionRegistry`](super::SubscriptionRegistry) (or with an
/// internal consumer such as the battery relay).
pub struct Subscription {
    task: Arc<SensorTask>,
    listener: Arc<dyn SensorDataListener>,
    gate: Arc<DeliveryGate>,
    mailbox: Mailbox,
}

impl Subscription {
    /// Create the subscription and attach it to `task`.
    pub fn new(task: Arc<SensorTask>, listener: Arc<dyn SensorDataListener>) -> Arc<Self> {
        let gate = Arc::new(DeliveryGate::new());
        let mailbox = Mailbox::spawn(
            task.runtime(),
            listener.clone(),
            gate.clone(),
            task.mailbox_capacity(),
        );
        let subscription = Arc::new(Self {
            task,
            listener,
            gate,
            mailbox,
        });
        subscription.task.attach(&subscription);
        subscription
    }

    pub fn pause(&self) {
        self.gate.set_paused(true);
    }

    pub fn unpause(&self) {
        self.gate.set_paused(false);
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// `false` once [`unregister`](Self::unregister) has run.
    pub fn is_registered(&self) -> bool {
        self.gate.is_active()
    }

    pub fn listener(&self) -> &Arc<dyn SensorDataListener> {
        &self.listener
    }

    pub fn task(&self) -> &Arc<SensorTask> {
        &self.task
    }

    pub fn sensor_type(&self) -> SensorType {
        self.task.sensor_type()
    }

    /// Detach from the task. Idempotent.
    pub fn unregister(&self) {
        if self.gate.deactivate() {
            self.task.detach(self);
            self.mailbox.close();
        }
    }

    /// Queue a delivery unless paused or unregistered.
    pub(crate) fn deliver(&self, delivery: Delivery) -> bool {
        self.gate.accepts() && self.mailbox.post(delivery)
    }

    pub(crate) fn notify_low_battery(&self, is_below_threshold: bool) -> bool {
        self.deliver(Delivery::LowBatteryThreshold(is_below_threshold))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingListener, push_task, wait_for};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pause_skips_and_unpause_resumes() {
        let (task, sink) = push_task(SensorType::Battery);
        let listener = Arc::new(RecordingListener::new());
        let sub = Subscription::new(task.clone(), listener.clone());

        sub.pause();
        sub.pause();
        assert!(sub.is_paused());
        sink.low_battery_threshold(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(listener.battery_signals().is_empty());

        sub.unpause();
        assert!(!sub.is_paused());
        sink.low_battery_threshold(false);
        wait_for(|| listener.battery_signals() == vec![false]).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unregister_is_idempotent_and_detaches() {
        let (task, _sink) = push_task(SensorType::PhoneState);
        let sub = Subscription::new(task.clone(), Arc::new(RecordingListener::new()));
        assert_eq!(task.subscriber_count(), 1);

        sub.unregister();
        sub.unregister();
        assert!(!sub.is_registered());
        assert_eq!(task.subscriber_count(), 0);
        assert!(!sub.deliver(Delivery::LowBatteryThreshold(true)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_drop_detaches_from_task() {
        let (task, _sink) = push_task(SensorType::Screen);
        let sub = Subscription::new(task.clone(), Arc::new(RecordingListener::new()));
        assert_eq!(sub.sensor_type(), SensorType::Screen);
        drop(sub);
        assert_eq!(task.subscriber_count(), 0);
    }
}
