//! Sensor tasks, subscriptions and the subscription registry.
//!
//! Ownership runs one way: the registry owns subscriptions, a subscription
//! owns a handle to its task, and a task only keeps weak references back to
//! its subscribers.

mod mailbox;
pub mod registry;
pub mod sensor_task;
pub mod subscription;

pub use registry::{SubscriptionId, SubscriptionRegistry};
pub use sensor_task::{PushSink, SensorTask, TaskOptions};
pub use subscription::Subscription;
