//! Store of live subscriptions keyed by opaque identifiers.

use super::Subscription;
use crate::error::{Result, SensorError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque subscription handle. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriptionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    last_id: AtomicU64,
    subscriptions: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subscription under a fresh identifier.
    pub fn register(&self, subscription: Arc<Subscription>) -> SubscriptionId {
        let id = SubscriptionId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.subscriptions.write().insert(id, subscription);
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> Result<Arc<Subscription>> {
        self.subscriptions
            .write()
            .remove(&id)
            .ok_or(SensorError::InvalidState(id))
    }

    pub fn get(&self, id: SubscriptionId) -> Result<Arc<Subscription>> {
        self.subscriptions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SensorError::InvalidState(id))
    }

    /// Copy of every live subscription, ordered by identifier.
    pub fn all_subscriptions(&self) -> Vec<(SubscriptionId, Arc<Subscription>)> {
        let mut all: Vec<_> = self
            .subscriptions
            .read()
            .iter()
            .map(|(id, sub)| (*id, sub.clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
