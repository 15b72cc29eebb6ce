//! Wake-resource and permission capabilities.
//!
//! The platform power manager is an external collaborator. The manager only
//! needs to acquire and release a single process-wide wake resource, which
//! [`WakeLockGuard`] scopes: it is released exactly once, when the guard is
//! dropped.

use crate::error::Result;
use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use strum::Display;

/// Privileges that must be granted from outside the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    WakeLock,
}

pub trait PermissionChecker: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

/// Fixed permission set, decided at construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticPermissions {
    pub wake_lock: bool,
}

impl StaticPermissions {
    pub fn all() -> Self {
        Self { wake_lock: true }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl PermissionChecker for StaticPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::WakeLock => self.wake_lock,
        }
    }
}

/// Platform handle for the process-wide wake resource.
pub trait PowerManager: Send + Sync {
    fn acquire_wake_lock(&self) -> Result<()>;
    fn release_wake_lock(&self);
}

/// Power manager for hosts without a wake resource: tracks state and logs.
#[derive(Debug, Default)]
pub struct LoggingPowerManager {
    held: AtomicBool,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
}

impl LoggingPowerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Total number of acquisitions over the process lifetime.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl PowerManager for LoggingPowerManager {
    fn acquire_wake_lock(&self) -> Result<()> {
        self.held.store(true, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        info!("[Power] Wake lock acquired");
        Ok(())
    }

    fn release_wake_lock(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.releases.fetch_add(1, Ordering::SeqCst);
        info!("[Power] Wake lock released");
    }
}

/// Held wake resource. Released when dropped.
pub struct WakeLockGuard {
    power: Arc<dyn PowerManager>,
}

impl WakeLockGuard {
    pub fn acquire(power: Arc<dyn PowerManager>) -> Result<Self> {
        power.acquire_wake_lock()?;
        Ok(Self { power })
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        debug!("[Power] Releasing wake lock guard");
        self.power.release_wake_lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_guard_releases_once_on_drop() {
        let power = Arc::new(LoggingPowerManager::new());
        let guard = assert_ok!(WakeLockGuard::acquire(power.clone()));
        assert!(power.is_held());
        drop(guard);
        assert!(!power.is_held());
        assert_eq!(power.acquisitions(), 1);
        assert_eq!(power.releases(), 1);
    }

    #[test]
    fn test_static_permissions() {
        assert!(StaticPermissions::all().is_granted(Permission::WakeLock));
        assert!(!StaticPermissions::none().is_granted(Permission::WakeLock));
        assert_eq!(Permission::WakeLock.to_string(), "WAKE_LOCK");
    }
}
