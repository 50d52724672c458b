//! Per-driver serialization of stop replacement
//!
//! Replacing a driver's stops is a delete followed by an insert with no
//! transaction around them. Holding the driver's lock across both steps keeps
//! two replaces for the same driver from interleaving. The registry is
//! per-process: separate server instances do not see each other's locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct DriverLocks {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl DriverLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `driver_id`
    ///
    /// Entries whose lock nobody holds or waits on are pruned on each call.
    pub async fn lock(&self, driver_id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| lock.strong_count() > 0);

            match locks.get(driver_id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(AsyncMutex::new(()));
                    locks.insert(driver_id.to_string(), Arc::downgrade(&created));
                    created
                }
            }
        };

        mutex.lock_owned().await
    }

    /// Number of drivers with a live lock
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }
}
