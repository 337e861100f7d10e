use std::sync::Mutex;
use std::sync::MutexGuard;

use tracing::warn;

/// Locks a mutex, recovering the inner value when a previous holder
/// panicked instead of propagating the poison.
pub fn lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!("recovering from poisoned mutex");
        poisoned.into_inner()
    })
}
