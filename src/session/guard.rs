//! Bounded-wait mutual exclusion around shared session state.
//!
//! Radio stack callbacks may run in time-critical contexts, so no caller is
//! allowed to wait indefinitely for the lock: after `GUARD_TIMEOUT_MS` the
//! operation is abandoned with [`SessionError::Contention`].

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration};

use crate::config::GUARD_TIMEOUT_MS;
use crate::error::SessionError;

pub struct Guard<T> {
    inner: Mutex<CriticalSectionRawMutex, T>,
    timeout: Duration,
}

impl<T> Guard<T> {
    pub const fn new(value: T) -> Self {
        Self::with_timeout(value, Duration::from_millis(GUARD_TIMEOUT_MS))
    }

    pub const fn with_timeout(value: T, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(value),
            timeout,
        }
    }

    /// Acquire exclusive access, waiting at most the configured timeout.
    pub async fn lock(&self) -> Result<MutexGuard<'_, CriticalSectionRawMutex, T>, SessionError> {
        match with_timeout(self.timeout, self.inner.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!("session guard not acquired within {} ms", self.timeout.as_millis());
                Err(SessionError::Contention)
            }
        }
    }

    /// Acquire without waiting; `Contention` if the lock is held.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, CriticalSectionRawMutex, T>, SessionError> {
        self.inner.try_lock().map_err(|_| SessionError::Contention)
    }
}
