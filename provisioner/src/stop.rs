// Licensed under the Apache-2.0 license

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rkp_error::{ProvisionerError, ProvisionerResult};

/// Cooperative cancellation shared between a running cycle and whoever
/// scheduled it. Cloning yields a handle to the same signal.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn stopped(&self) -> MutexGuard<'_, bool> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request cancellation and wake any pending [`StopSignal::pause`].
    pub fn stop(&self) {
        *self.stopped() = true;
        self.inner.1.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped()
    }

    pub fn check(&self) -> ProvisionerResult<()> {
        if self.is_stopped() {
            log::info!("Provisioning cycle cancelled");
            return Err(ProvisionerError::CYCLE_CANCELLED);
        }
        Ok(())
    }

    /// Sleep for `duration`, returning early with `CYCLE_CANCELLED` if the
    /// signal fires.
    pub fn pause(&self, duration: Duration) -> ProvisionerResult<()> {
        let guard = self.stopped();
        let (guard, _) = self
            .inner
            .1
            .wait_timeout_while(guard, duration, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        let stopped = *guard;
        drop(guard);
        if stopped {
            log::info!("Provisioning cycle cancelled during pause");
            return Err(ProvisionerError::CYCLE_CANCELLED);
        }
        Ok(())
    }
}
