// Licensed under the Apache-2.0 license

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rkp_error::{ProvisionerError, ProvisionerResult};

use crate::{
    CycleOutcome, KeyCustodian, Provisioner, ProvisioningServer, SettingsStore, StopSignal,
};

/// A provisioning cycle running on its own worker thread.
pub struct ProvisioningJob {
    stop: StopSignal,
    handle: JoinHandle<CycleOutcome>,
}

impl ProvisioningJob {
    pub fn start<C, S, T>(provisioner: Arc<Provisioner<C, S, T>>) -> ProvisionerResult<Self>
    where
        C: KeyCustodian + Send + Sync + 'static,
        S: ProvisioningServer + Send + Sync + 'static,
        T: SettingsStore + Send + Sync + 'static,
    {
        let stop = StopSignal::new();
        let worker_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("rkp-provisioner".into())
            .spawn(move || provisioner.run_cycle(&worker_stop))
            .map_err(|err| {
                log::error!("Failed to spawn provisioner thread: {err}");
                ProvisionerError::SCHEDULER_WORKER_SPAWN
            })?;
        Ok(Self { stop, handle })
    }

    /// Ask the cycle to stop at its next network call or pause.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> CycleOutcome {
        self.handle.join().unwrap_or_else(|_| {
            log::error!("Provisioner thread panicked");
            CycleOutcome::RescheduleRequested
        })
    }
}
