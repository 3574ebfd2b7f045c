/*++

Licensed under the Apache-2.0 license.

File Name:

    provisioner.rs

Abstract:

    One provisioning cycle: fetch the server's encryption key, top up each
    security level's key pool, get the new keys signed and store the chains.

--*/

use rkp_cbor::{decode_encryption_key_response, decode_signed_certificates, EncryptionKeyResponse};
use rkp_error::{ProvisionerError, ProvisionerResult};
use rkp_types::SecurityLevel;
use rkp_x509::process_chain;

use crate::pool::generate_keys_needed;
use crate::{
    KeyCustodian, ProvisionerConfig, ProvisioningServer, Settings, SettingsStore, StopSignal,
};

/// How a cycle ended, and whether the scheduler should run it again soon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Done until the next periodic run.
    Completed,
    /// Aborted; run again.
    RescheduleRequested,
    /// The server turned provisioning off and the local keys were deleted.
    Disabled,
}

impl CycleOutcome {
    pub fn wants_reschedule(self) -> bool {
        self == CycleOutcome::RescheduleRequested
    }
}

pub struct Provisioner<C, S, T> {
    custodian: C,
    server: S,
    settings: T,
    config: ProvisionerConfig,
}

impl<C, S, T> Provisioner<C, S, T>
where
    C: KeyCustodian,
    S: ProvisioningServer,
    T: SettingsStore,
{
    pub fn new(custodian: C, server: S, settings: T, config: ProvisionerConfig) -> Self {
        Self {
            custodian,
            server,
            settings,
            config,
        }
    }

    pub fn custodian(&self) -> &C {
        &self.custodian
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn settings(&self) -> &T {
        &self.settings
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Run one cycle to completion or until `stop` fires.
    pub fn run_cycle(&self, stop: &StopSignal) -> CycleOutcome {
        match self.try_run_cycle(stop) {
            Ok(outcome) => {
                log::info!("Provisioning cycle finished: {outcome:?}");
                outcome
            }
            Err(err) => self.handle_failure(err),
        }
    }

    fn try_run_cycle(&self, stop: &StopSignal) -> ProvisionerResult<CycleOutcome> {
        // Server-directed changes to the URL apply from the next cycle on.
        let snapshot = self.load_settings()?;
        let base_url = snapshot.provisioning_url.as_str();

        let response = self.fetch_encryption_key(base_url, stop)?;
        if snapshot.extra_signed_keys_available == 0 {
            match response.extra_keys_allowed() {
                Some(extra_keys) if extra_keys > 0 => {
                    log::info!("Server re-enabled provisioning with {extra_keys} extra keys");
                }
                _ => {
                    log::info!("Provisioning is disabled");
                    return Ok(CycleOutcome::Completed);
                }
            }
        }

        let settings = self.settings.set_device_config(response.device_config())?;
        if response.extra_keys_allowed() == Some(0) {
            log::warn!("Server disabled provisioning, deleting all attestation keys");
            match self.custodian.delete_all_keys() {
                Ok(deleted) => log::info!("Deleted {deleted} attestation keys"),
                Err(err) => log::error!("Failed to delete attestation keys: {err}"),
            }
            return Ok(CycleOutcome::Disabled);
        }

        let impls = self.custodian.get_implementation_info()?;
        if impls.is_empty() {
            log::error!("No remotely provisioned components registered");
            return Err(ProvisionerError::CUSTODIAN_NO_IMPLEMENTATIONS);
        }

        let mut needed = Vec::with_capacity(impls.len());
        for info in impls {
            let num_keys = generate_keys_needed(
                &self.custodian,
                &self.config,
                info.security_level,
                settings.expiring_by(),
                settings.extra_signed_keys_available,
                stop,
            )?;
            log::info!(
                "{} (curve {}) needs {num_keys} keys signed",
                info.security_level,
                info.supported_curve
            );
            needed.push((info.security_level, num_keys));
        }

        for (security_level, num_keys) in needed {
            if num_keys > 0 {
                self.provision_certs(num_keys, security_level, &response, base_url, stop)?;
            }
        }

        self.settings.reset_failure_counter()?;
        Ok(CycleOutcome::Completed)
    }

    /// Load the settings snapshot, resetting stored settings that can no
    /// longer be read so a damaged store cannot stall provisioning.
    fn load_settings(&self) -> ProvisionerResult<Settings> {
        match self.settings.load() {
            Err(err)
                if err == ProvisionerError::SETTINGS_READ
                    || err == ProvisionerError::SETTINGS_PARSE =>
            {
                log::warn!("Unreadable provisioning settings ({err}), resetting to defaults");
                self.settings.clear_all()?;
                self.settings.load()
            }
            result => result,
        }
    }

    fn fetch_encryption_key(
        &self,
        base_url: &str,
        stop: &StopSignal,
    ) -> ProvisionerResult<EncryptionKeyResponse> {
        stop.check()?;
        let bytes = self.server.fetch_eek(base_url)?;
        decode_encryption_key_response(&bytes)
    }

    fn handle_failure(&self, err: ProvisionerError) -> CycleOutcome {
        if !err.counts_as_failure() {
            log::warn!("Provisioning cycle aborted: {err}");
            return CycleOutcome::RescheduleRequested;
        }
        log::error!("Provisioning cycle failed: {err}");
        match self.settings.increment_failure_counter() {
            Ok(count) if count > self.config.failure_maximum => {
                log::warn!("{count} consecutive failures, resetting provisioning settings");
                if let Err(err) = self.settings.clear_all() {
                    log::error!("Failed to reset provisioning settings: {err}");
                }
            }
            Ok(_) => (),
            Err(err) => log::error!("Failed to record provisioning failure: {err}"),
        }
        CycleOutcome::RescheduleRequested
    }

    /// Have `num_keys` keys at `security_level` signed and store the chains.
    /// Returns the number of chains stored.
    ///
    /// The first chain that fails to validate or store aborts the rest of the
    /// batch; chains stored before it stay stored.
    pub fn provision_certs(
        &self,
        num_keys: u32,
        security_level: SecurityLevel,
        response: &EncryptionKeyResponse,
        base_url: &str,
        stop: &StopSignal,
    ) -> ProvisionerResult<usize> {
        if num_keys < 1 {
            log::error!("Request at least 1 key to be signed. Num requested: {num_keys}");
            return Err(ProvisionerError::CONFIG_NUM_KEYS_TOO_SMALL);
        }
        let csr = self.custodian.generate_csr(
            self.config.test_mode,
            num_keys,
            response.key_material(),
            response.challenge(),
            security_level,
        )?;
        if csr.is_empty() {
            log::error!("Key custodian returned an empty CSR bundle");
            return Err(ProvisionerError::CUSTODIAN_EMPTY_CSR);
        }

        stop.check()?;
        let signed = self
            .server
            .sign_certificates(base_url, &csr, response.challenge())?;
        let chains = decode_signed_certificates(&signed)?;

        let mut stored = 0;
        for chain in chains {
            let record = process_chain(chain, security_level)?;
            self.custodian.provision_cert_chain(&record)?;
            stored += 1;
        }
        log::info!("Stored {stored} {security_level} certificate chains");
        Ok(stored)
    }
}
