/*++

Licensed under the Apache-2.0 license.

File Name:

    pool.rs

Abstract:

    Attestation key pool watermark: how many keys to generate and how many
    to send for signing.

--*/

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rkp_error::ProvisionerResult;
use rkp_types::{PoolStatus, SecurityLevel};

use crate::{KeyCustodian, ProvisionerConfig, StopSignal};

/// Pool counts derived from a [`PoolStatus`]. Computed in signed arithmetic so
/// counts that break the pool invariants cannot wrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyDeficit {
    pub unattested: i64,
    pub valid: i64,
    pub in_use: i64,
    pub target: i64,
}

impl KeyDeficit {
    pub fn new(status: &PoolStatus, extra_keys: u32) -> Self {
        let total = i64::from(status.total);
        let attested = i64::from(status.attested);
        let in_use = attested - i64::from(status.unassigned);
        Self {
            unattested: total - attested,
            valid: attested - i64::from(status.expiring),
            in_use,
            target: in_use + i64::from(extra_keys),
        }
    }

    /// Key pairs to generate before the pool reaches its target.
    pub fn keys_to_generate(&self) -> u32 {
        clamp(self.target - self.unattested - self.valid)
    }

    /// Keys needing signatures once `generated` new pairs exist.
    pub fn keys_to_sign(&self, generated: u32) -> u32 {
        if self.target - self.valid > 0 {
            clamp(i64::from(generated) + self.unattested)
        } else {
            0
        }
    }
}

fn clamp(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Keys needing signatures for `status`, assuming every missing pair gets
/// generated.
pub fn estimate(status: &PoolStatus, extra_keys: u32) -> u32 {
    let deficit = KeyDeficit::new(status, extra_keys);
    deficit.keys_to_sign(deficit.keys_to_generate())
}

fn expiration_horizon_millis(expiring_by: Duration) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    i64::try_from(now.saturating_add(expiring_by).as_millis()).unwrap_or(i64::MAX)
}

/// Top up the pool at `security_level` and return how many keys need signing.
///
/// Generation is throttled by the configured pause, except when the pool
/// started out empty. `stop` is checked before every generation.
pub fn generate_keys_needed<C: KeyCustodian + ?Sized>(
    custodian: &C,
    config: &ProvisionerConfig,
    security_level: SecurityLevel,
    expiring_by: Duration,
    extra_keys: u32,
    stop: &StopSignal,
) -> ProvisionerResult<u32> {
    let status =
        custodian.get_pool_status(expiration_horizon_millis(expiring_by), security_level)?;
    let deficit = KeyDeficit::new(&status, extra_keys);
    log::debug!("{security_level} pool {status:?}: {deficit:?}");

    let to_generate = deficit.keys_to_generate();
    for generated in 0..to_generate {
        if generated != 0 && status.total != 0 {
            stop.pause(config.key_generation_pause())?;
        } else {
            stop.check()?;
        }
        custodian.generate_key_pair(config.test_mode, security_level)?;
    }
    if to_generate != 0 {
        log::info!("Generated {to_generate} {security_level} key pairs");
    }
    Ok(deficit.keys_to_sign(to_generate))
}
