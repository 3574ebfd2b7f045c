// Licensed under the Apache-2.0 license

use rkp_error::ProvisionerResult;
use rkp_types::{ImplInfo, PoolStatus, ProvisionedKeyRecord, SecurityLevel};

/// The local secure component that generates attestation keys, builds CSRs
/// over them and stores the signed chains that come back.
///
/// Implementations report failures with the `CUSTODIAN_*` error codes.
pub trait KeyCustodian {
    /// Build a CSR covering `num_keys` unsigned keys, encrypted to the
    /// server's `key_material` and bound to `challenge`.
    fn generate_csr(
        &self,
        test_mode: bool,
        num_keys: u32,
        key_material: &[u8],
        challenge: &[u8],
        security_level: SecurityLevel,
    ) -> ProvisionerResult<Vec<u8>>;

    fn generate_key_pair(
        &self,
        test_mode: bool,
        security_level: SecurityLevel,
    ) -> ProvisionerResult<()>;

    /// Pool counts, where "expiring" means expiring before now plus
    /// `expiring_by_millis`.
    fn get_pool_status(
        &self,
        expiring_by_millis: i64,
        security_level: SecurityLevel,
    ) -> ProvisionerResult<PoolStatus>;

    fn provision_cert_chain(&self, record: &ProvisionedKeyRecord) -> ProvisionerResult<()>;

    /// Drop every attestation key at every security level.
    fn delete_all_keys(&self) -> ProvisionerResult<u32>;

    fn get_implementation_info(&self) -> ProvisionerResult<Vec<ImplInfo>>;
}
