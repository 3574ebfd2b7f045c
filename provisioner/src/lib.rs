/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Remote key provisioning: keeps the local attestation key pool topped up
    with server-signed certificate chains. The scheduler calls
    `Provisioner::run_cycle` (directly or through `ProvisioningJob`) and
    honors the returned `CycleOutcome`.

--*/

mod config;
mod custodian;
mod job;
mod pool;
mod provisioner;
mod server;
mod settings;
mod stop;

pub use config::ProvisionerConfig;
pub use custodian::KeyCustodian;
pub use job::ProvisioningJob;
pub use pool::{estimate, generate_keys_needed, KeyDeficit};
pub use provisioner::{CycleOutcome, Provisioner};
pub use server::{eek_url, sign_url, HttpServer, ProvisioningServer, EEK_PATH, SIGN_PATH};
pub use settings::{FileSettingsStore, MemorySettingsStore, Settings, SettingsStore};
pub use stop::StopSignal;

pub use rkp_cbor::{
    decode_encryption_key_response, decode_signed_certificates, DeviceConfig,
    EncryptionKeyResponse,
};
pub use rkp_error::{ErrorKind, ProvisionerError, ProvisionerResult};
pub use rkp_types::{
    ImplInfo, PoolStatus, ProvisionedKeyRecord, SecurityLevel, SignedCertificateChain,
};
