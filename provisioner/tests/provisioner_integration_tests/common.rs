// Licensed under the Apache-2.0 license

use std::sync::{Mutex, Once};

use ciborium::value::Value;
use openssl::nid::Nid;
use rkp_provisioner::{
    ImplInfo, KeyCustodian, MemorySettingsStore, PoolStatus, ProvisionedKeyRecord,
    Provisioner, ProvisionerConfig, ProvisionerError, ProvisionerResult, ProvisioningServer,
    SecurityLevel, Settings,
};
pub use rkp_x509::test_util::EcAsymKey;

pub const NOT_AFTER: i64 = 1_900_000_000;
pub const CHALLENGE: &[u8] = b"fresh challenge";
pub const BASE_URL: &str = "https://rkp.example.com";

pub type TestProvisioner = Provisioner<MockCustodian, MockServer, MemorySettingsStore>;

static LOGGER: Once = Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    });
}

fn encode(value: &Value) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).unwrap();
    bytes
}

/// `[[eek certs], challenge, {device config}]`, the map only when
/// `extra_keys` is set.
pub fn eek_response(extra_keys: Option<u32>, provisioning_url: Option<&str>) -> Vec<u8> {
    let mut items = vec![
        Value::Array(vec![
            Value::Bytes(vec![0x01, 0x02, 0x03]),
            Value::Bytes(vec![0x04, 0x05, 0x06]),
        ]),
        Value::Bytes(CHALLENGE.to_vec()),
    ];
    let mut config = Vec::new();
    if let Some(extra_keys) = extra_keys {
        config.push((
            Value::Text("num_extra_attestation_keys".into()),
            Value::Integer(extra_keys.into()),
        ));
        config.push((
            Value::Text("time_to_refresh_hours".into()),
            Value::Integer(12u32.into()),
        ));
    }
    if let Some(url) = provisioning_url {
        config.push((
            Value::Text("provisioning_url".into()),
            Value::Text(url.into()),
        ));
    }
    if !config.is_empty() {
        items.push(Value::Map(config));
    }
    encode(&Value::Array(items))
}

/// `[shared, [unique...]]`
pub fn signed_certs_response(shared: &[u8], unique: &[Vec<u8>]) -> Vec<u8> {
    encode(&Value::Array(vec![
        Value::Bytes(shared.to_vec()),
        Value::Array(unique.iter().cloned().map(Value::Bytes).collect()),
    ]))
}

/// A root plus `count` P-256 leaves it signed.
pub struct TestChains {
    pub root: Vec<u8>,
    pub leaves: Vec<EcAsymKey>,
    pub leaf_certs: Vec<Vec<u8>>,
}

impl TestChains {
    pub fn new(count: usize) -> Self {
        let root_key = EcAsymKey::new(Nid::SECP384R1);
        let root = root_key.self_signed_cert("root", NOT_AFTER);
        let leaves: Vec<_> = (0..count)
            .map(|_| EcAsymKey::new(Nid::X9_62_PRIME256V1))
            .collect();
        let leaf_certs = leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| leaf.cert(&format!("leaf {i}"), &root_key, NOT_AFTER))
            .collect();
        Self {
            root,
            leaves,
            leaf_certs,
        }
    }

    pub fn response(&self) -> Vec<u8> {
        signed_certs_response(&self.root, &self.leaf_certs)
    }
}

#[derive(Default)]
pub(crate) struct CustodianState {
    pool_horizons: Vec<i64>,
    key_pairs_generated: Vec<SecurityLevel>,
    csr_requests: Vec<(u32, SecurityLevel)>,
    stored: Vec<ProvisionedKeyRecord>,
    delete_all_calls: u32,
}

/// Key custodian with a fixed pool status for every security level.
pub struct MockCustodian {
    pub pool: PoolStatus,
    pub impls: Vec<ImplInfo>,
    pub csr: Vec<u8>,
    /// Returned by every store after the first.
    pub fail_store: Option<ProvisionerError>,
    pub(crate) state: Mutex<CustodianState>,
}

impl Default for MockCustodian {
    fn default() -> Self {
        Self {
            pool: PoolStatus::default(),
            impls: vec![ImplInfo {
                security_level: SecurityLevel::TrustedEnvironment,
                supported_curve: 1,
            }],
            csr: b"csr bundle".to_vec(),
            fail_store: None,
            state: Mutex::default(),
        }
    }
}

impl MockCustodian {
    pub fn with_pool(total: u32, attested: u32, unassigned: u32, expiring: u32) -> Self {
        Self {
            pool: PoolStatus {
                total,
                attested,
                unassigned,
                expiring,
            },
            ..Default::default()
        }
    }

    /// `expiring_by_millis` of each pool status query.
    pub fn pool_horizons(&self) -> Vec<i64> {
        self.state.lock().unwrap().pool_horizons.clone()
    }

    pub fn key_pairs_generated(&self) -> Vec<SecurityLevel> {
        self.state.lock().unwrap().key_pairs_generated.clone()
    }

    pub fn csr_requests(&self) -> Vec<(u32, SecurityLevel)> {
        self.state.lock().unwrap().csr_requests.clone()
    }

    pub fn stored(&self) -> Vec<ProvisionedKeyRecord> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn delete_all_calls(&self) -> u32 {
        self.state.lock().unwrap().delete_all_calls
    }
}

impl KeyCustodian for MockCustodian {
    fn generate_csr(
        &self,
        _test_mode: bool,
        num_keys: u32,
        key_material: &[u8],
        challenge: &[u8],
        security_level: SecurityLevel,
    ) -> ProvisionerResult<Vec<u8>> {
        assert!(!key_material.is_empty());
        assert_eq!(CHALLENGE, challenge);
        self.state
            .lock()
            .unwrap()
            .csr_requests
            .push((num_keys, security_level));
        Ok(self.csr.clone())
    }

    fn generate_key_pair(
        &self,
        _test_mode: bool,
        security_level: SecurityLevel,
    ) -> ProvisionerResult<()> {
        self.state
            .lock()
            .unwrap()
            .key_pairs_generated
            .push(security_level);
        Ok(())
    }

    fn get_pool_status(
        &self,
        expiring_by_millis: i64,
        _security_level: SecurityLevel,
    ) -> ProvisionerResult<PoolStatus> {
        self.state
            .lock()
            .unwrap()
            .pool_horizons
            .push(expiring_by_millis);
        Ok(self.pool)
    }

    fn provision_cert_chain(&self, record: &ProvisionedKeyRecord) -> ProvisionerResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = self.fail_store {
            if !state.stored.is_empty() {
                return Err(err);
            }
        }
        state.stored.push(record.clone());
        Ok(())
    }

    fn delete_all_keys(&self) -> ProvisionerResult<u32> {
        let mut state = self.state.lock().unwrap();
        state.delete_all_calls += 1;
        Ok(state.stored.len() as u32)
    }

    fn get_implementation_info(&self) -> ProvisionerResult<Vec<ImplInfo>> {
        Ok(self.impls.clone())
    }
}

#[derive(Default)]
struct ServerState {
    fetch_urls: Vec<String>,
    sign_requests: Vec<(String, Vec<u8>, Vec<u8>)>,
}

/// Server returning canned responses and recording each request.
pub struct MockServer {
    pub eek: ProvisionerResult<Vec<u8>>,
    pub signed: ProvisionerResult<Vec<u8>>,
    state: Mutex<ServerState>,
}

impl MockServer {
    pub fn new(eek: ProvisionerResult<Vec<u8>>, signed: ProvisionerResult<Vec<u8>>) -> Self {
        Self {
            eek,
            signed,
            state: Mutex::default(),
        }
    }

    pub fn fetch_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().fetch_urls.clone()
    }

    /// (base url, csr, challenge) per call.
    pub fn sign_requests(&self) -> Vec<(String, Vec<u8>, Vec<u8>)> {
        self.state.lock().unwrap().sign_requests.clone()
    }

    pub fn calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.fetch_urls.len() + state.sign_requests.len()
    }
}

impl ProvisioningServer for MockServer {
    fn fetch_eek(&self, base_url: &str) -> ProvisionerResult<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .fetch_urls
            .push(base_url.to_string());
        self.eek.clone()
    }

    fn sign_certificates(
        &self,
        base_url: &str,
        csr: &[u8],
        challenge: &[u8],
    ) -> ProvisionerResult<Vec<u8>> {
        self.state.lock().unwrap().sign_requests.push((
            base_url.to_string(),
            csr.to_vec(),
            challenge.to_vec(),
        ));
        self.signed.clone()
    }
}

pub fn settings_with_url() -> Settings {
    Settings {
        provisioning_url: BASE_URL.into(),
        ..Default::default()
    }
}

/// No throttling unless a test asks for it.
pub fn fast_config() -> ProvisionerConfig {
    ProvisionerConfig {
        key_generation_pause_ms: 0,
        ..Default::default()
    }
}

pub fn provisioner(
    custodian: MockCustodian,
    server: MockServer,
    settings: Settings,
) -> TestProvisioner {
    init_logging();
    Provisioner::new(
        custodian,
        server,
        MemorySettingsStore::new(settings),
        fast_config(),
    )
}
