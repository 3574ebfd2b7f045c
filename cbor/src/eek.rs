// Licensed under the Apache-2.0 license

use std::time::Duration;

use ciborium::value::Value;
use rkp_error::{ProvisionerError, ProvisionerResult};

use crate::{decode_item, expect_bytes, top_level_array};

const EEK_ARRAY_ENTRIES_NO_CONFIG: usize = 2;
const EEK_ARRAY_ENTRIES_WITH_CONFIG: usize = 3;

const EXTRA_KEYS: &str = "num_extra_attestation_keys";
const TIME_TO_REFRESH: &str = "time_to_refresh_hours";
const PROVISIONING_URL: &str = "provisioning_url";

/// Server-directed policy carried alongside the encryption key. A `None`
/// field means the server sent no update and the persisted value stands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub extra_keys_allowed: Option<u32>,
    pub refresh_interval: Option<Duration>,
    pub server_url: Option<String>,
}

/// Decoded response of the `eekchain` endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionKeyResponse {
    key_material: Vec<u8>,
    challenge: Vec<u8>,
    device_config: DeviceConfig,
}

impl EncryptionKeyResponse {
    /// The encryption key certificate chain, re-encoded as a CBOR array of
    /// byte strings. Opaque to everything but the key custodian.
    pub fn key_material(&self) -> &[u8] {
        &self.key_material
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    pub fn device_config(&self) -> &DeviceConfig {
        &self.device_config
    }

    pub fn extra_keys_allowed(&self) -> Option<u32> {
        self.device_config.extra_keys_allowed
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.device_config.refresh_interval
    }

    pub fn server_url(&self) -> Option<&str> {
        self.device_config.server_url.as_deref()
    }
}

/// Decode `[ [bstr, ...], bstr ]` or `[ [bstr, ...], bstr, { config } ]`.
pub fn decode_encryption_key_response(bytes: &[u8]) -> ProvisionerResult<EncryptionKeyResponse> {
    let mut items = top_level_array(
        decode_item(bytes)?,
        &[EEK_ARRAY_ENTRIES_NO_CONFIG, EEK_ARRAY_ENTRIES_WITH_CONFIG],
    )?
    .into_iter();

    // Arity was checked above, so the first two elements are present.
    let chain = items.next().unwrap_or(Value::Null);
    let challenge = items.next().unwrap_or(Value::Null);
    let config = items.next();

    let key_material = reencode_chain(chain)?;
    let challenge = expect_bytes(
        challenge,
        ProvisionerError::DECODE_CHALLENGE_NOT_BSTR,
        "Challenge",
    )?;
    let device_config = match config {
        Some(config) => parse_device_config(config)?,
        None => DeviceConfig::default(),
    };

    Ok(EncryptionKeyResponse {
        key_material,
        challenge,
        device_config,
    })
}

fn reencode_chain(chain: Value) -> ProvisionerResult<Vec<u8>> {
    let entries = chain.into_array().map_err(|other| {
        log::error!("Encryption key chain is not an array: {other:?}");
        ProvisionerError::DECODE_EEK_CHAIN_NOT_ARRAY
    })?;
    if let Some(bad) = entries.iter().find(|entry| !entry.is_bytes()) {
        log::error!("Encryption key chain entry is not a bstr: {bad:?}");
        return Err(ProvisionerError::DECODE_EEK_CHAIN_ENTRY_NOT_BSTR);
    }
    let mut out = Vec::new();
    ciborium::ser::into_writer(&Value::Array(entries), &mut out).map_err(|err| {
        log::error!("Failed to re-encode encryption key chain: {err:?}");
        ProvisionerError::DECODE_REENCODE_FAILED
    })?;
    Ok(out)
}

fn parse_device_config(config: Value) -> ProvisionerResult<DeviceConfig> {
    let entries = config.into_map().map_err(|other| {
        log::error!("Device config is not a map: {other:?}");
        ProvisionerError::DECODE_DEVICE_CONFIG_NOT_MAP
    })?;
    let mut device_config = DeviceConfig::default();
    for (key, value) in entries {
        let Some(key) = key.as_text() else {
            log::warn!("Ignoring device config entry with non-text key: {key:?}");
            continue;
        };
        match key {
            EXTRA_KEYS => {
                device_config.extra_keys_allowed = Some(
                    u32::try_from(expect_uint(&value, key)?)
                        .map_err(|_| bad_value(key, &value))?,
                );
            }
            TIME_TO_REFRESH => {
                let hours = expect_uint(&value, key)?;
                let secs = hours
                    .checked_mul(60 * 60)
                    .ok_or_else(|| bad_value(key, &value))?;
                device_config.refresh_interval = Some(Duration::from_secs(secs));
            }
            PROVISIONING_URL => {
                let url = value.as_text().ok_or_else(|| bad_value(key, &value))?;
                device_config.server_url = Some(url.to_string());
            }
            _ => log::debug!("Ignoring unknown device config entry {key:?}"),
        }
    }
    Ok(device_config)
}

fn expect_uint(value: &Value, key: &str) -> ProvisionerResult<u64> {
    value
        .as_integer()
        .and_then(|int| u64::try_from(int).ok())
        .ok_or_else(|| bad_value(key, value))
}

fn bad_value(key: &str, value: &Value) -> ProvisionerError {
    log::error!("Device config entry {key:?} has an invalid value: {value:?}");
    ProvisionerError::DECODE_DEVICE_CONFIG_BAD_VALUE
}
