// Licensed under the Apache-2.0 license

use std::path::Path;
use std::time::Duration;

use rkp_error::{ProvisionerError, ProvisionerResult};
use serde::Deserialize;

/// Static tunables of the provisioner. Server-directed policy lives in
/// [`crate::Settings`] instead.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Ask the key custodian for test keys and test CSRs.
    pub test_mode: bool,
    /// Pause between key pair generations when the pool is not empty.
    pub key_generation_pause_ms: u64,
    /// Settings are reset once the failure counter exceeds this.
    pub failure_maximum: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Fail a request on a non-2xx status instead of decoding the body anyway.
    pub strict_http_status: bool,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            test_mode: false,
            key_generation_pause_ms: 1000,
            failure_maximum: 5,
            connect_timeout_secs: 15,
            request_timeout_secs: 60,
            strict_http_status: true,
        }
    }
}

impl ProvisionerConfig {
    pub fn from_toml(contents: &str) -> ProvisionerResult<Self> {
        toml::from_str(contents).map_err(|err| {
            log::error!("Failed to parse provisioner config: {err}");
            ProvisionerError::CONFIG_FILE_PARSE
        })
    }

    pub fn from_file(path: &Path) -> ProvisionerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            log::error!("Failed to read provisioner config {path:?}: {err}");
            ProvisionerError::CONFIG_FILE_READ
        })?;
        Self::from_toml(&contents)
    }

    pub fn key_generation_pause(&self) -> Duration {
        Duration::from_millis(self.key_generation_pause_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
