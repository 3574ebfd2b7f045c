// Licensed under the Apache-2.0 license

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rkp_cbor::DeviceConfig;
use rkp_error::{ProvisionerError, ProvisionerResult};
use serde::{Deserialize, Serialize};

pub const EXTRA_SIGNED_KEYS_AVAILABLE_DEFAULT: u32 = 6;
pub const EXPIRING_BY_MS_DEFAULT: u64 = 3 * 24 * 60 * 60 * 1000;
pub const REFRESH_INTERVAL_SECS_DEFAULT: u64 = 24 * 60 * 60;
pub const PROVISIONING_URL_DEFAULT: &str = "https://remoteprovisioning.googleapis.com";

/// Persisted provisioning state. Readers outside the provisioning cycle see
/// either the old or the new snapshot, never a mix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Signed keys to keep on hand beyond those in use. 0 disables provisioning.
    pub extra_signed_keys_available: u32,
    /// Keys expiring within this window count as expiring.
    pub expiring_by_ms: u64,
    /// How often the scheduler should run a cycle.
    pub refresh_interval_secs: u64,
    pub provisioning_url: String,
    pub failure_counter: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extra_signed_keys_available: EXTRA_SIGNED_KEYS_AVAILABLE_DEFAULT,
            expiring_by_ms: EXPIRING_BY_MS_DEFAULT,
            refresh_interval_secs: REFRESH_INTERVAL_SECS_DEFAULT,
            provisioning_url: PROVISIONING_URL_DEFAULT.into(),
            failure_counter: 0,
        }
    }
}

impl Settings {
    pub fn expiring_by(&self) -> Duration {
        Duration::from_millis(self.expiring_by_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Copy over every field the server sent.
    pub fn apply_device_config(&mut self, config: &DeviceConfig) {
        if let Some(extra_keys) = config.extra_keys_allowed {
            self.extra_signed_keys_available = extra_keys;
        }
        if let Some(refresh_interval) = config.refresh_interval {
            self.refresh_interval_secs = refresh_interval.as_secs();
        }
        if let Some(url) = &config.server_url {
            self.provisioning_url = url.clone();
        }
    }
}

/// Storage for [`Settings`]. Every `update` is applied as one atomic
/// replacement of the stored snapshot.
pub trait SettingsStore {
    fn load(&self) -> ProvisionerResult<Settings>;

    /// Apply `f` to the stored settings and return the new snapshot.
    fn update(&self, f: &mut dyn FnMut(&mut Settings)) -> ProvisionerResult<Settings>;

    /// Reset everything to defaults.
    fn clear_all(&self) -> ProvisionerResult<()>;

    fn set_device_config(&self, config: &DeviceConfig) -> ProvisionerResult<Settings> {
        self.update(&mut |settings| settings.apply_device_config(config))
    }

    fn increment_failure_counter(&self) -> ProvisionerResult<u32> {
        self.update(&mut |settings| {
            settings.failure_counter = settings.failure_counter.saturating_add(1)
        })
        .map(|settings| settings.failure_counter)
    }

    fn reset_failure_counter(&self) -> ProvisionerResult<()> {
        self.update(&mut |settings| settings.failure_counter = 0).map(|_| ())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> ProvisionerResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ProvisionerError::SETTINGS_LOCK_POISONED)
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> ProvisionerResult<Settings> {
        Ok(lock(&self.settings)?.clone())
    }

    fn update(&self, f: &mut dyn FnMut(&mut Settings)) -> ProvisionerResult<Settings> {
        let mut guard = lock(&self.settings)?;
        let mut settings = guard.clone();
        f(&mut settings);
        *guard = settings.clone();
        Ok(settings)
    }

    fn clear_all(&self) -> ProvisionerResult<()> {
        *lock(&self.settings)? = Settings::default();
        Ok(())
    }
}

/// Settings kept in a TOML file. Writes go to a sibling temporary file that
/// is then renamed over the old file.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> ProvisionerResult<Settings> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(err) => {
                log::error!("Failed to read settings {:?}: {err}", self.path);
                return Err(ProvisionerError::SETTINGS_READ);
            }
        };
        toml::from_str(&contents).map_err(|err| {
            log::error!("Failed to parse settings {:?}: {err}", self.path);
            ProvisionerError::SETTINGS_PARSE
        })
    }

    fn write(&self, settings: &Settings) -> ProvisionerResult<()> {
        let contents = toml::to_string(settings).map_err(|err| {
            log::error!("Failed to serialize settings: {err}");
            ProvisionerError::SETTINGS_WRITE
        })?;
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        std::fs::write(&tmp_path, contents)
            .and_then(|_| std::fs::rename(&tmp_path, &self.path))
            .map_err(|err| {
                log::error!("Failed to write settings {:?}: {err}", self.path);
                ProvisionerError::SETTINGS_WRITE
            })
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> ProvisionerResult<Settings> {
        let _guard = lock(&self.lock)?;
        self.read()
    }

    fn update(&self, f: &mut dyn FnMut(&mut Settings)) -> ProvisionerResult<Settings> {
        let _guard = lock(&self.lock)?;
        let mut settings = self.read()?;
        f(&mut settings);
        self.write(&settings)?;
        Ok(settings)
    }

    fn clear_all(&self) -> ProvisionerResult<()> {
        let _guard = lock(&self.lock)?;
        self.write(&Settings::default())
    }
}
