/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Error codes shared by the provisioning crates.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::fmt;
use core::num::{NonZeroU32, TryFromIntError};

/// Provisioner Error Type
///
/// The upper 16 bits select the error class, see [`ErrorKind`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProvisionerError(pub NonZeroU32);

/// Error classes. Drives the retry policy of a provisioning cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// Caller bug, surfaced synchronously and never retried.
    Configuration,
    Transport,
    Decode,
    Custodian,
    Validation,
    Settings,
    Cancelled,
    Scheduler,
    Unknown,
}

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code, plus a lookup from code to
/// name.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:literal, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: ProvisionerError = ProvisionerError::new_const($value);
        )*

        /// Returns the constant name and description of a known error code.
        #[allow(unreachable_patterns)]
        pub fn describe(&self) -> Option<(&'static str, &'static str)> {
            match self.0.get() {
                $(
                    $value => Some((stringify!($name), $doc)),
                )*
                _ => None,
            }
        }

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl ProvisionerError {
    /// Create a provisioner error; intended to only be used from const contexts, as we don't
    /// want runtime panics if val is zero. Use `ProvisionerError::try_from()` for runtime values.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("ProvisionerError cannot be 0"),
        }
    }

    define_error_constants![
        (
            CONFIG_NUM_KEYS_TOO_SMALL,
            0x0001_0001,
            "Configuration Error: at least one key must be requested"
        ),
        (
            CONFIG_FILE_READ,
            0x0001_0002,
            "Configuration Error: unable to read configuration file"
        ),
        (
            CONFIG_FILE_PARSE,
            0x0001_0003,
            "Configuration Error: unable to parse configuration file"
        ),
        (
            TRANSPORT_CLIENT_BUILD,
            0x0002_0001,
            "Transport Error: unable to build HTTP client"
        ),
        (
            TRANSPORT_INVALID_URL,
            0x0002_0002,
            "Transport Error: invalid provisioning server URL"
        ),
        (
            TRANSPORT_REQUEST_FAILED,
            0x0002_0003,
            "Transport Error: request to provisioning server failed"
        ),
        (
            TRANSPORT_BAD_STATUS,
            0x0002_0004,
            "Transport Error: provisioning server returned a non-success status"
        ),
        (
            TRANSPORT_BODY_READ,
            0x0002_0005,
            "Transport Error: unable to read response body"
        ),
        (
            DECODE_MALFORMED_CBOR,
            0x0003_0001,
            "Decode Error: response is not well-formed CBOR"
        ),
        (
            DECODE_TRAILING_BYTES,
            0x0003_0002,
            "Decode Error: bytes remain after the top-level data item"
        ),
        (
            DECODE_NOT_AN_ARRAY,
            0x0003_0003,
            "Decode Error: top-level data item is not an array"
        ),
        (
            DECODE_WRONG_ARITY,
            0x0003_0004,
            "Decode Error: top-level array has the wrong number of elements"
        ),
        (
            DECODE_EEK_CHAIN_NOT_ARRAY,
            0x0003_0005,
            "Decode Error: encryption key chain is not an array"
        ),
        (
            DECODE_EEK_CHAIN_ENTRY_NOT_BSTR,
            0x0003_0006,
            "Decode Error: encryption key chain entry is not a byte string"
        ),
        (
            DECODE_CHALLENGE_NOT_BSTR,
            0x0003_0007,
            "Decode Error: challenge is not a byte string"
        ),
        (
            DECODE_DEVICE_CONFIG_NOT_MAP,
            0x0003_0008,
            "Decode Error: device config is not a map"
        ),
        (
            DECODE_DEVICE_CONFIG_BAD_VALUE,
            0x0003_0009,
            "Decode Error: device config entry has the wrong type"
        ),
        (
            DECODE_SHARED_CERTS_NOT_BSTR,
            0x0003_000a,
            "Decode Error: shared certificates are not a byte string"
        ),
        (
            DECODE_UNIQUE_CERTS_NOT_ARRAY,
            0x0003_000b,
            "Decode Error: unique certificates are not an array"
        ),
        (
            DECODE_UNIQUE_CERT_NOT_BSTR,
            0x0003_000c,
            "Decode Error: unique certificate entry is not a byte string"
        ),
        (
            DECODE_REENCODE_FAILED,
            0x0003_000d,
            "Decode Error: unable to re-encode encryption key chain"
        ),
        (
            CUSTODIAN_GENERATE_KEY_PAIR,
            0x0004_0001,
            "Custodian Error: key pair generation failed"
        ),
        (
            CUSTODIAN_GENERATE_CSR,
            0x0004_0002,
            "Custodian Error: CSR generation failed"
        ),
        (
            CUSTODIAN_EMPTY_CSR,
            0x0004_0003,
            "Custodian Error: CSR payload is empty"
        ),
        (
            CUSTODIAN_POOL_STATUS,
            0x0004_0004,
            "Custodian Error: unable to read attestation pool status"
        ),
        (
            CUSTODIAN_PROVISION_CERT_CHAIN,
            0x0004_0005,
            "Custodian Error: unable to store certificate chain"
        ),
        (
            CUSTODIAN_DELETE_ALL_KEYS,
            0x0004_0006,
            "Custodian Error: unable to delete attestation keys"
        ),
        (
            CUSTODIAN_IMPLEMENTATION_INFO,
            0x0004_0007,
            "Custodian Error: unable to read implementation info"
        ),
        (
            CUSTODIAN_NO_IMPLEMENTATIONS,
            0x0004_0008,
            "Custodian Error: no remotely provisioned components registered"
        ),
        (
            VALIDATION_CERT_CHAIN_PARSE,
            0x0005_0001,
            "Validation Error: unable to parse DER certificate chain"
        ),
        (
            VALIDATION_EMPTY_CERT_CHAIN,
            0x0005_0002,
            "Validation Error: certificate chain is empty"
        ),
        (
            VALIDATION_PUBLIC_KEY_NOT_EC,
            0x0005_0003,
            "Validation Error: leaf public key is not an EC key"
        ),
        (
            VALIDATION_PUBLIC_KEY_LENGTH,
            0x0005_0004,
            "Validation Error: leaf public key is not 65 bytes"
        ),
        (
            SETTINGS_READ,
            0x0006_0001,
            "Settings Error: unable to read settings"
        ),
        (
            SETTINGS_WRITE,
            0x0006_0002,
            "Settings Error: unable to write settings"
        ),
        (
            SETTINGS_PARSE,
            0x0006_0003,
            "Settings Error: unable to parse settings"
        ),
        (
            SETTINGS_LOCK_POISONED,
            0x0006_0004,
            "Settings Error: settings lock poisoned"
        ),
        (
            CYCLE_CANCELLED,
            0x0007_0001,
            "Cycle Error: stop requested by scheduler"
        ),
        (
            SCHEDULER_WORKER_SPAWN,
            0x0008_0001,
            "Scheduler Error: unable to spawn provisioning worker"
        ),
    ];

    /// Classify the error by its upper 16 bits.
    pub fn kind(&self) -> ErrorKind {
        match self.0.get() >> 16 {
            0x0001 => ErrorKind::Configuration,
            0x0002 => ErrorKind::Transport,
            0x0003 => ErrorKind::Decode,
            0x0004 => ErrorKind::Custodian,
            0x0005 => ErrorKind::Validation,
            0x0006 => ErrorKind::Settings,
            0x0007 => ErrorKind::Cancelled,
            0x0008 => ErrorKind::Scheduler,
            _ => ErrorKind::Unknown,
        }
    }

    /// True for errors that bump the persisted failure counter.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::Decode | ErrorKind::Custodian
        )
    }
}

impl fmt::Display for ProvisionerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Some((name, doc)) => write!(f, "{name} (0x{:08x}): {doc}", self.0.get()),
            None => write!(f, "unknown error 0x{:08x}", self.0.get()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProvisionerError {}

impl From<core::num::NonZeroU32> for crate::ProvisionerError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::ProvisionerError(val)
    }
}

impl From<ProvisionerError> for core::num::NonZeroU32 {
    fn from(val: ProvisionerError) -> Self {
        val.0
    }
}

impl From<ProvisionerError> for u32 {
    fn from(val: ProvisionerError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for ProvisionerError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(ProvisionerError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type ProvisionerResult<T> = Result<T, ProvisionerError>;
