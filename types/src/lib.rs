// Licensed under the Apache-2.0 license

use std::fmt;

/// Length of an uncompressed SEC1 P-256 point: tag byte, X, Y.
pub const UNCOMPRESSED_EC_POINT_LEN: usize = 65;

/// Length of the raw public key stored with a certificate chain: X, Y.
pub const RAW_PUBLIC_KEY_LEN: usize = 64;

// Values match the security level of the backing keystore component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SecurityLevel {
    Software = 0,
    TrustedEnvironment = 1,
    StrongBox = 2,
}
impl TryFrom<u32> for SecurityLevel {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Software),
            1 => Ok(Self::TrustedEnvironment),
            2 => Ok(Self::StrongBox),
            _ => Err(()),
        }
    }
}
impl From<SecurityLevel> for u32 {
    fn from(value: SecurityLevel) -> Self {
        value as u32
    }
}
impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Software => "SOFTWARE",
            Self::TrustedEnvironment => "TRUSTED_ENVIRONMENT",
            Self::StrongBox => "STRONGBOX",
        };
        f.write_str(name)
    }
}

/// A remotely provisioned component registered with the key custodian.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImplInfo {
    pub security_level: SecurityLevel,
    /// COSE curve identifier the component expects the encryption key on.
    pub supported_curve: u32,
}

/// Snapshot of the attestation key pool for one security level.
///
/// `attested <= total`, `unassigned <= attested` and `expiring <= attested`
/// hold for a well-behaved custodian.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStatus {
    pub total: u32,
    pub attested: u32,
    pub unassigned: u32,
    pub expiring: u32,
}

/// DER certificates concatenated leaf first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignedCertificateChain(Vec<u8>);

impl SignedCertificateChain {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl From<Vec<u8>> for SignedCertificateChain {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}
impl AsRef<[u8]> for SignedCertificateChain {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A signed attestation key ready to hand back to the key custodian.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionedKeyRecord {
    /// EC point without the SEC1 tag byte.
    pub raw_public_key: [u8; RAW_PUBLIC_KEY_LEN],
    pub chain: SignedCertificateChain,
    pub expiration_epoch_millis: i64,
    pub security_level: SecurityLevel,
}
