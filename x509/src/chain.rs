/*++

Licensed under the Apache-2.0 license.

File Name:

    chain.rs

Abstract:

    DER certificate chain parsing and leaf key extraction.

--*/

use rkp_error::{ProvisionerError, ProvisionerResult};
use rkp_types::{
    ProvisionedKeyRecord, SecurityLevel, SignedCertificateChain, RAW_PUBLIC_KEY_LEN,
    UNCOMPRESSED_EC_POINT_LEN,
};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::ECDSA_UNCOMPRESSED_BYTE;

/// A parsed chain of concatenated DER certificates, leaf first.
pub struct CertChain<'a> {
    certs: Vec<X509Certificate<'a>>,
}

impl<'a> CertChain<'a> {
    /// Parse every certificate in `blob`. Fails if any certificate is
    /// malformed or if there are none.
    pub fn parse(blob: &'a [u8]) -> ProvisionerResult<Self> {
        let mut certs = Vec::new();
        let mut rest = blob;
        while !rest.is_empty() {
            let (remaining, cert) = X509Certificate::from_der(rest).map_err(|err| {
                log::error!(
                    "Failed to interpret DER encoded certificate {} of chain: {err}",
                    certs.len()
                );
                ProvisionerError::VALIDATION_CERT_CHAIN_PARSE
            })?;
            certs.push(cert);
            rest = remaining;
        }
        if certs.is_empty() {
            log::error!("Certificate chain is empty");
            return Err(ProvisionerError::VALIDATION_EMPTY_CERT_CHAIN);
        }
        Ok(Self { certs })
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn leaf(&self) -> &X509Certificate<'a> {
        // parse() never builds an empty chain.
        &self.certs[0]
    }

    /// Leaf "not after" in milliseconds since the epoch.
    pub fn leaf_expiration_millis(&self) -> ProvisionerResult<i64> {
        self.leaf()
            .validity()
            .not_after
            .timestamp()
            .checked_mul(1000)
            .ok_or(ProvisionerError::VALIDATION_CERT_CHAIN_PARSE)
    }

    /// Leaf public key as an encoded EC point.
    pub fn leaf_ec_point(&self) -> ProvisionerResult<Vec<u8>> {
        match self.leaf().public_key().parsed() {
            Ok(PublicKey::EC(point)) => Ok(point.data().to_vec()),
            Ok(_) => {
                log::error!("Leaf certificate public key is not an EC key");
                Err(ProvisionerError::VALIDATION_PUBLIC_KEY_NOT_EC)
            }
            Err(err) => {
                log::error!("Failed to parse leaf certificate public key: {err}");
                Err(ProvisionerError::VALIDATION_PUBLIC_KEY_NOT_EC)
            }
        }
    }
}

/// Strip the SEC1 tag byte from a 65 byte EC point, leaving X || Y.
///
/// A wrong length fails. A wrong tag byte is only logged; the remaining 64
/// bytes are used as is.
pub fn raw_public_key(point: &[u8]) -> ProvisionerResult<[u8; RAW_PUBLIC_KEY_LEN]> {
    if point.len() != UNCOMPRESSED_EC_POINT_LEN {
        log::error!(
            "Key is not encoded as expected, or corrupted. Length: {}",
            point.len()
        );
        return Err(ProvisionerError::VALIDATION_PUBLIC_KEY_LENGTH);
    }
    if point[0] != ECDSA_UNCOMPRESSED_BYTE {
        log::warn!("Key is not uncompressed, tag byte 0x{:02x}", point[0]);
    }
    let mut raw = [0u8; RAW_PUBLIC_KEY_LEN];
    raw.copy_from_slice(&point[1..]);
    Ok(raw)
}

/// Turn a signed chain into the record handed to the key custodian.
pub fn process_chain(
    chain: SignedCertificateChain,
    security_level: SecurityLevel,
) -> ProvisionerResult<ProvisionedKeyRecord> {
    let (raw_public_key, expiration_epoch_millis) = {
        let parsed = CertChain::parse(chain.as_bytes())?;
        let expiration = parsed.leaf_expiration_millis()?;
        (raw_public_key(&parsed.leaf_ec_point()?)?, expiration)
    };
    log::debug!(
        "Processed {security_level} chain of {} bytes, expires at {expiration_epoch_millis}",
        chain.len()
    );
    Ok(ProvisionedKeyRecord {
        raw_public_key,
        chain,
        expiration_epoch_millis,
        security_level,
    })
}
