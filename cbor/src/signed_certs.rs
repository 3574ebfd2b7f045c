// Licensed under the Apache-2.0 license

use ciborium::value::Value;
use rkp_error::{ProvisionerError, ProvisionerResult};
use rkp_types::SignedCertificateChain;

use crate::{decode_item, expect_bytes, top_level_array};

const SIGNED_CERTS_ARRAY_ENTRIES: usize = 2;

/// Decode `[ sharedCerts: bstr, [ uniqueCert: bstr, ... ] ]` into one chain
/// per unique certificate, each being `uniqueCert ++ sharedCerts`.
pub fn decode_signed_certificates(
    bytes: &[u8],
) -> ProvisionerResult<Vec<SignedCertificateChain>> {
    let mut items =
        top_level_array(decode_item(bytes)?, &[SIGNED_CERTS_ARRAY_ENTRIES])?.into_iter();
    let shared = items.next().unwrap_or(Value::Null);
    let unique = items.next().unwrap_or(Value::Null);

    let shared = expect_bytes(
        shared,
        ProvisionerError::DECODE_SHARED_CERTS_NOT_BSTR,
        "Shared certificates",
    )?;
    let unique = unique.into_array().map_err(|other| {
        log::error!("Unique certificates are not an array: {other:?}");
        ProvisionerError::DECODE_UNIQUE_CERTS_NOT_ARRAY
    })?;

    unique
        .into_iter()
        .map(|entry| {
            let mut chain = expect_bytes(
                entry,
                ProvisionerError::DECODE_UNIQUE_CERT_NOT_BSTR,
                "Unique certificate",
            )?;
            chain.extend_from_slice(&shared);
            Ok(SignedCertificateChain::from(chain))
        })
        .collect()
}
