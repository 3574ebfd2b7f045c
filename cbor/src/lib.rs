/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Decoders for the CBOR messages returned by the provisioning server.
    Decoding is all-or-nothing: a message either decodes completely or
    yields an error, never a partial result.

--*/

mod eek;
mod signed_certs;

pub use eek::{decode_encryption_key_response, DeviceConfig, EncryptionKeyResponse};
pub use signed_certs::decode_signed_certificates;

use ciborium::value::Value;
use rkp_error::{ProvisionerError, ProvisionerResult};

/// Decode exactly one CBOR data item from `bytes`.
fn decode_item(bytes: &[u8]) -> ProvisionerResult<Value> {
    let mut reader = bytes;
    let value: Value = ciborium::de::from_reader(&mut reader).map_err(|err| {
        log::error!("Failed to decode CBOR response: {err:?}");
        ProvisionerError::DECODE_MALFORMED_CBOR
    })?;
    if !reader.is_empty() {
        log::error!("{} unexpected bytes after CBOR response", reader.len());
        return Err(ProvisionerError::DECODE_TRAILING_BYTES);
    }
    Ok(value)
}

/// Unwrap a top-level array, accepting only the given element counts.
fn top_level_array(value: Value, allowed_len: &[usize]) -> ProvisionerResult<Vec<Value>> {
    let items = value.into_array().map_err(|_| {
        log::error!("CBOR response is not an array");
        ProvisionerError::DECODE_NOT_AN_ARRAY
    })?;
    if !allowed_len.contains(&items.len()) {
        log::error!(
            "CBOR response has {} elements, expected one of {allowed_len:?}",
            items.len()
        );
        return Err(ProvisionerError::DECODE_WRONG_ARITY);
    }
    Ok(items)
}

fn expect_bytes(value: Value, err: ProvisionerError, what: &str) -> ProvisionerResult<Vec<u8>> {
    value.into_bytes().map_err(|other| {
        log::error!("{what} has the wrong type: {other:?}");
        err
    })
}
