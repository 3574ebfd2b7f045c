/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Main entry point for turning server-signed certificate chains into
    provisioned key records.

--*/

mod chain;
#[cfg(all(any(test, feature = "test-util"), target_family = "unix"))]
pub mod test_util;

pub use chain::{process_chain, raw_public_key, CertChain};

/// SEC1 tag byte of an uncompressed EC point.
pub const ECDSA_UNCOMPRESSED_BYTE: u8 = 0x04;
