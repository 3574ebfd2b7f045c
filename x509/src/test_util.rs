/*++

Licensed under the Apache-2.0 license.

File Name:

    test_util.rs

Abstract:

    Certificate builders for tests. Enabled outside this crate with the
    `test-util` feature.

--*/

use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcKey, PointConversionForm},
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, Private},
    rsa::Rsa,
    x509::{X509Builder, X509NameBuilder},
};

pub const NOT_BEFORE: i64 = 1_600_000_000;

pub struct EcAsymKey {
    priv_key: PKey<Private>,
    pub_key: Vec<u8>,
}

impl EcAsymKey {
    pub fn new(curve: Nid) -> Self {
        let ecc_group = EcGroup::from_curve_name(curve).unwrap();
        let priv_key = EcKey::generate(&ecc_group).unwrap();
        let mut bn_ctx = BigNumContext::new().unwrap();
        let pub_key = priv_key
            .public_key()
            .to_bytes(&ecc_group, PointConversionForm::UNCOMPRESSED, &mut bn_ctx)
            .unwrap();
        Self {
            priv_key: PKey::from_ec_key(priv_key).unwrap(),
            pub_key,
        }
    }

    pub fn priv_key(&self) -> &PKey<Private> {
        &self.priv_key
    }

    /// Uncompressed SEC1 point, tag byte included.
    pub fn pub_key(&self) -> &[u8] {
        &self.pub_key
    }

    /// The point without its tag byte, as stored in a key record.
    pub fn raw_pub_key(&self) -> &[u8] {
        &self.pub_key[1..]
    }

    pub fn self_signed_cert(&self, cn: &str, not_after: i64) -> Vec<u8> {
        build_cert(self.priv_key(), self.priv_key(), cn, not_after)
    }

    pub fn cert(&self, cn: &str, issuer: &EcAsymKey, not_after: i64) -> Vec<u8> {
        build_cert(self.priv_key(), issuer.priv_key(), cn, not_after)
    }
}

pub fn rsa_self_signed_cert(cn: &str, not_after: i64) -> Vec<u8> {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    build_cert(&key, &key, cn, not_after)
}

fn build_cert(
    subject_key: &PKey<Private>,
    issuer_key: &PKey<Private>,
    cn: &str,
    not_after: i64,
) -> Vec<u8> {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(subject_key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(NOT_BEFORE).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
        .unwrap();
    builder.sign(issuer_key, MessageDigest::sha256()).unwrap();
    builder.build().to_der().unwrap()
}
