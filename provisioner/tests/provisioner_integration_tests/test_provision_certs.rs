// Licensed under the Apache-2.0 license

use openssl::nid::Nid;
use rkp_provisioner::{
    decode_encryption_key_response, EncryptionKeyResponse, ProvisionerError, SecurityLevel,
    StopSignal,
};

use crate::common::*;

fn response() -> EncryptionKeyResponse {
    decode_encryption_key_response(&eek_response(Some(3), None)).unwrap()
}

#[test]
fn test_zero_keys_rejected() {
    let server = MockServer::new(Ok(eek_response(Some(3), None)), Ok(Vec::new()));
    let provisioner = provisioner(MockCustodian::default(), server, settings_with_url());

    for security_level in [SecurityLevel::TrustedEnvironment, SecurityLevel::StrongBox] {
        assert_eq!(
            Err(ProvisionerError::CONFIG_NUM_KEYS_TOO_SMALL),
            provisioner.provision_certs(
                0,
                security_level,
                &response(),
                BASE_URL,
                &StopSignal::new()
            )
        );
    }
    assert_eq!(0, provisioner.server().calls());
    assert!(provisioner.custodian().csr_requests().is_empty());
}

#[test]
fn test_provision_certs() {
    let chains = TestChains::new(3);
    let server = MockServer::new(Ok(Vec::new()), Ok(chains.response()));
    let provisioner = provisioner(MockCustodian::default(), server, settings_with_url());

    assert_eq!(
        Ok(3),
        provisioner.provision_certs(
            3,
            SecurityLevel::StrongBox,
            &response(),
            BASE_URL,
            &StopSignal::new()
        )
    );
    let stored = provisioner.custodian().stored();
    assert_eq!(3, stored.len());
    for (record, leaf) in stored.iter().zip(&chains.leaves) {
        assert_eq!(leaf.raw_pub_key(), &record.raw_public_key[..]);
        assert_eq!(SecurityLevel::StrongBox, record.security_level);
    }
    assert_eq!(
        vec![(3, SecurityLevel::StrongBox)],
        provisioner.custodian().csr_requests()
    );
}

#[test]
fn test_bad_key_length_keeps_earlier_chains() {
    let chains = TestChains::new(2);
    let bad_leaf = EcAsymKey::new(Nid::SECP384R1);
    let unique = vec![
        chains.leaf_certs[0].clone(),
        bad_leaf.self_signed_cert("bad leaf", NOT_AFTER),
        chains.leaf_certs[1].clone(),
    ];
    let server = MockServer::new(
        Ok(Vec::new()),
        Ok(signed_certs_response(&chains.root, &unique)),
    );
    let provisioner = provisioner(MockCustodian::default(), server, settings_with_url());

    assert_eq!(
        Err(ProvisionerError::VALIDATION_PUBLIC_KEY_LENGTH),
        provisioner.provision_certs(
            3,
            SecurityLevel::TrustedEnvironment,
            &response(),
            BASE_URL,
            &StopSignal::new()
        )
    );
    let stored = provisioner.custodian().stored();
    assert_eq!(1, stored.len());
    assert_eq!(chains.leaves[0].raw_pub_key(), &stored[0].raw_public_key[..]);
}

#[test]
fn test_store_failure_aborts_batch() {
    let chains = TestChains::new(3);
    let custodian = MockCustodian {
        fail_store: Some(ProvisionerError::CUSTODIAN_PROVISION_CERT_CHAIN),
        ..Default::default()
    };
    let server = MockServer::new(Ok(Vec::new()), Ok(chains.response()));
    let provisioner = provisioner(custodian, server, settings_with_url());

    assert_eq!(
        Err(ProvisionerError::CUSTODIAN_PROVISION_CERT_CHAIN),
        provisioner.provision_certs(
            3,
            SecurityLevel::TrustedEnvironment,
            &response(),
            BASE_URL,
            &StopSignal::new()
        )
    );
    assert_eq!(1, provisioner.custodian().stored().len());
}

#[test]
fn test_empty_csr() {
    let custodian = MockCustodian {
        csr: Vec::new(),
        ..Default::default()
    };
    let server = MockServer::new(Ok(Vec::new()), Ok(Vec::new()));
    let provisioner = provisioner(custodian, server, settings_with_url());

    assert_eq!(
        Err(ProvisionerError::CUSTODIAN_EMPTY_CSR),
        provisioner.provision_certs(
            1,
            SecurityLevel::TrustedEnvironment,
            &response(),
            BASE_URL,
            &StopSignal::new()
        )
    );
    assert_eq!(0, provisioner.server().calls());
}

#[test]
fn test_truncated_signed_certificates() {
    let chains = TestChains::new(1);
    let encoded = chains.response();
    let server = MockServer::new(
        Ok(Vec::new()),
        Ok(encoded[..encoded.len() - 1].to_vec()),
    );
    let provisioner = provisioner(MockCustodian::default(), server, settings_with_url());

    assert_eq!(
        Err(ProvisionerError::DECODE_MALFORMED_CBOR),
        provisioner.provision_certs(
            1,
            SecurityLevel::TrustedEnvironment,
            &response(),
            BASE_URL,
            &StopSignal::new()
        )
    );
    assert!(provisioner.custodian().stored().is_empty());
}

#[test]
fn test_stopped_before_submit() {
    let server = MockServer::new(Ok(Vec::new()), Ok(TestChains::new(1).response()));
    let provisioner = provisioner(MockCustodian::default(), server, settings_with_url());

    let stop = StopSignal::new();
    stop.stop();
    assert_eq!(
        Err(ProvisionerError::CYCLE_CANCELLED),
        provisioner.provision_certs(
            1,
            SecurityLevel::TrustedEnvironment,
            &response(),
            BASE_URL,
            &stop
        )
    );
    assert_eq!(0, provisioner.server().calls());
    assert!(provisioner.custodian().stored().is_empty());
}
