mod common;

use common::*;
use std::sync::Arc;

use sigwalk::dns::enums::DNSResourceType;
use sigwalk::dns::rdata::RData;
use sigwalk::dns::resource::DNSResource;
use sigwalk::dnssec::crypto::compute_ds;
use sigwalk::dnssec::{
    DigestType, DnsSecAlgorithm, DnsSecError, ResponseClassifier, RingVerifier, TrustAnchor,
    TrustChainValidator, TrustedZone, calculate_key_tag,
};

fn validator(world: &World) -> TrustChainValidator {
    TrustChainValidator::new(
        &world.anchor(),
        Arc::new(RingVerifier::at_time(NOW)),
        ResponseClassifier::default(),
    )
}

#[test]
fn test_dnssec_algorithm_conversion() {
    assert_eq!(DnsSecAlgorithm::from_u8(5), Some(DnsSecAlgorithm::RsaSha1));
    assert_eq!(
        DnsSecAlgorithm::from_u8(8),
        Some(DnsSecAlgorithm::RsaSha256)
    );
    assert_eq!(
        DnsSecAlgorithm::from_u8(13),
        Some(DnsSecAlgorithm::EcdsaP256Sha256)
    );
    assert_eq!(DnsSecAlgorithm::from_u8(15), Some(DnsSecAlgorithm::Ed25519));
    assert_eq!(DnsSecAlgorithm::from_u8(200), None);

    assert_eq!(DnsSecAlgorithm::RsaSha256.to_u8(), 8);
    assert_eq!(DnsSecAlgorithm::Ed25519.to_u8(), 15);
}

#[test]
fn test_dnssec_algorithm_support() {
    assert!(DnsSecAlgorithm::RsaSha256.is_supported());
    assert!(DnsSecAlgorithm::EcdsaP256Sha256.is_supported());
    assert!(DnsSecAlgorithm::EcdsaP384Sha384.is_supported());
    assert!(DnsSecAlgorithm::Ed25519.is_supported());

    assert!(!DnsSecAlgorithm::RsaMd5.is_supported());
    assert!(!DnsSecAlgorithm::DSA.is_supported());
    assert!(!DnsSecAlgorithm::EccGost.is_supported());
    assert!(!DnsSecAlgorithm::Ed448.is_supported());
}

#[test]
fn test_digest_type_conversion() {
    assert_eq!(DigestType::from_u8(1), Some(DigestType::Sha1));
    assert_eq!(DigestType::from_u8(2), Some(DigestType::Sha256));
    assert_eq!(DigestType::from_u8(4), Some(DigestType::Sha384));
    assert_eq!(DigestType::from_u8(10), None);

    assert_eq!(DigestType::Sha256.to_u8(), 2);
    assert_eq!(DigestType::Sha384.to_u8(), 4);
    assert!(!DigestType::Gost94.is_supported());
}

#[test]
fn test_root_anchor_key_tag_and_ds() {
    let anchor = TrustAnchor::default();
    let ksk = anchor.ksk();

    assert_eq!(
        calculate_key_tag(ksk.flags, ksk.protocol, ksk.algorithm, &ksk.public_key),
        20326
    );

    // Published in the IANA root-anchors.xml
    let ds = compute_ds(".", ksk, DigestType::Sha256).unwrap();
    assert_eq!(ds.key_tag, 20326);
    assert_eq!(ds.algorithm, 8);
    assert_eq!(
        hex::encode_upper(&ds.digest),
        "E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D"
    );
}

#[test]
fn test_root_keys_must_contain_anchor() {
    let world = World::new();
    let validator = validator(&world);

    assert!(validator.verify_root_keys([&world.root.ksk]).is_ok());
    assert_eq!(
        validator.verify_root_keys([&world.com.ksk]),
        Err(DnsSecError::PubKskMismatch)
    );
    assert_eq!(
        validator.verify_root_keys(std::iter::empty()),
        Err(DnsSecError::PubKskMismatch)
    );
}

#[test]
fn test_root_keys_require_ksk_flag() {
    let world = World::new();
    let validator = validator(&world);

    let mut zsk = world.root.ksk.clone();
    zsk.flags = 256;
    assert_eq!(
        validator.verify_root_keys([&zsk]),
        Err(DnsSecError::PubKskMismatch)
    );
}

#[test]
fn test_dnskey_self_consistency() {
    let world = World::new();
    let validator = validator(&world);

    let zone = validator
        .verify_dnskey_self_consistency(&world.com.dnskey_response())
        .unwrap();
    assert_eq!(zone.owner, "com.");
    assert_eq!(zone.keys, vec![world.com.ksk.clone()]);
}

#[test]
fn test_dnskey_without_rrsig_is_unsigned() {
    let world = World::new();
    let validator = validator(&world);

    let key = DNSResource::new("com.", 3600, RData::DNSKEY(world.com.ksk.clone()));
    let err = validator
        .verify_dnskey_self_consistency(&response(vec![key], vec![], vec![]))
        .unwrap_err();
    assert!(err.is_unsigned());
}

#[test]
fn test_dnskey_signed_by_foreign_key_fails() {
    let world = World::new();
    let validator = validator(&world);

    // com's key set signed by example.com's key
    let key = DNSResource::new("com.", 3600, RData::DNSKEY(world.com.ksk.clone()));
    let mut sig = world.example.sign(std::slice::from_ref(&key));
    if let Some(RData::RRSIG(rrsig)) = &mut sig.parsed_rdata {
        rrsig.signer_name = "com.".to_string();
    }
    let err = validator
        .verify_dnskey_self_consistency(&response(vec![key, sig], vec![], vec![]))
        .unwrap_err();
    assert!(matches!(err, DnsSecError::SignatureInvalid(_)));
}

#[test]
fn test_ds_verified_under_parent_keys() {
    let world = World::new();
    let validator = validator(&world);
    let root = TrustedZone::new(".", vec![world.root.ksk.clone()]);

    let to_com = referral(&world.root, &world.com, COM_IP);
    let ds = validator
        .verify_answer_or_ds(&to_com, &root, DNSResourceType::DS)
        .unwrap();
    assert_eq!(ds.owner(), "com.");
    assert_eq!(ds.len(), 1);

    // Signed by com itself rather than its parent
    let self_signed = referral(&world.com, &world.com, COM_IP);
    assert!(
        validator
            .verify_answer_or_ds(&self_signed, &root, DNSResourceType::DS)
            .is_err()
    );
}

#[test]
fn test_missing_ds_reported_as_no_ds() {
    let world = World::new();
    let validator = validator(&world);
    let root = TrustedZone::new(".", vec![world.root.ksk.clone()]);

    let err = validator
        .verify_answer_or_ds(
            &unsigned_referral("com.", COM_IP),
            &root,
            DNSResourceType::DS,
        )
        .unwrap_err();
    assert_eq!(err, DnsSecError::NoDs);
}

#[test]
fn test_final_answer_verified_under_zone_keys() {
    let world = World::new();
    let validator = validator(&world);
    let example = TrustedZone::new("example.com.", vec![world.example.ksk.clone()]);
    let com = TrustedZone::new("com.", vec![world.com.ksk.clone()]);

    let answer = signed_answer(&world.example, vec![a_record("www.example.com.", WWW_ADDR)]);
    let rrset = validator
        .verify_final_answer(&answer, &example, DNSResourceType::A)
        .unwrap();
    assert_eq!(rrset.owner(), "www.example.com.");

    assert!(
        validator
            .verify_final_answer(&answer, &com, DNSResourceType::A)
            .is_err()
    );
}

#[test]
fn test_delegation_binding() {
    let world = World::new();
    let validator = validator(&world);

    let to_com = referral(&world.root, &world.com, COM_IP);
    assert!(
        validator
            .verify_delegation_binding(&world.com.dnskey_response(), &to_com)
            .is_ok()
    );

    let impostor = SignedZone::new("com.");
    assert_eq!(
        validator.verify_delegation_binding(&impostor.dnskey_response(), &to_com),
        Err(DnsSecError::DsMismatch("com.".to_string()))
    );
}

#[test]
fn test_delegation_binding_checks_owner() {
    let world = World::new();
    let validator = validator(&world);

    let to_com = referral(&world.root, &world.com, COM_IP);
    assert!(matches!(
        validator.verify_delegation_binding(&world.example.dnskey_response(), &to_com),
        Err(DnsSecError::DsMismatch(_))
    ));
}

#[test]
fn test_delegation_binding_requires_ksk() {
    let world = World::new();
    let validator = validator(&world);

    let mut zsk = world.com.ksk.clone();
    zsk.flags = 256;
    let keys = response(
        vec![DNSResource::new("com.", 3600, RData::DNSKEY(zsk))],
        vec![],
        vec![],
    );
    let to_com = referral(&world.root, &world.com, COM_IP);
    assert_eq!(
        validator.verify_delegation_binding(&keys, &to_com),
        Err(DnsSecError::NoKsk("com.".to_string()))
    );
}
