//! Signed rule-pack verification: happy path, tampering and trust failures.

use apppolicy_core::pack::{
    canonical_json, key_id, write_pack_archive, write_pack_members, PUBLIC_KEY_MEMBER,
    RULES_MEMBER, SIGNATURE_MEMBER,
};
use apppolicy_core::{
    evaluate, load_rule_source, load_rules_pack, verify_pack, verify_pack_reader, FactDocument,
    PackBuilder, PackLimits, PolicyError, RuleSource, TrustAnchor,
};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Deterministic test key seeds.
const PUBLISHER_SEED: [u8; 32] = [0x11; 32];
const ATTACKER_SEED: [u8; 32] = [0x66; 32];

fn publisher() -> SigningKey {
    SigningKey::from_bytes(&PUBLISHER_SEED)
}

fn attacker() -> SigningKey {
    SigningKey::from_bytes(&ATTACKER_SEED)
}

fn trust(key: &SigningKey) -> TrustAnchor {
    TrustAnchor::from_hex_keys([hex::encode(key.verifying_key().as_bytes())]).unwrap()
}

fn pro_rules() -> Vec<Value> {
    vec![json!({
        "id": "android.target_sdk.minimum",
        "platform": "android",
        "severity": "blocking",
        "when": {"all": [{"android.targetsdk.lt_policy_min": 34}]},
        "then": {"policy_min": 34}
    })]
}

fn write_pack(dir: &Path, bytes: &[u8]) -> PathBuf {
    let path = dir.join("pro.tar.gz");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn verify_bytes(bytes: &[u8], anchor: &TrustAnchor) -> Result<(), PolicyError> {
    verify_pack_reader(bytes, anchor, PackLimits::default(), "test-pack").map(|_| ())
}

#[test]
fn valid_pack_loads_and_evaluates() {
    let dir = tempfile::tempdir().unwrap();
    let key = publisher();
    let bytes = PackBuilder::new(pro_rules())
        .version("2025.10")
        .build(&key)
        .unwrap();
    let path = write_pack(dir.path(), &bytes);

    let pack = verify_pack(&path, &trust(&key)).unwrap();
    assert_eq!(pack.signer_key_id, key_id(key.verifying_key().as_bytes()));
    assert_eq!(pack.version.as_deref(), Some("2025.10"));

    let doc = load_rules_pack(&path, &trust(&key)).unwrap();
    assert_eq!(doc.version, "2025.10");

    let facts = FactDocument::from_value(json!({"platform": "android", "targetsdk": 33}), "f")
        .unwrap();
    let report = evaluate(&[facts], &doc);
    assert_eq!(report.summary.blocking, 1);
}

#[test]
fn pack_without_version_uses_pack_label() {
    let dir = tempfile::tempdir().unwrap();
    let key = publisher();
    let path = write_pack(dir.path(), &PackBuilder::new(pro_rules()).build(&key).unwrap());
    let doc = load_rule_source(&RuleSource::Pack(path), Some(&trust(&key))).unwrap();
    assert_eq!(doc.version, "pack");
}

#[test]
fn randomly_generated_keys_verify() {
    let key = SigningKey::generate(&mut rand::rngs::OsRng);
    let bytes = PackBuilder::new(pro_rules()).build(&key).unwrap();
    assert!(verify_bytes(&bytes, &trust(&key)).is_ok());
}

#[test]
fn one_byte_tamper_is_bad_signature() {
    let key = publisher();
    let payload = PackBuilder::new(pro_rules()).payload_bytes();
    let signature = hex::encode(key.sign(&payload).to_bytes());

    // Raise the threshold from 34 to 35 without re-signing.
    let tampered = String::from_utf8(payload.clone())
        .unwrap()
        .replace("34", "35")
        .into_bytes();
    assert_eq!(tampered.len(), payload.len());
    assert_ne!(tampered, payload);

    let mut bytes = Vec::new();
    write_pack_archive(
        &mut bytes,
        &tampered,
        &signature,
        &hex::encode(key.verifying_key().as_bytes()),
    )
    .unwrap();

    let err = verify_bytes(&bytes, &trust(&key)).unwrap_err();
    assert!(matches!(err, PolicyError::BadSignature { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn signature_from_other_key_is_bad_signature() {
    // Embedded key is trusted, but the signature was made by someone else.
    let key = publisher();
    let payload = PackBuilder::new(pro_rules()).payload_bytes();
    let forged = hex::encode(attacker().sign(&payload).to_bytes());

    let mut bytes = Vec::new();
    write_pack_archive(
        &mut bytes,
        &payload,
        &forged,
        &hex::encode(key.verifying_key().as_bytes()),
    )
    .unwrap();

    let err = verify_bytes(&bytes, &trust(&key)).unwrap_err();
    assert_eq!(err.kind(), "BadSignatureError");
}

#[test]
fn untrusted_signer_is_trust_error() {
    let bytes = PackBuilder::new(pro_rules()).build(&attacker()).unwrap();
    let err = verify_bytes(&bytes, &trust(&publisher())).unwrap_err();
    assert!(matches!(err, PolicyError::TrustConfiguration { .. }));
    assert!(err.to_string().contains("not trusted"));
}

#[test]
fn any_key_of_the_anchor_is_accepted() {
    let anchor = TrustAnchor::from_keys([
        attacker().verifying_key(),
        publisher().verifying_key(),
    ]);
    let bytes = PackBuilder::new(pro_rules()).build(&publisher()).unwrap();
    assert!(verify_bytes(&bytes, &anchor).is_ok());
}

#[test]
fn empty_anchor_is_trust_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pack(
        dir.path(),
        &PackBuilder::new(pro_rules()).build(&publisher()).unwrap(),
    );
    let err = verify_pack(&path, &TrustAnchor::empty()).unwrap_err();
    assert_eq!(err.kind(), "TrustConfigurationError");
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn malformed_trusted_key_is_trust_error() {
    let err = TrustAnchor::from_hex_keys(["zz".repeat(32)]).unwrap_err();
    assert_eq!(err.kind(), "TrustConfigurationError");
}

#[test]
fn missing_signature_member_is_parse_error() {
    let key = publisher();
    let payload = PackBuilder::new(pro_rules()).payload_bytes();
    let public_key = hex::encode(key.verifying_key().as_bytes());

    let mut bytes = Vec::new();
    write_pack_members(
        &mut bytes,
        &[
            (RULES_MEMBER, payload.as_slice()),
            (PUBLIC_KEY_MEMBER, public_key.as_bytes()),
        ],
    )
    .unwrap();

    let err = verify_bytes(&bytes, &trust(&key)).unwrap_err();
    assert_eq!(err.kind(), "ParseError");
    assert!(err.to_string().contains(SIGNATURE_MEMBER));
}

#[test]
fn format_confusion_is_schema_error() {
    let key = publisher();
    let bytes = PackBuilder::new(pro_rules())
        .format("mobile-lint-pack@1")
        .build(&key)
        .unwrap();
    let err = verify_bytes(&bytes, &trust(&key)).unwrap_err();
    assert_eq!(err.kind(), "SchemaError");
}

#[test]
fn signed_payload_without_format_is_schema_error() {
    let key = publisher();
    let payload = canonical_json(&json!({"rules": pro_rules()})).into_bytes();
    let mut bytes = Vec::new();
    write_pack_archive(
        &mut bytes,
        &payload,
        &hex::encode(key.sign(&payload).to_bytes()),
        &hex::encode(key.verifying_key().as_bytes()),
    )
    .unwrap();
    let err = verify_bytes(&bytes, &trust(&key)).unwrap_err();
    assert_eq!(err.kind(), "SchemaError");
}

#[test]
fn signed_garbage_payload_is_parse_error() {
    let key = publisher();
    let payload = b"{not json".to_vec();
    let mut bytes = Vec::new();
    write_pack_archive(
        &mut bytes,
        &payload,
        &hex::encode(key.sign(&payload).to_bytes()),
        &hex::encode(key.verifying_key().as_bytes()),
    )
    .unwrap();
    let err = verify_bytes(&bytes, &trust(&key)).unwrap_err();
    assert_eq!(err.kind(), "ParseError");
}

#[test]
fn signed_pack_with_bad_rule_is_schema_error() {
    let key = publisher();
    let dir = tempfile::tempdir().unwrap();
    let bytes = PackBuilder::new(vec![json!({
        "id": "x",
        "platform": "ios",
        "severity": "blocking",
        "when": {"ios.api.teleports": "x"}
    })])
    .build(&key)
    .unwrap();
    let path = write_pack(dir.path(), &bytes);
    let err = load_rules_pack(&path, &trust(&key)).unwrap_err();
    assert_eq!(err.kind(), "SchemaError");
}

#[test]
fn hex_members_tolerate_trailing_newline() {
    let key = publisher();
    let payload = PackBuilder::new(pro_rules()).payload_bytes();
    let mut bytes = Vec::new();
    write_pack_archive(
        &mut bytes,
        &payload,
        &format!("{}\n", hex::encode(key.sign(&payload).to_bytes())),
        &format!("{}\n", hex::encode(key.verifying_key().as_bytes())),
    )
    .unwrap();
    assert!(verify_bytes(&bytes, &trust(&key)).is_ok());
}

#[test]
fn truncated_archive_is_parse_error() {
    let bytes = PackBuilder::new(pro_rules()).build(&publisher()).unwrap();
    let err = verify_bytes(&bytes[..40], &trust(&publisher())).unwrap_err();
    assert_eq!(err.kind(), "ParseError");
}

#[test]
fn missing_pack_file_is_io_error() {
    let err = verify_pack(Path::new("/nonexistent/pro.tar.gz"), &trust(&publisher())).unwrap_err();
    assert_eq!(err.kind(), "IoError");
}
