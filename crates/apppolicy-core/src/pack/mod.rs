//! Signed rule packs.
//!
//! A pack is a gzip tar holding `rules.json` (the payload), `SIGNATURE.hex` (detached
//! Ed25519 signature over the exact payload bytes) and `PUBLIC_KEY.hex` (the signer).
//! Verification checks the signer against a [`TrustAnchor`] and the signature with the
//! anchor's copy of the key, then validates the payload's format tag.

mod archive;
pub mod builder;
pub mod trust;

pub use archive::{PackLimits, PackLimitsOverrides};
pub use builder::{
    canonical_json, parse_signing_key_hex, write_pack_archive, write_pack_members, PackBuilder,
};
pub use ed25519_dalek::SigningKey;
pub use trust::{key_id, parse_public_key_hex, TrustAnchor, TRUSTED_KEYS_ENV};

use crate::error::{PolicyError, PolicyResult};
use ed25519_dalek::Signature;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use trust::decode_hex_array;

pub const RULES_MEMBER: &str = "rules.json";
pub const SIGNATURE_MEMBER: &str = "SIGNATURE.hex";
pub const PUBLIC_KEY_MEMBER: &str = "PUBLIC_KEY.hex";

/// Format tag prefix; the suffix is the format version.
pub const PACK_FORMAT_PREFIX: &str = "apppolicy-rules-pack@";
pub const SUPPORTED_PACK_FORMAT_VERSIONS: &[&str] = &["1"];

/// A pack whose signature and format have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPack {
    pub format: String,
    pub version: Option<String>,
    /// Raw rule entries; compiled by the rule loader.
    pub rules: Vec<Value>,
    pub signer_key_id: String,
    pub payload_digest: String,
}

/// Verify the pack at `path` with default limits.
pub fn verify_pack(path: &Path, trust: &TrustAnchor) -> PolicyResult<VerifiedPack> {
    verify_pack_with_limits(path, trust, PackLimits::default())
}

pub fn verify_pack_with_limits(
    path: &Path,
    trust: &TrustAnchor,
    limits: PackLimits,
) -> PolicyResult<VerifiedPack> {
    if trust.is_empty() {
        return Err(no_trust_anchor());
    }
    let file = std::fs::File::open(path).map_err(|e| PolicyError::io(path, e))?;
    verify_pack_reader(
        std::io::BufReader::new(file),
        trust,
        limits,
        &path.display().to_string(),
    )
}

fn no_trust_anchor() -> PolicyError {
    PolicyError::trust(format!(
        "no trusted public key configured (set {} or pass --trusted-key)",
        TRUSTED_KEYS_ENV
    ))
}

/// Verify a pack from any reader. `origin` names the source in error messages.
pub fn verify_pack_reader<R: Read>(
    reader: R,
    trust: &TrustAnchor,
    limits: PackLimits,
    origin: &str,
) -> PolicyResult<VerifiedPack> {
    if trust.is_empty() {
        return Err(no_trust_anchor());
    }

    let members = archive::read_members(reader, limits, origin)?;

    let public_key = text_member(&members.public_key, PUBLIC_KEY_MEMBER, origin)?;
    let public_key: [u8; 32] = decode_hex_array(public_key)
        .map_err(|e| PolicyError::parse(origin, format!("{}: {}", PUBLIC_KEY_MEMBER, e)))?;
    let signature = text_member(&members.signature, SIGNATURE_MEMBER, origin)?;
    let signature: [u8; 64] = decode_hex_array(signature)
        .map_err(|e| PolicyError::parse(origin, format!("{}: {}", SIGNATURE_MEMBER, e)))?;

    let signer_key_id = key_id(&public_key);
    let verifying_key = trust.get(&public_key).ok_or_else(|| {
        PolicyError::trust(format!("pack signer {} is not trusted", signer_key_id))
    })?;

    let signature = Signature::from_bytes(&signature);
    verifying_key
        .verify_strict(&members.rules, &signature)
        .map_err(|_| {
            tracing::warn!(origin = origin, signer = %signer_key_id, "pack signature rejected");
            PolicyError::bad_signature(format!(
                "{}: signature does not match {}",
                origin, RULES_MEMBER
            ))
        })?;

    let payload_digest = format!("sha256:{}", hex::encode(Sha256::digest(&members.rules)));
    let payload: Value = serde_json::from_slice(&members.rules)
        .map_err(|e| PolicyError::parse(origin, format!("{}: {}", RULES_MEMBER, e)))?;
    let (format, version, rules) = check_payload(payload, origin)?;

    tracing::debug!(
        origin = origin,
        signer = %signer_key_id,
        digest = %payload_digest,
        "pack signature verified"
    );

    Ok(VerifiedPack {
        format,
        version,
        rules,
        signer_key_id,
        payload_digest,
    })
}

fn text_member<'a>(bytes: &'a [u8], name: &str, origin: &str) -> PolicyResult<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|_| PolicyError::parse(origin, format!("{} is not valid UTF-8", name)))
}

type PayloadParts = (String, Option<String>, Vec<Value>);

fn check_payload(payload: Value, origin: &str) -> PolicyResult<PayloadParts> {
    let Value::Object(mut payload) = payload else {
        return Err(PolicyError::schema(origin, "pack payload must be a JSON object"));
    };

    let format = match payload.get("format") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(PolicyError::schema(origin, "pack 'format' must be a string")),
        None => return Err(PolicyError::schema(origin, "pack payload has no 'format' tag")),
    };
    match format.strip_prefix(PACK_FORMAT_PREFIX) {
        Some(v) if SUPPORTED_PACK_FORMAT_VERSIONS.contains(&v) => {}
        _ => {
            return Err(PolicyError::schema(
                origin,
                format!(
                    "unsupported pack format '{}' (expected {}{{{}}})",
                    format,
                    PACK_FORMAT_PREFIX,
                    SUPPORTED_PACK_FORMAT_VERSIONS.join(",")
                ),
            ))
        }
    }

    let version = match payload.get("version") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => {
            return Err(PolicyError::schema(
                origin,
                "pack 'version' must be a string or number",
            ))
        }
    };

    let rules = match payload.remove("rules") {
        Some(Value::Array(rules)) => rules,
        Some(_) => return Err(PolicyError::schema(origin, "pack 'rules' must be a list")),
        None => return Err(PolicyError::schema(origin, "pack payload has no 'rules'")),
    };

    Ok((format, version, rules))
}
