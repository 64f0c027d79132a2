//! Canonical rule-pack creation.
//!
//! Archives are deterministic: fixed gzip header, zeroed tar metadata, fixed member order.

use super::{PACK_FORMAT_PREFIX, PUBLIC_KEY_MEMBER, RULES_MEMBER, SIGNATURE_MEMBER};
use crate::error::{PolicyError, PolicyResult};
use ed25519_dalek::{Signer, SigningKey};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use serde_json::{Map, Value};
use std::io::Write;
use tar::{Builder, Header};

/// Current pack format tag.
pub fn current_format() -> String {
    format!("{}1", PACK_FORMAT_PREFIX)
}

/// Parse a hex-encoded 32-byte Ed25519 seed.
pub fn parse_signing_key_hex(text: &str) -> PolicyResult<SigningKey> {
    let seed: [u8; 32] = super::trust::decode_hex_array(text)
        .map_err(|e| PolicyError::trust(format!("signing key is not usable: {}", e)))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Serialize a JSON value with sorted keys and no whitespace.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn create_deterministic_tar<W: Write>(writer: W) -> Builder<GzEncoder<W>> {
    let encoder = GzBuilder::new()
        .mtime(0)
        .operating_system(255)
        .write(writer, Compression::best());

    let mut tar = Builder::new(encoder);
    tar.mode(tar::HeaderMode::Deterministic);
    tar
}

fn write_entry<T: Write>(tar: &mut Builder<T>, path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_path(path)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_cksum();

    tar.append(&header, data)
}

/// Write an arbitrary list of members as a deterministic gzip tar.
pub fn write_pack_members<W: Write>(writer: W, members: &[(&str, &[u8])]) -> std::io::Result<()> {
    let mut tar = create_deterministic_tar(writer);
    for (path, data) in members {
        write_entry(&mut tar, path, data)?;
    }
    tar.into_inner()?.finish()?;
    Ok(())
}

/// Write a pack from its three member contents.
pub fn write_pack_archive<W: Write>(
    writer: W,
    rules_json: &[u8],
    signature_hex: &str,
    public_key_hex: &str,
) -> std::io::Result<()> {
    write_pack_members(
        writer,
        &[
            (RULES_MEMBER, rules_json),
            (SIGNATURE_MEMBER, signature_hex.as_bytes()),
            (PUBLIC_KEY_MEMBER, public_key_hex.as_bytes()),
        ],
    )
}

/// Builds signed rule packs.
#[derive(Debug, Clone)]
pub struct PackBuilder {
    rules: Vec<Value>,
    version: Option<String>,
    generated_at: i64,
    format: String,
}

impl PackBuilder {
    pub fn new(rules: Vec<Value>) -> Self {
        Self {
            rules,
            version: None,
            generated_at: 0,
            format: current_format(),
        }
    }

    /// Build from a plain rule document value (`{version?, rules}`).
    pub fn from_document(doc: &Value, origin: &str) -> PolicyResult<Self> {
        let rules = doc
            .get("rules")
            .and_then(Value::as_array)
            .ok_or_else(|| PolicyError::schema(origin, "'rules' must be a list"))?;
        let mut builder = Self::new(rules.clone());
        match doc.get("version") {
            Some(Value::String(s)) => builder.version = Some(s.clone()),
            Some(Value::Number(n)) => builder.version = Some(n.to_string()),
            _ => {}
        }
        Ok(builder)
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn generated_at(mut self, generated_at: i64) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Override the format tag. Only useful for producing packs other tools will reject.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("format".into(), Value::String(self.format.clone()));
        payload.insert("generated_at".into(), Value::from(self.generated_at));
        payload.insert("rules".into(), Value::Array(self.rules.clone()));
        if let Some(version) = &self.version {
            payload.insert("version".into(), Value::String(version.clone()));
        }
        Value::Object(payload)
    }

    /// Canonical `rules.json` bytes.
    pub fn payload_bytes(&self) -> Vec<u8> {
        canonical_json(&self.payload()).into_bytes()
    }

    /// Sign and write the pack.
    pub fn write<W: Write>(&self, writer: W, key: &SigningKey) -> std::io::Result<()> {
        let payload = self.payload_bytes();
        let signature = key.sign(&payload);
        write_pack_archive(
            writer,
            &payload,
            &hex::encode(signature.to_bytes()),
            &hex::encode(key.verifying_key().as_bytes()),
        )
    }

    /// Sign and return the archive bytes.
    pub fn build(&self, key: &SigningKey) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out, key)?;
        Ok(out)
    }
}
