//! Bounded in-memory reading of rule-pack archives.

use super::{PUBLIC_KEY_MEMBER, RULES_MEMBER, SIGNATURE_MEMBER};
use crate::error::{PolicyError, PolicyResult};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use std::path::{Component, Path};

/// Resource limits for pack verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackLimits {
    pub max_pack_bytes: u64,
    pub max_decode_bytes: u64,
    pub max_member_bytes: u64,
}

impl Default for PackLimits {
    fn default() -> Self {
        Self {
            max_pack_bytes: 16 * 1024 * 1024,   // 16 MB compressed
            max_decode_bytes: 64 * 1024 * 1024, // 64 MB uncompressed
            max_member_bytes: 8 * 1024 * 1024,  // 8 MB
        }
    }
}

/// Partial overrides for `PackLimits`, e.g. from a config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackLimitsOverrides {
    pub max_pack_bytes: Option<u64>,
    pub max_decode_bytes: Option<u64>,
    pub max_member_bytes: Option<u64>,
}

impl PackLimitsOverrides {
    /// Parse overrides from JSON such as `{"max_pack_bytes": 1048576}`.
    ///
    /// Malformed JSON is a `ParseError`; unknown fields or wrong types are a `SchemaError`.
    pub fn from_json_str(content: &str, origin: &str) -> PolicyResult<Self> {
        serde_json::from_str(content).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => PolicyError::schema(origin, e),
            _ => PolicyError::parse(origin, e),
        })
    }
}

impl PackLimits {
    /// Apply overrides onto these limits. Only `Some` values override.
    pub fn apply(self, overrides: PackLimitsOverrides) -> Self {
        Self {
            max_pack_bytes: overrides.max_pack_bytes.unwrap_or(self.max_pack_bytes),
            max_decode_bytes: overrides.max_decode_bytes.unwrap_or(self.max_decode_bytes),
            max_member_bytes: overrides.max_member_bytes.unwrap_or(self.max_member_bytes),
        }
    }
}

/// A reader that limits the total number of bytes read and fails explicitly on overflow.
pub(crate) struct LimitReader<R> {
    inner: R,
    limit: u64,
    read: u64,
    error_tag: &'static str,
}

impl<R: Read> LimitReader<R> {
    pub(crate) fn new(inner: R, limit: u64, error_tag: &'static str) -> Self {
        Self {
            inner,
            limit,
            read: 0,
            error_tag,
        }
    }
}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.read >= self.limit {
            // Probe one byte: hitting EOF exactly at the limit is fine.
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(std::io::Error::other(format!(
                    "{}: exceeded limit of {} bytes",
                    self.error_tag, self.limit
                ))),
            };
        }

        let max_to_read = (self.limit - self.read).min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max_to_read])?;
        self.read += n as u64;

        Ok(n)
    }
}

/// Raw bytes of the three required pack members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackMembers {
    pub rules: Vec<u8>,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// Normalise a member path: drop `./` prefixes, reject anything but plain components.
fn member_name(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn archive_error(origin: &str, err: std::io::Error) -> PolicyError {
    PolicyError::parse(origin, format!("unreadable pack archive: {}", err))
}

/// Read the required members of a gzip tar pack into memory.
pub(crate) fn read_members<R: Read>(
    reader: R,
    limits: PackLimits,
    origin: &str,
) -> PolicyResult<PackMembers> {
    let reader = LimitReader::new(reader, limits.max_pack_bytes, "LimitPackBytes");
    let decoder = GzDecoder::new(reader);
    let limited_decoder = LimitReader::new(decoder, limits.max_decode_bytes, "LimitDecodeBytes");
    let mut archive = tar::Archive::new(limited_decoder);

    let mut rules: Option<Vec<u8>> = None;
    let mut signature: Option<Vec<u8>> = None;
    let mut public_key: Option<Vec<u8>> = None;

    let entries = archive.entries().map_err(|e| archive_error(origin, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| archive_error(origin, e))?;
        let raw_path = entry
            .path()
            .map_err(|e| archive_error(origin, e))?
            .to_path_buf();

        let name = member_name(&raw_path);
        let slot = match name.as_deref() {
            Some(RULES_MEMBER) => &mut rules,
            Some(SIGNATURE_MEMBER) => &mut signature,
            Some(PUBLIC_KEY_MEMBER) => &mut public_key,
            _ => {
                tracing::warn!(
                    origin = origin,
                    member = %raw_path.display(),
                    "ignoring unexpected pack member"
                );
                continue;
            }
        };
        let name = name.unwrap_or_default();

        if !entry.header().entry_type().is_file() {
            return Err(PolicyError::parse(
                origin,
                format!("pack member '{}' is not a regular file", name),
            ));
        }
        if slot.is_some() {
            return Err(PolicyError::parse(
                origin,
                format!("duplicate pack member '{}'", name),
            ));
        }

        let declared = entry.header().size().map_err(|e| archive_error(origin, e))?;
        if declared > limits.max_member_bytes {
            return Err(PolicyError::parse(
                origin,
                format!(
                    "pack member '{}' declared size {} exceeds limit {}",
                    name, declared, limits.max_member_bytes
                ),
            ));
        }

        let mut content = Vec::new();
        LimitReader::new(entry, limits.max_member_bytes, "LimitMemberBytes")
            .read_to_end(&mut content)
            .map_err(|e| archive_error(origin, e))?;
        *slot = Some(content);
    }

    let require = |slot: Option<Vec<u8>>, name: &str| {
        slot.ok_or_else(|| {
            PolicyError::parse(origin, format!("pack is missing required member '{}'", name))
        })
    };

    Ok(PackMembers {
        rules: require(rules, RULES_MEMBER)?,
        signature: require(signature, SIGNATURE_MEMBER)?,
        public_key: require(public_key, PUBLIC_KEY_MEMBER)?,
    })
}
