//! Trust anchor: the set of Ed25519 keys allowed to sign rule packs.

use crate::error::{PolicyError, PolicyResult};
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Environment variable holding trusted public keys (hex, comma or whitespace separated).
pub const TRUSTED_KEYS_ENV: &str = "APPPOLICY_PUBKEY_HEX";

/// Compute the key id for raw public key bytes: `sha256:<hex>`.
pub fn key_id(public_key: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(public_key)))
}

/// Decode a hex string into exactly `N` bytes. Surrounding whitespace is ignored.
pub(crate) fn decode_hex_array<const N: usize>(text: &str) -> Result<[u8; N], String> {
    let bytes = hex::decode(text.trim()).map_err(|e| format!("invalid hex: {}", e))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("expected {} bytes, got {}", N, len))
}

/// Parse a hex-encoded Ed25519 public key.
pub fn parse_public_key_hex(text: &str) -> PolicyResult<VerifyingKey> {
    let bytes: [u8; 32] = decode_hex_array(text)
        .map_err(|e| PolicyError::trust(format!("trusted key is not usable: {}", e)))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| {
        PolicyError::trust(format!("trusted key is not a valid Ed25519 point: {}", e))
    })
}

/// Trusted signer keys, indexed by key id.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchor {
    keys: BTreeMap<String, VerifyingKey>,
}

impl TrustAnchor {
    /// An anchor that trusts nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = VerifyingKey>) -> Self {
        let mut anchor = Self::empty();
        for key in keys {
            anchor.add_key(key);
        }
        anchor
    }

    /// Build an anchor from hex-encoded keys. Any malformed entry fails the whole anchor.
    pub fn from_hex_keys<I, S>(keys: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut anchor = Self::empty();
        for key in keys {
            anchor.add_key(parse_public_key_hex(key.as_ref())?);
        }
        Ok(anchor)
    }

    /// Build an anchor from a list like `"<hex>,<hex>"` or `"<hex> <hex>"`.
    pub fn from_list(list: &str) -> PolicyResult<Self> {
        Self::from_hex_keys(
            list.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty()),
        )
    }

    /// Build an anchor from [`TRUSTED_KEYS_ENV`]. Unset or blank yields an empty anchor.
    pub fn from_env() -> PolicyResult<Self> {
        match std::env::var(TRUSTED_KEYS_ENV) {
            Ok(value) => Self::from_list(&value),
            Err(std::env::VarError::NotPresent) => Ok(Self::empty()),
            Err(std::env::VarError::NotUnicode(_)) => Err(PolicyError::trust(format!(
                "{} is not valid unicode",
                TRUSTED_KEYS_ENV
            ))),
        }
    }

    pub fn add_key(&mut self, key: VerifyingKey) {
        self.keys.insert(key_id(key.as_bytes()), key);
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Key ids of all trusted keys, sorted.
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Look up a trusted key by its raw bytes.
    pub fn get(&self, public_key: &[u8]) -> Option<&VerifyingKey> {
        self.keys
            .get(&key_id(public_key))
            .filter(|key| key.as_bytes().as_slice() == public_key)
    }

    pub fn contains(&self, public_key: &[u8]) -> bool {
        self.get(public_key).is_some()
    }
}
