//! Fact documents produced by the project scanners.
//!
//! A fact document is an open JSON mapping: the core only interprets `platform` and the
//! fields predicates look up, everything else is carried through untouched.

use crate::error::{PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Mobile platform a fact document or rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ios" => Some(Platform::Ios),
            "android" => Some(Platform::Android),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one scanned project.
#[derive(Debug, Clone, PartialEq)]
pub struct FactDocument {
    platform: Platform,
    body: Map<String, Value>,
}

impl FactDocument {
    /// Validate a decoded JSON value as a fact document.
    pub fn from_value(value: Value, origin: &str) -> PolicyResult<Self> {
        let Value::Object(body) = value else {
            return Err(PolicyError::schema(
                origin,
                "fact document must be a JSON object",
            ));
        };

        let platform = match body.get("platform") {
            Some(Value::String(p)) => Platform::parse(p).ok_or_else(|| {
                PolicyError::schema(
                    origin,
                    format!("unknown platform '{}' (expected 'ios' or 'android')", p),
                )
            })?,
            Some(_) => {
                return Err(PolicyError::schema(origin, "'platform' must be a string"));
            }
            None => {
                return Err(PolicyError::schema(
                    origin,
                    "fact document is missing required field 'platform'",
                ));
            }
        };

        Ok(Self { platform, body })
    }

    /// Parse a fact document from JSON text.
    pub fn from_json_str(content: &str, origin: &str) -> PolicyResult<Self> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| PolicyError::parse(origin, e))?;
        Self::from_value(value, origin)
    }

    /// Read and parse a fact document from disk.
    pub fn load(path: &Path) -> PolicyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PolicyError::io(path, e))?;
        Self::from_json_str(&content, &path.display().to_string())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Look up a dotted field path (`signals.symbols`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.body.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Integer field, `None` when absent or not an integer.
    pub fn integer(&self, path: &str) -> Option<i64> {
        self.get(path)?.as_i64()
    }

    /// Boolean field, `None` when absent or not a boolean.
    pub fn boolean(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    /// Whether a string collection contains `item`.
    ///
    /// Absent or non-array fields count as empty collections.
    pub fn set_contains(&self, path: &str, item: &str) -> bool {
        self.get(path)
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|v| v.as_str() == Some(item)))
    }

    /// Whether the mapping at `path` has `key` (keys may contain dots).
    pub fn map_has_key(&self, path: &str, key: &str) -> bool {
        self.get(path)
            .and_then(Value::as_object)
            .is_some_and(|map| map.contains_key(key))
    }

    /// The full document, including fields the core does not interpret.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }
}

impl Serialize for FactDocument {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ios_facts() -> FactDocument {
        FactDocument::from_value(
            json!({
                "platform": "ios",
                "plist_keys": ["NSCameraUsageDescription"],
                "entitlements": {"com.apple.developer.healthkit": true},
                "signals": {"symbols": ["UIPasteboard"], "auth_present": false},
                "vendor_extension": {"anything": 1}
            }),
            "test",
        )
        .unwrap()
    }

    #[test]
    fn platform_is_required() {
        let err = FactDocument::from_value(json!({"permissions": []}), "facts.json").unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().contains("platform"));
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = FactDocument::from_value(json!({"platform": "windows"}), "f").unwrap_err();
        assert!(err.to_string().contains("windows"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = FactDocument::from_json_str("{\"platform\": ", "f").unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn dotted_lookup() {
        let facts = ios_facts();
        assert!(facts.set_contains("signals.symbols", "UIPasteboard"));
        assert!(!facts.set_contains("signals.symbols", "UIDevice"));
        assert!(!facts.set_contains("signals.sdk_names", "Firebase"));
        assert_eq!(facts.boolean("signals.auth_present"), Some(false));
        assert_eq!(facts.integer("targetsdk"), None);
    }

    #[test]
    fn entitlement_keys_may_contain_dots() {
        let facts = ios_facts();
        assert!(facts.map_has_key("entitlements", "com.apple.developer.healthkit"));
        assert!(!facts.map_has_key("entitlements", "com.apple.developer.icloud"));
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let facts = ios_facts();
        assert!(facts.as_map().contains_key("vendor_extension"));
        let round = serde_json::to_value(&facts).unwrap();
        assert_eq!(round["vendor_extension"]["anything"], 1);
    }
}
