//! Structural validation of rule documents.
//!
//! Input is an already-decoded JSON value; anything that decodes but does not match the
//! rule contract is a `SchemaError`. Predicates are resolved here.

use super::{Rule, RuleDocument, Severity};
use crate::condition::Condition;
use crate::error::{PolicyError, PolicyResult};
use crate::facts::Platform;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Version used for plain rule files without a `version` field.
pub const DEFAULT_VERSION: &str = "unversioned";

const KNOWN_RULE_KEYS: &[&str] = &["id", "platform", "severity", "when", "then", "because"];

/// Compile a `{version, rules}` document.
pub fn compile_document(value: &Value, origin: &str) -> PolicyResult<RuleDocument> {
    let map = value
        .as_object()
        .ok_or_else(|| PolicyError::schema(origin, "rule document must be a mapping"))?;

    let version = match map.get("version") {
        None | Some(Value::Null) => DEFAULT_VERSION.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(PolicyError::schema(
                origin,
                format!("'version' must be a string, got {}", other),
            ))
        }
    };

    let rules = map
        .get("rules")
        .ok_or_else(|| PolicyError::schema(origin, "missing required field 'rules'"))?
        .as_array()
        .ok_or_else(|| PolicyError::schema(origin, "'rules' must be a list"))?;

    compile_rules(version, rules, origin)
}

/// Compile an ordered list of raw rules, enforcing id uniqueness.
pub fn compile_rules(version: String, raw: &[Value], origin: &str) -> PolicyResult<RuleDocument> {
    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(raw.len());

    for (index, value) in raw.iter().enumerate() {
        let rule = compile_rule(index, value, origin)?;
        if !seen.insert(rule.id.clone()) {
            return Err(PolicyError::schema(
                origin,
                format!("duplicate rule id '{}'", rule.id),
            ));
        }
        rules.push(rule);
    }

    Ok(RuleDocument { version, rules })
}

fn compile_rule(index: usize, value: &Value, origin: &str) -> PolicyResult<Rule> {
    let map = value.as_object().ok_or_else(|| {
        PolicyError::schema(origin, format!("rules[{}] must be a mapping", index))
    })?;

    let id = match map.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(_) => {
            return Err(PolicyError::schema(
                origin,
                format!("rules[{}]: 'id' must be a non-empty string", index),
            ))
        }
        None => {
            return Err(PolicyError::schema(
                origin,
                format!("rules[{}]: missing required field 'id'", index),
            ))
        }
    };
    let at = format!("{}: rule '{}'", origin, id);

    let severity_raw = required_str(map, "severity", &at)?;
    let severity = severity_raw
        .parse::<Severity>()
        .map_err(|reason| PolicyError::schema(&at, reason))?;

    let platform_raw = required_str(map, "platform", &at)?;
    let platform = Platform::parse(platform_raw).ok_or_else(|| {
        PolicyError::schema(
            &at,
            format!(
                "invalid platform '{}' (expected 'ios' or 'android')",
                platform_raw
            ),
        )
    })?;

    let when_raw = map
        .get("when")
        .ok_or_else(|| PolicyError::schema(&at, "missing required field 'when'"))?;
    let when = Condition::compile(when_raw, platform, &at)?;

    let then = optional_mapping(map, "then", &at)?;
    if let Some(steps) = then.as_ref().and_then(|t| t.get("remediation")) {
        let valid = steps
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !valid {
            return Err(PolicyError::schema(
                &at,
                "'then.remediation' must be a list of strings",
            ));
        }
    }
    let because = optional_mapping(map, "because", &at)?;

    for key in map.keys() {
        if !KNOWN_RULE_KEYS.contains(&key.as_str()) {
            tracing::debug!(rule_id = %id, key = %key, "ignoring unrecognized rule field");
        }
    }

    Ok(Rule {
        id,
        platform,
        severity,
        when,
        then,
        because,
    })
}

fn required_str<'a>(map: &'a Map<String, Value>, key: &str, at: &str) -> PolicyResult<&'a str> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(PolicyError::schema(
            at,
            format!("'{}' must be a string, got {}", key, other),
        )),
        None => Err(PolicyError::schema(
            at,
            format!("missing required field '{}'", key),
        )),
    }
}

fn optional_mapping(map: &Map<String, Value>, key: &str, at: &str) -> PolicyResult<Option<Value>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v.clone())),
        Some(other) => Err(PolicyError::schema(
            at,
            format!("'{}' must be a mapping, got {}", key, other),
        )),
    }
}
