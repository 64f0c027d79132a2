//! Predicate registry.
//!
//! Predicate names are resolved to [`Predicate`] variants when rules are loaded, so a typo
//! in a rule file fails the load instead of silently never firing. Each predicate reports
//! the fact paths it examined together with its result; the engine turns those into
//! finding evidence.

use crate::error::{PolicyError, PolicyResult};
use crate::facts::{FactDocument, Platform};
use serde_json::Value;

/// A resolved leaf predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `targetsdk < policy_min`; absent `targetsdk` never fires.
    TargetSdkBelow { policy_min: i64 },
    PermissionDeclared(String),
    /// Fires when the permission is not declared (including a missing `permissions` field).
    PermissionMissing(String),
    ApiUses(String),
    PlistHas(String),
    /// Fires when the Info.plist key is absent.
    PlistMissing(String),
    EntitlementHas(String),
    PrivacyReasonDeclared(String),
    /// Fires when the privacy manifest lists no reason for the category.
    PrivacyReasonMissing(String),
    TrackingEquals(bool),
    AuthPresentEquals(bool),
    SdkUses(String),
}

/// Result of applying one predicate to one fact document.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub matched: bool,
    /// Fact paths examined, with the value seen (`null` when absent).
    pub examined: Vec<(String, Value)>,
}

type Builder = fn(&Value) -> Result<Predicate, String>;

struct PredicateSpec {
    name: &'static str,
    platform: Option<Platform>,
    build: Builder,
}

static REGISTRY: &[PredicateSpec] = &[
    PredicateSpec {
        name: "android.targetsdk.lt_policy_min",
        platform: Some(Platform::Android),
        build: build_target_sdk_below,
    },
    PredicateSpec {
        name: "android.permission.declared",
        platform: Some(Platform::Android),
        build: build_permission_declared,
    },
    PredicateSpec {
        name: "android.permission.missing",
        platform: Some(Platform::Android),
        build: build_permission_missing,
    },
    PredicateSpec {
        name: "ios.api.uses",
        platform: Some(Platform::Ios),
        build: build_api_uses,
    },
    PredicateSpec {
        name: "ios.plist.has",
        platform: Some(Platform::Ios),
        build: build_plist_has,
    },
    PredicateSpec {
        name: "ios.plist.missing",
        platform: Some(Platform::Ios),
        build: build_plist_missing,
    },
    PredicateSpec {
        name: "ios.entitlement.has",
        platform: Some(Platform::Ios),
        build: build_entitlement_has,
    },
    PredicateSpec {
        name: "ios.privacy.reason.declared",
        platform: Some(Platform::Ios),
        build: build_privacy_reason_declared,
    },
    PredicateSpec {
        name: "ios.privacy.reason.missing",
        platform: Some(Platform::Ios),
        build: build_privacy_reason_missing,
    },
    PredicateSpec {
        name: "ios.privacy.tracking",
        platform: Some(Platform::Ios),
        build: build_tracking,
    },
    PredicateSpec {
        name: "ios.auth.present",
        platform: Some(Platform::Ios),
        build: build_auth_present,
    },
    PredicateSpec {
        name: "sdk.uses",
        platform: None,
        build: build_sdk_uses,
    },
];

/// Names of every registered predicate, in registry order.
pub fn registered_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|spec| spec.name)
}

/// Resolve `{name: argument}` for a rule targeting `platform`.
pub fn resolve(
    name: &str,
    argument: &Value,
    platform: Platform,
    origin: &str,
) -> PolicyResult<Predicate> {
    let spec = REGISTRY
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| {
            PolicyError::schema(
                origin,
                format!(
                    "unknown predicate '{}' (known: {})",
                    name,
                    registered_names().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;

    if let Some(bound) = spec.platform {
        if bound != platform {
            return Err(PolicyError::schema(
                origin,
                format!(
                    "predicate '{}' only applies to {} facts, but the rule targets {}",
                    name, bound, platform
                ),
            ));
        }
    }

    (spec.build)(argument).map_err(|reason| {
        PolicyError::schema(origin, format!("predicate '{}': {}", name, reason))
    })
}

fn build_target_sdk_below(arg: &Value) -> Result<Predicate, String> {
    let policy_min = integer_arg(arg)?;
    Ok(Predicate::TargetSdkBelow { policy_min })
}

fn build_permission_declared(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::PermissionDeclared)
}

fn build_permission_missing(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::PermissionMissing)
}

fn build_api_uses(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::ApiUses)
}

fn build_plist_has(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::PlistHas)
}

fn build_plist_missing(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::PlistMissing)
}

fn build_entitlement_has(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::EntitlementHas)
}

fn build_privacy_reason_declared(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::PrivacyReasonDeclared)
}

fn build_privacy_reason_missing(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::PrivacyReasonMissing)
}

fn build_tracking(arg: &Value) -> Result<Predicate, String> {
    bool_arg(arg).map(Predicate::TrackingEquals)
}

fn build_auth_present(arg: &Value) -> Result<Predicate, String> {
    bool_arg(arg).map(Predicate::AuthPresentEquals)
}

fn build_sdk_uses(arg: &Value) -> Result<Predicate, String> {
    string_arg(arg).map(Predicate::SdkUses)
}

fn integer_arg(arg: &Value) -> Result<i64, String> {
    arg.as_i64()
        .ok_or_else(|| format!("expected an integer argument, got {}", arg))
}

fn string_arg(arg: &Value) -> Result<String, String> {
    match arg.as_str() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        Some(_) => Err("argument must not be empty".to_string()),
        None => Err(format!("expected a string argument, got {}", arg)),
    }
}

fn bool_arg(arg: &Value) -> Result<bool, String> {
    arg.as_bool()
        .ok_or_else(|| format!("expected a boolean argument, got {}", arg))
}

impl Predicate {
    /// Registry name of this predicate.
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::TargetSdkBelow { .. } => "android.targetsdk.lt_policy_min",
            Predicate::PermissionDeclared(_) => "android.permission.declared",
            Predicate::PermissionMissing(_) => "android.permission.missing",
            Predicate::ApiUses(_) => "ios.api.uses",
            Predicate::PlistHas(_) => "ios.plist.has",
            Predicate::PlistMissing(_) => "ios.plist.missing",
            Predicate::EntitlementHas(_) => "ios.entitlement.has",
            Predicate::PrivacyReasonDeclared(_) => "ios.privacy.reason.declared",
            Predicate::PrivacyReasonMissing(_) => "ios.privacy.reason.missing",
            Predicate::TrackingEquals(_) => "ios.privacy.tracking",
            Predicate::AuthPresentEquals(_) => "ios.auth.present",
            Predicate::SdkUses(_) => "sdk.uses",
        }
    }

    /// Apply the predicate. Pure: the same facts always give the same observation.
    pub fn observe(&self, facts: &FactDocument) -> Observation {
        match self {
            Predicate::TargetSdkBelow { policy_min } => match facts.integer("targetsdk") {
                Some(sdk) => Observation::single(sdk < *policy_min, "targetsdk", sdk.into()),
                None => Observation::single(false, "targetsdk", Value::Null),
            },
            Predicate::PermissionDeclared(p) => membership(facts, "permissions", p, true),
            Predicate::PermissionMissing(p) => membership(facts, "permissions", p, false),
            Predicate::ApiUses(symbol) => membership(facts, "signals.symbols", symbol, true),
            Predicate::PlistHas(key) => membership(facts, "plist_keys", key, true),
            Predicate::PlistMissing(key) => membership(facts, "plist_keys", key, false),
            Predicate::EntitlementHas(key) => {
                let present = facts.map_has_key("entitlements", key);
                Observation::single(present, format!("entitlements[{}]", key), present.into())
            }
            Predicate::PrivacyReasonDeclared(category) => privacy_reason(facts, category, true),
            Predicate::PrivacyReasonMissing(category) => privacy_reason(facts, category, false),
            Predicate::TrackingEquals(expected) => {
                flag_equals(facts, "privacy_manifest.tracking", *expected)
            }
            Predicate::AuthPresentEquals(expected) => {
                flag_equals(facts, "signals.auth_present", *expected)
            }
            Predicate::SdkUses(sdk) => membership(facts, "signals.sdk_names", sdk, true),
        }
    }
}

impl Observation {
    fn single(matched: bool, path: impl Into<String>, seen: Value) -> Self {
        Self {
            matched,
            examined: vec![(path.into(), seen)],
        }
    }
}

fn membership(facts: &FactDocument, field: &str, item: &str, want_present: bool) -> Observation {
    let present = facts.set_contains(field, item);
    Observation::single(
        present == want_present,
        format!("{}[{}]", field, item),
        present.into(),
    )
}

fn privacy_reason(facts: &FactDocument, category: &str, want_declared: bool) -> Observation {
    let reasons = facts
        .get("privacy_manifest.reasons")
        .and_then(Value::as_object)
        .and_then(|map| map.get(category));
    let declared = reasons
        .and_then(Value::as_array)
        .is_some_and(|codes| !codes.is_empty());
    Observation::single(
        declared == want_declared,
        format!("privacy_manifest.reasons[{}]", category),
        reasons.cloned().unwrap_or(Value::Null),
    )
}

fn flag_equals(facts: &FactDocument, path: &str, expected: bool) -> Observation {
    match facts.boolean(path) {
        Some(flag) => Observation::single(flag == expected, path, flag.into()),
        None => Observation::single(false, path, Value::Null),
    }
}
