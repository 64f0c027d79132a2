//! Rule documents: ordered, id-unique sets of compiled rules.

pub mod loader;
pub mod schema;

pub use loader::{
    load_rule_source, load_rule_source_with_limits, load_rules, load_rules_pack,
    load_rules_pack_with_limits, parse_rules_str, read_rules_value, RuleSource,
};

use crate::condition::Condition;
use crate::facts::Platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Finding severity, ordered by urgency (`Blocking` is the greatest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fyi,
    Advisory,
    Blocking,
}

impl Severity {
    /// Most urgent first.
    pub const ALL: [Severity; 3] = [Severity::Blocking, Severity::Advisory, Severity::Fyi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocking => "blocking",
            Severity::Advisory => "advisory",
            Severity::Fyi => "fyi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blocking" => Some(Severity::Blocking),
            "advisory" => Some(Severity::Advisory),
            "fyi" => Some(Severity::Fyi),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::parse(s).ok_or_else(|| {
            format!(
                "invalid severity '{}' (expected blocking, advisory or fyi)",
                s
            )
        })
    }
}

/// A compiled, platform-scoped policy check.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub platform: Platform,
    pub severity: Severity,
    pub when: Condition,
    /// Remediation metadata (`require`, `remediation`, `policy_min`, ...).
    pub then: Option<Value>,
    /// Provenance (`url`, `section`, ...).
    pub because: Option<Value>,
}

impl Rule {
    /// Ordered fix steps from `then.remediation`.
    pub fn remediation(&self) -> Vec<String> {
        self.then
            .as_ref()
            .and_then(|then| then.get("remediation"))
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Numeric threshold echoed into evidence.
    pub fn policy_min(&self) -> Option<&Value> {
        self.then.as_ref()?.get("policy_min")
    }
}

/// Ordered rule set. Order determines finding order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDocument {
    pub version: String,
    pub rules: Vec<Rule>,
}

impl RuleDocument {
    /// Compile a decoded `{version, rules}` document.
    pub fn from_value(value: &Value, origin: &str) -> crate::PolicyResult<Self> {
        schema::compile_document(value, origin)
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
