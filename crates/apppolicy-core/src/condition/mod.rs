//! Condition trees: `all` / `any` combinators over registered predicates.
//!
//! Trees are compiled once per rule at load time. Evaluation is short-circuiting left to
//! right; predicates are pure, so the order only affects which leaves are visited.

pub mod predicates;

pub use predicates::{Observation, Predicate};

use crate::error::{PolicyError, PolicyResult};
use crate::facts::{FactDocument, Platform};
use serde_json::Value;
use std::collections::BTreeMap;

/// Nesting limit for `all`/`any` trees.
pub const MAX_CONDITION_DEPTH: usize = 32;

/// Fact paths examined by the predicates that made a condition hold.
pub type FactsUsed = BTreeMap<String, Value>;

/// A compiled condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// True iff every child is true; empty is true.
    All(Vec<Condition>),
    /// True iff at least one child is true; empty is false.
    Any(Vec<Condition>),
    Leaf(Predicate),
}

/// Result of evaluating a condition against one fact document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub matched: bool,
    /// Only populated when `matched` is true.
    pub facts_used: FactsUsed,
}

impl Outcome {
    fn unmatched() -> Self {
        Self::default()
    }
}

impl Condition {
    /// Compile a `when` tree for a rule targeting `platform`.
    ///
    /// `origin` prefixes error messages (e.g. `rules.yaml: rule 'x'`).
    pub fn compile(value: &Value, platform: Platform, origin: &str) -> PolicyResult<Self> {
        compile_node(value, platform, origin, "when", 0)
    }

    pub fn evaluate(&self, facts: &FactDocument) -> Outcome {
        match self {
            Condition::Leaf(predicate) => {
                let observation = predicate.observe(facts);
                if observation.matched {
                    Outcome {
                        matched: true,
                        facts_used: observation.examined.into_iter().collect(),
                    }
                } else {
                    Outcome::unmatched()
                }
            }
            Condition::All(children) => {
                let mut facts_used = FactsUsed::new();
                for child in children {
                    let outcome = child.evaluate(facts);
                    if !outcome.matched {
                        return Outcome::unmatched();
                    }
                    facts_used.extend(outcome.facts_used);
                }
                Outcome {
                    matched: true,
                    facts_used,
                }
            }
            Condition::Any(children) => children
                .iter()
                .map(|child| child.evaluate(facts))
                .find(|outcome| outcome.matched)
                .unwrap_or_else(Outcome::unmatched),
        }
    }

    /// Every leaf predicate in the tree, depth first.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Condition::Leaf(p) => out.push(p),
            Condition::All(children) | Condition::Any(children) => {
                for child in children {
                    child.collect_predicates(out);
                }
            }
        }
    }
}

fn compile_node(
    value: &Value,
    platform: Platform,
    origin: &str,
    at: &str,
    depth: usize,
) -> PolicyResult<Condition> {
    if depth > MAX_CONDITION_DEPTH {
        return Err(PolicyError::schema(
            origin,
            format!("{}: condition nested deeper than {}", at, MAX_CONDITION_DEPTH),
        ));
    }

    let map = value.as_object().ok_or_else(|| {
        PolicyError::schema(origin, format!("{}: condition must be a mapping", at))
    })?;

    if map.len() != 1 {
        return Err(PolicyError::schema(
            origin,
            format!(
                "{}: condition must have exactly one key, found {}",
                at,
                map.len()
            ),
        ));
    }

    let Some((key, argument)) = map.iter().next() else {
        return Err(PolicyError::schema(origin, format!("{}: empty condition", at)));
    };

    match key.as_str() {
        "all" | "any" => {
            let items = argument.as_array().ok_or_else(|| {
                PolicyError::schema(origin, format!("{}.{}: expected a list", at, key))
            })?;
            let children = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    compile_node(
                        item,
                        platform,
                        origin,
                        &format!("{}.{}[{}]", at, key, i),
                        depth + 1,
                    )
                })
                .collect::<PolicyResult<Vec<_>>>()?;
            Ok(if key == "all" {
                Condition::All(children)
            } else {
                Condition::Any(children)
            })
        }
        name => {
            let predicate =
                predicates::resolve(name, argument, platform, &format!("{} ({})", origin, at))?;
            Ok(Condition::Leaf(predicate))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn android_facts(targetsdk: i64) -> FactDocument {
        FactDocument::from_value(
            json!({"platform": "android", "permissions": ["android.permission.CAMERA"], "targetsdk": targetsdk}),
            "test",
        )
        .unwrap()
    }

    fn compile(value: Value) -> Condition {
        Condition::compile(&value, Platform::Android, "test").unwrap()
    }

    #[test]
    fn vacuous_combinators() {
        let facts = android_facts(31);
        assert!(compile(json!({"all": []})).evaluate(&facts).matched);
        assert!(!compile(json!({"any": []})).evaluate(&facts).matched);
    }

    #[test]
    fn all_collects_evidence_from_every_leaf() {
        let cond = compile(json!({"all": [
            {"android.targetsdk.lt_policy_min": 34},
            {"android.permission.declared": "android.permission.CAMERA"}
        ]}));
        let outcome = cond.evaluate(&android_facts(31));
        assert!(outcome.matched);
        assert_eq!(outcome.facts_used.get("targetsdk"), Some(&json!(31)));
        assert_eq!(
            outcome
                .facts_used
                .get("permissions[android.permission.CAMERA]"),
            Some(&json!(true))
        );
    }

    #[test]
    fn any_reports_only_the_leaf_that_fired() {
        let cond = compile(json!({"any": [
            {"android.permission.declared": "android.permission.READ_SMS"},
            {"android.targetsdk.lt_policy_min": 34}
        ]}));
        let outcome = cond.evaluate(&android_facts(30));
        assert!(outcome.matched);
        assert_eq!(outcome.facts_used.len(), 1);
        assert!(outcome.facts_used.contains_key("targetsdk"));
    }

    #[test]
    fn unmatched_outcome_carries_no_evidence() {
        let cond = compile(json!({"all": [
            {"android.targetsdk.lt_policy_min": 34},
            {"android.permission.declared": "android.permission.READ_SMS"}
        ]}));
        let outcome = cond.evaluate(&android_facts(30));
        assert!(!outcome.matched);
        assert!(outcome.facts_used.is_empty());
    }

    #[test]
    fn nested_trees() {
        let cond = compile(json!({"any": [
            {"all": [{"android.targetsdk.lt_policy_min": 30}]},
            {"all": [
                {"any": [{"android.permission.declared": "android.permission.CAMERA"}]},
                {"android.permission.missing": "android.permission.RECORD_AUDIO"}
            ]}
        ]}));
        assert!(cond.evaluate(&android_facts(33)).matched);
        assert_eq!(cond.predicates().len(), 3);
    }

    #[test]
    fn malformed_trees_are_schema_errors() {
        let cases = [
            json!([]),
            json!({}),
            json!({"all": [], "any": []}),
            json!({"all": {"android.targetsdk.lt_policy_min": 34}}),
            json!({"all": ["android.targetsdk.lt_policy_min"]}),
            json!({"android.targetsdk.lt_policy_max": 34}),
        ];
        for case in cases {
            let err = Condition::compile(&case, Platform::Android, "rule 'x'").unwrap_err();
            assert_eq!(err.kind(), "SchemaError", "case {}", case);
        }
    }

    #[test]
    fn error_points_at_the_offending_node() {
        let err = Condition::compile(
            &json!({"all": [{"all": []}, {"android.api.uses": "x"}]}),
            Platform::Android,
            "rule 'x'",
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("when.all[1]"), "{}", msg);
        assert!(msg.contains("android.api.uses"), "{}", msg);
    }

    #[test]
    fn depth_is_bounded() {
        let mut value = json!({"all": []});
        for _ in 0..(MAX_CONDITION_DEPTH + 2) {
            value = json!({"all": [value]});
        }
        let err = Condition::compile(&value, Platform::Android, "deep").unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }
}
