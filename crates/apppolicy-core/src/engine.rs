//! Rule evaluation: facts × rules → report.

use crate::facts::FactDocument;
use crate::report::{Evidence, Finding, Report};
use crate::rules::{Rule, RuleDocument};

/// Evaluate every rule against every fact document of the same platform.
///
/// Findings follow fact order, then rule order. Nothing is deduplicated: the same rule
/// firing on two fact documents yields two findings.
pub fn evaluate(facts: &[FactDocument], rules: &RuleDocument) -> Report {
    let mut findings = Vec::new();

    for (index, doc) in facts.iter().enumerate() {
        for rule in rules.rules.iter().filter(|r| r.platform == doc.platform()) {
            if let Some(finding) = evaluate_rule(rule, doc) {
                tracing::debug!(
                    rule = %finding.id,
                    fact_index = index,
                    severity = %finding.severity,
                    "rule matched"
                );
                findings.push(finding);
            }
        }
    }

    let report = Report::new(findings);
    tracing::info!(
        facts = facts.len(),
        rules = rules.len(),
        blocking = report.summary.blocking,
        advisory = report.summary.advisory,
        fyi = report.summary.fyi,
        "evaluation complete"
    );
    report
}

/// Evaluate one rule against one fact document, ignoring platform.
pub fn evaluate_rule(rule: &Rule, facts: &FactDocument) -> Option<Finding> {
    let outcome = rule.when.evaluate(facts);
    if !outcome.matched {
        return None;
    }

    Some(Finding {
        id: rule.id.clone(),
        platform: rule.platform,
        severity: rule.severity,
        because: rule.because.clone(),
        then: rule.then.clone(),
        remediation: rule.remediation(),
        evidence: Evidence {
            facts_used: outcome.facts_used,
            policy_min: rule.policy_min().cloned(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;
    use serde_json::json;

    fn facts(value: serde_json::Value) -> FactDocument {
        FactDocument::from_value(value, "test").unwrap()
    }

    fn rules(value: serde_json::Value) -> RuleDocument {
        RuleDocument::from_value(&value, "test").unwrap()
    }

    #[test]
    fn target_sdk_finding_carries_evidence() {
        let doc = rules(json!({"version": "t", "rules": [{
            "id": "android.target_sdk.minimum",
            "platform": "android",
            "severity": "blocking",
            "when": {"all": [{"android.targetsdk.lt_policy_min": 34}]},
            "then": {"policy_min": 34, "require": [], "remediation": ["Raise targetSdk to 34"]},
            "because": {"url": "u"}
        }]}));
        let report = evaluate(
            &[facts(json!({"platform": "android", "permissions": [], "targetsdk": 31}))],
            &doc,
        );

        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.severity, Severity::Blocking);
        assert_eq!(finding.remediation, vec!["Raise targetSdk to 34"]);
        assert_eq!(finding.evidence.policy_min, Some(json!(34)));
        assert_eq!(finding.evidence.facts_used.get("targetsdk"), Some(&json!(31)));
        assert_eq!(finding.evidence.facts_used.len(), 1);
    }

    #[test]
    fn no_dedup_across_fact_documents() {
        let doc = rules(json!({"rules": [{
            "id": "sdk.firebase",
            "platform": "ios",
            "severity": "fyi",
            "when": {"sdk.uses": "Firebase"}
        }]}));
        let fact = json!({"platform": "ios", "signals": {"sdk_names": ["Firebase"]}});
        let report = evaluate(&[facts(fact.clone()), facts(fact)], &doc);
        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.summary.fyi, 2);
    }

    #[test]
    fn findings_follow_fact_then_rule_order() {
        let doc = rules(json!({"rules": [
            {"id": "r1", "platform": "ios", "severity": "fyi", "when": {"all": []}},
            {"id": "r2", "platform": "ios", "severity": "blocking", "when": {"all": []}}
        ]}));
        let report = evaluate(
            &[facts(json!({"platform": "ios"})), facts(json!({"platform": "ios"}))],
            &doc,
        );
        let ids: Vec<_> = report.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["r1", "r2", "r1", "r2"]);
    }

    #[test]
    fn empty_inputs_give_empty_report() {
        let doc = rules(json!({"rules": []}));
        let report = evaluate(&[], &doc);
        assert!(report.is_empty());
        assert_eq!(report.summary.total(), 0);
    }
}
