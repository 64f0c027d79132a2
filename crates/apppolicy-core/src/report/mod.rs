//! Findings report: the engine's output and the renderer's input.

pub mod html;

pub use html::render_html;

use crate::condition::FactsUsed;
use crate::error::{PolicyError, PolicyResult};
use crate::facts::Platform;
use crate::rules::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Fact values that caused a finding.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub facts_used: FactsUsed,
    /// Threshold from the rule's `then.policy_min`, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_min: Option<Value>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.facts_used.is_empty() && self.policy_min.is_none()
    }
}

/// One rule match against one fact document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub platform: Platform,
    pub severity: Severity,
    #[serde(default)]
    pub because: Option<Value>,
    #[serde(default)]
    pub then: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
    #[serde(default)]
    pub evidence: Evidence,
}

impl Finding {
    fn because_str(&self, key: &str) -> Option<&str> {
        self.because
            .as_ref()?
            .get(key)?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    /// Policy source URL from `because.url`.
    pub fn policy_url(&self) -> Option<&str> {
        self.because_str("url")
    }

    /// Policy section title from `because.section`.
    pub fn policy_section(&self) -> Option<&str> {
        self.because_str("section")
    }

    /// One-line rationale: `because.why` when the rule gives one, otherwise derived from
    /// the rule id and policy section.
    pub fn why(&self) -> String {
        if let Some(why) = self.because_str("why") {
            return why.to_string();
        }
        match self.policy_section() {
            Some(section) => format!(
                "Rule {} matched the detected facts; see policy section \"{}\".",
                self.id, section
            ),
            None => format!("Rule {} matched the detected facts.", self.id),
        }
    }
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub blocking: usize,
    pub advisory: usize,
    pub fyi: usize,
}

impl Summary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for finding in findings {
            summary.add(finding.severity);
        }
        summary
    }

    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Blocking => self.blocking += 1,
            Severity::Advisory => self.advisory += 1,
            Severity::Fyi => self.fyi += 1,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Blocking => self.blocking,
            Severity::Advisory => self.advisory,
            Severity::Fyi => self.fyi,
        }
    }

    pub fn total(&self) -> usize {
        self.blocking + self.advisory + self.fyi
    }
}

/// Evaluation result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub summary: Summary,
    pub findings: Vec<Finding>,
}

impl Report {
    /// Build a report; the summary is always derived from `findings`.
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            summary: Summary::from_findings(&findings),
            findings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Whether any finding is at least as urgent as `threshold`.
    pub fn has_findings_at_or_above(&self, threshold: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= threshold)
    }

    pub fn findings_for(&self, platform: Platform) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.platform == platform)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a report. The stored summary is ignored and recomputed.
    pub fn from_json_str(content: &str, origin: &str) -> PolicyResult<Self> {
        let value: Value = serde_json::from_str(content).map_err(|e| PolicyError::parse(origin, e))?;
        let report: Report =
            serde_json::from_value(value).map_err(|e| PolicyError::schema(origin, e))?;
        if report.summary.total() != report.findings.len() {
            tracing::warn!(
                origin = origin,
                summary_total = report.summary.total(),
                findings = report.findings.len(),
                "report summary does not match findings; recomputing"
            );
        }
        Ok(Self::new(report.findings))
    }

    pub fn load(path: &Path) -> PolicyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PolicyError::io(path, e))?;
        Self::from_json_str(&content, &path.display().to_string())
    }
}
