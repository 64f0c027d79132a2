pub mod condition;
pub mod engine;
pub mod error;
pub mod facts;
pub mod pack;
pub mod report;
pub mod rules;
pub mod scan;

// Convenience re-exports
pub use condition::{Condition, Outcome, Predicate};
pub use engine::evaluate;
pub use error::{PolicyError, PolicyResult};
pub use facts::{FactDocument, Platform};
pub use pack::{
    verify_pack, verify_pack_reader, verify_pack_with_limits, PackBuilder, PackLimits,
    PackLimitsOverrides, TrustAnchor, VerifiedPack, TRUSTED_KEYS_ENV,
};
pub use report::{render_html, Evidence, Finding, Report, Summary};
pub use rules::{
    load_rule_source, load_rule_source_with_limits, load_rules, load_rules_pack,
    load_rules_pack_with_limits, parse_rules_str, Rule, RuleDocument, RuleSource, Severity,
};
pub use scan::{scan_android, scan_ios};
