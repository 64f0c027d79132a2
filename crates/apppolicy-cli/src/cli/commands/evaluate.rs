use crate::cli::args::EvaluateArgs;
use crate::exit_codes;
use crate::fs::write_atomic;
use anyhow::Context;
use apppolicy_core::{
    evaluate, load_rule_source_with_limits, FactDocument, PackLimits, PackLimitsOverrides,
    RuleSource, TrustAnchor,
};

pub fn cmd_evaluate(args: EvaluateArgs) -> anyhow::Result<i32> {
    let facts = args
        .facts
        .iter()
        .map(|path| {
            FactDocument::load(path)
                .with_context(|| format!("failed to load facts from {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let source = match (args.rules, args.rules_pack) {
        (Some(path), None) => RuleSource::File(path),
        (None, Some(path)) => RuleSource::Pack(path),
        _ => anyhow::bail!("exactly one of --rules or --rules-pack is required"),
    };
    let trust = match &source {
        RuleSource::Pack(_) => Some(trust_anchor(&args.trusted_keys)?),
        RuleSource::File(_) => None,
    };
    let limits = match &args.pack_limits {
        Some(json) => {
            PackLimits::default().apply(PackLimitsOverrides::from_json_str(json, "--pack-limits")?)
        }
        None => PackLimits::default(),
    };
    let rules = load_rule_source_with_limits(&source, trust.as_ref(), limits)
        .with_context(|| format!("failed to load rules ({})", source))?;

    let report = evaluate(&facts, &rules);
    write_atomic(&args.out, report.to_json_pretty()?.as_bytes())?;

    println!(
        "Wrote {} (blocking: {}, advisory: {}, fyi: {})",
        args.out.display(),
        report.summary.blocking,
        report.summary.advisory,
        report.summary.fyi
    );

    match args.fail_on {
        Some(threshold) if report.has_findings_at_or_above(threshold) => {
            eprintln!("findings at or above {} present", threshold);
            Ok(exit_codes::FINDINGS)
        }
        _ => Ok(exit_codes::SUCCESS),
    }
}

/// Keys from `--trusted-key` win; otherwise the environment is consulted.
fn trust_anchor(keys: &[String]) -> anyhow::Result<TrustAnchor> {
    let anchor = if keys.is_empty() {
        TrustAnchor::from_env()?
    } else {
        TrustAnchor::from_hex_keys(keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty()))?
    };
    tracing::debug!(
        keys = ?anchor.key_ids().collect::<Vec<_>>(),
        "trust anchor configured"
    );
    Ok(anchor)
}
