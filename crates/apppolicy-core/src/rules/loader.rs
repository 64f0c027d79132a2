//! Rule sources: plain YAML/JSON files and signed rule packs.

use super::schema::{compile_document, compile_rules};
use super::RuleDocument;
use crate::error::{PolicyError, PolicyResult};
use crate::pack::{verify_pack_with_limits, PackLimits, TrustAnchor};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Version assigned to pack rule documents that do not declare one.
pub const PACK_DEFAULT_VERSION: &str = "pack";

/// Where a rule document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// Plain, unsigned rule file (YAML or JSON).
    File(PathBuf),
    /// Signed rule pack archive (`.tar.gz`).
    Pack(PathBuf),
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSource::File(path) => write!(f, "file:{}", path.display()),
            RuleSource::Pack(path) => write!(f, "pack:{}", path.display()),
        }
    }
}

/// Syntax of a plain rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesFormat {
    Json,
    Yaml,
}

impl RulesFormat {
    /// `.json` files are JSON, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RulesFormat::Json,
            _ => RulesFormat::Yaml,
        }
    }
}

/// Load a rule document from any source.
///
/// Pack sources need a trust anchor; plain files ignore it.
pub fn load_rule_source(
    source: &RuleSource,
    trust: Option<&TrustAnchor>,
) -> PolicyResult<RuleDocument> {
    load_rule_source_with_limits(source, trust, PackLimits::default())
}

/// [`load_rule_source`] with explicit pack limits.
pub fn load_rule_source_with_limits(
    source: &RuleSource,
    trust: Option<&TrustAnchor>,
    limits: PackLimits,
) -> PolicyResult<RuleDocument> {
    match source {
        RuleSource::File(path) => load_rules(path),
        RuleSource::Pack(path) => {
            let trust = trust.ok_or_else(|| {
                PolicyError::trust("signed pack requested but no trusted public key is configured")
            })?;
            load_rules_pack_with_limits(path, trust, limits)
        }
    }
}

/// Load a plain rule file.
pub fn load_rules(path: &Path) -> PolicyResult<RuleDocument> {
    let value = read_rules_value(path)?;
    let doc = compile_document(&value, &path.display().to_string())?;
    tracing::debug!(
        path = %path.display(),
        version = %doc.version,
        rules = doc.len(),
        "loaded rule file"
    );
    Ok(doc)
}

/// Read a plain rule file without compiling it.
pub fn read_rules_value(path: &Path) -> PolicyResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| PolicyError::io(path, e))?;
    parse_rules_value(
        &content,
        RulesFormat::from_path(path),
        &path.display().to_string(),
    )
}

fn parse_rules_value(content: &str, format: RulesFormat, origin: &str) -> PolicyResult<Value> {
    match format {
        RulesFormat::Json => serde_json::from_str(content).map_err(|e| PolicyError::parse(origin, e)),
        RulesFormat::Yaml => serde_yaml::from_str(content).map_err(|e| PolicyError::parse(origin, e)),
    }
}

/// Parse and compile rule text.
pub fn parse_rules_str(
    content: &str,
    format: RulesFormat,
    origin: &str,
) -> PolicyResult<RuleDocument> {
    let value = parse_rules_value(content, format, origin)?;
    compile_document(&value, origin)
}

/// Verify a signed pack and compile its rules.
pub fn load_rules_pack(path: &Path, trust: &TrustAnchor) -> PolicyResult<RuleDocument> {
    load_rules_pack_with_limits(path, trust, PackLimits::default())
}

pub fn load_rules_pack_with_limits(
    path: &Path,
    trust: &TrustAnchor,
    limits: PackLimits,
) -> PolicyResult<RuleDocument> {
    let pack = verify_pack_with_limits(path, trust, limits)?;
    let version = pack
        .version
        .clone()
        .unwrap_or_else(|| PACK_DEFAULT_VERSION.to_string());
    let doc = compile_rules(version, &pack.rules, &path.display().to_string())?;

    tracing::info!(
        path = %path.display(),
        format = %pack.format,
        signer = %pack.signer_key_id,
        digest = %pack.payload_digest,
        rules = doc.len(),
        "loaded signed rule pack"
    );
    Ok(doc)
}
