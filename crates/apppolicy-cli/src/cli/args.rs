use apppolicy_core::Severity;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "apppolicy",
    version,
    about = "App-store policy linting for iOS and Android projects: scan, evaluate, report"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan an iOS project directory and write a fact document
    ScanIos(ScanArgs),
    /// Scan an Android project directory and write a fact document
    ScanAndroid(ScanArgs),
    /// Evaluate fact documents against a rule file or a signed rule pack
    Evaluate(EvaluateArgs),
    /// Render a JSON report as a standalone HTML page
    Html(HtmlArgs),
    /// Sign a rule file into a rule pack
    Pack(PackArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ScanArgs {
    /// Project root directory
    #[arg(long)]
    pub project: PathBuf,

    /// Output fact document (JSON)
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Clone, Debug)]
#[command(group(
    ArgGroup::new("rule_source")
        .required(true)
        .args(["rules", "rules_pack"])
))]
pub struct EvaluateArgs {
    /// Fact documents produced by scan-ios / scan-android
    #[arg(long, required = true, num_args = 1..)]
    pub facts: Vec<PathBuf>,

    /// Plain rule file (YAML or JSON)
    #[arg(long, conflicts_with = "rules_pack")]
    pub rules: Option<PathBuf>,

    /// Signed rule pack (.tar.gz)
    #[arg(long)]
    pub rules_pack: Option<PathBuf>,

    /// Output report (JSON)
    #[arg(long)]
    pub out: PathBuf,

    /// Trusted pack signer public key (hex). Repeatable or comma separated.
    /// Falls back to APPPOLICY_PUBKEY_HEX when not given.
    #[arg(long = "trusted-key", value_delimiter = ',')]
    pub trusted_keys: Vec<String>,

    /// Pack verification limit overrides as JSON,
    /// e.g. '{"max_pack_bytes": 1048576}'. Only used with --rules-pack.
    #[arg(long, requires = "rules_pack")]
    pub pack_limits: Option<String>,

    /// Exit with code 1 when a finding at or above this severity exists
    /// (blocking, advisory or fyi)
    #[arg(long)]
    pub fail_on: Option<Severity>,
}

#[derive(Args, Clone, Debug)]
pub struct HtmlArgs {
    /// JSON report produced by evaluate
    #[arg(long)]
    pub report: PathBuf,

    /// Output HTML file
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct PackArgs {
    /// Plain rule file to sign (YAML or JSON)
    #[arg(long)]
    pub rules: PathBuf,

    /// File holding the hex-encoded 32-byte Ed25519 seed
    #[arg(long)]
    pub signing_key: PathBuf,

    /// Output pack (.tar.gz)
    #[arg(long)]
    pub out: PathBuf,

    /// Version label; defaults to the rule file's own `version`
    #[arg(long = "pack-version")]
    pub pack_version: Option<String>,

    /// Unix timestamp recorded in the payload
    #[arg(long, default_value_t = 0)]
    pub generated_at: i64,
}
