use crate::cli::args::PackArgs;
use crate::exit_codes;
use crate::fs::write_atomic;
use anyhow::Context;
use apppolicy_core::pack::{key_id, parse_signing_key_hex};
use apppolicy_core::rules::read_rules_value;
use apppolicy_core::{PackBuilder, RuleDocument};

pub fn cmd_pack(args: PackArgs) -> anyhow::Result<i32> {
    let origin = args.rules.display().to_string();
    let document = read_rules_value(&args.rules)?;
    // Refuse to sign rules that would not load.
    let compiled = RuleDocument::from_value(&document, &origin)?;

    let seed = std::fs::read_to_string(&args.signing_key)
        .with_context(|| format!("failed to read signing key {}", args.signing_key.display()))?;
    let key = parse_signing_key_hex(&seed)?;

    let mut builder = PackBuilder::from_document(&document, &origin)?.generated_at(args.generated_at);
    if let Some(version) = args.pack_version {
        builder = builder.version(version);
    }
    let bytes = builder
        .build(&key)
        .context("failed to write signed rule pack")?;
    write_atomic(&args.out, &bytes)?;

    println!(
        "Wrote {} ({} rules, signer {})",
        args.out.display(),
        compiled.rules.len(),
        key_id(key.verifying_key().as_bytes())
    );
    println!("public key: {}", hex::encode(key.verifying_key().as_bytes()));
    Ok(exit_codes::SUCCESS)
}
