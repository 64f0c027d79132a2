use crate::cli::args::ScanArgs;
use crate::exit_codes;
use crate::fs::write_atomic;
use anyhow::Context;
use apppolicy_core::{scan_android, scan_ios, FactDocument, PolicyResult};
use std::path::Path;

pub fn cmd_scan_ios(args: ScanArgs) -> anyhow::Result<i32> {
    run_scan(args, scan_ios)
}

pub fn cmd_scan_android(args: ScanArgs) -> anyhow::Result<i32> {
    run_scan(args, scan_android)
}

fn run_scan(
    args: ScanArgs,
    scanner: fn(&Path) -> PolicyResult<FactDocument>,
) -> anyhow::Result<i32> {
    let facts = scanner(&args.project)
        .with_context(|| format!("failed to scan {}", args.project.display()))?;
    let json = serde_json::to_string_pretty(&facts)?;
    write_atomic(&args.out, json.as_bytes())?;
    println!("Wrote {}", args.out.display());
    Ok(exit_codes::SUCCESS)
}
