use crate::cli::args::HtmlArgs;
use crate::exit_codes;
use crate::fs::write_atomic;
use apppolicy_core::{render_html, Report};

pub fn cmd_html(args: HtmlArgs) -> anyhow::Result<i32> {
    let report = Report::load(&args.report)?;
    let html = render_html(&report);
    write_atomic(&args.out, html.as_bytes())?;
    println!("Wrote {}", args.out.display());
    Ok(exit_codes::SUCCESS)
}
