use super::super::args::*;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::ScanIos(args) => super::scan::cmd_scan_ios(args),
        Command::ScanAndroid(args) => super::scan::cmd_scan_android(args),
        Command::Evaluate(args) => super::evaluate::cmd_evaluate(args),
        Command::Html(args) => super::html::cmd_html(args),
        Command::Pack(args) => super::pack::cmd_pack(args),
    }
}
