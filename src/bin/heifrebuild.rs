use clap::{ArgAction, Parser};
use heifbox::{BuildOptions, ParseOptions, build, parse, util::set_log};
use std::io::Write;

#[derive(Parser, Debug)]
#[command(version, about = "Parse a HEIF file and write it back out")]
struct Args {
    /// HEIF file path
    path: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    set_log(args.debug);

    let bytes = std::fs::read(&args.path)?;
    let tree = parse(&bytes, &ParseOptions { strict: args.strict, debug: args.debug, ..Default::default() })?;
    let out = build(&tree, &BuildOptions { debug: args.debug })?;
    match &args.output {
        Some(path) => std::fs::write(path, out)?,
        None => std::io::stdout().lock().write_all(&out)?,
    }
    Ok(())
}
