use clap::{ArgAction, Parser};
use heifbox::{BuildOptions, ParseOptions, append_icc_profile, build, parse, util::set_log};
use std::io::Write;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Attach an ICC profile to every image item of a HEIF file")]
struct Args {
    /// HEIF file path
    path: String,

    /// ICC profile to embed
    #[arg(short, long)]
    profile: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    set_log(args.debug);

    let bytes = std::fs::read(&args.path)?;
    let icc = std::fs::read(&args.profile)?;
    let mut tree = parse(&bytes, &ParseOptions { debug: args.debug, ..Default::default() })?;
    let index = append_icc_profile(&mut tree, &icc)?;
    info!(property_index = index, "ICC profile added");

    let out = build(&tree, &BuildOptions { debug: args.debug })?;
    match &args.output {
        Some(path) => std::fs::write(path, out)?,
        None => std::io::stdout().lock().write_all(&out)?,
    }
    Ok(())
}
