use clap::{ArgAction, Parser};
use heifbox::{BuildOptions, build, from_hevc, util::set_log};
use std::io::Write;

#[derive(Parser, Debug)]
#[command(version, about = "Wrap a single-image HEVC stream into a HEIC file")]
struct Args {
    /// Annex-B HEVC stream
    path: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    set_log(args.debug);

    let stream = std::fs::read(&args.path)?;
    let tree = from_hevc(&stream)?;
    let out = build(&tree, &BuildOptions { debug: args.debug })?;
    match &args.output {
        Some(path) => std::fs::write(path, out)?,
        None => std::io::stdout().lock().write_all(&out)?,
    }
    Ok(())
}
