use clap::{ArgAction, Parser};
use heifbox::{
    BuildOptions, FourCC, ParseOptions, build, dangling_references, parse, remove_boxes_by_type,
    util::set_log,
};
use std::io::Write;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Remove boxes by type and rebuild the file")]
struct Args {
    /// HEIF file path
    path: String,

    /// Comma-separated box types to remove (e.g. "thmb,auxl")
    #[arg(short = 't', long = "types", value_delimiter = ',', required = true)]
    types: Vec<String>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    set_log(args.debug);

    let types = args
        .types
        .iter()
        .map(|t| t.parse::<FourCC>())
        .collect::<Result<Vec<_>, _>>()?;

    let bytes = std::fs::read(&args.path)?;
    let mut tree = parse(&bytes, &ParseOptions { debug: args.debug, ..Default::default() })?;
    let removed = remove_boxes_by_type(&mut tree, &types);
    info!(removed, "boxes removed");
    let dangling = dangling_references(&tree);
    if !dangling.is_empty() {
        warn!(?dangling, "items referenced without an infe");
    }

    let out = build(&tree, &BuildOptions { debug: args.debug })?;
    match &args.output {
        Some(path) => std::fs::write(path, out)?,
        None => std::io::stdout().lock().write_all(&out)?,
    }
    Ok(())
}
