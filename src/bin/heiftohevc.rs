use clap::{ArgAction, Parser};
use heifbox::{HevcExtractOptions, ItemRole, ParseOptions, parse, to_hevc, util::set_log};
use std::io::Write;

#[derive(Parser, Debug)]
#[command(version, about = "Extract an image item from a HEIC file as an Annex-B HEVC stream")]
struct Args {
    /// HEIF file path
    path: String,

    /// Item ID to extract
    #[arg(short, long)]
    item: Option<u32>,

    /// Item role: primary|pitm, thumbnail|thmb, auxiliary|auxl|aux
    #[arg(short, long)]
    role: Option<ItemRole>,

    /// Auxiliary type to match for the auxiliary role
    #[arg(short, long)]
    urn: Option<String>,

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
    let tree = parse(&bytes, &ParseOptions { debug: args.debug, ..Default::default() })?;
    let opts = HevcExtractOptions { item_id: args.item, role: args.role, urn: args.urn };
    let out = to_hevc(&tree, &opts)?;
    match &args.output {
        Some(path) => std::fs::write(path, out)?,
        None => std::io::stdout().lock().write_all(&out)?,
    }
    Ok(())
}
