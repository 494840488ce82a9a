use clap::{ArgAction, Parser};
use heifbox::{
    BoxBody, BoxId, BoxTree, FourCC, ItemIndex, ParseOptions, item_summaries,
    known_boxes::KnownBox,
    parse, tree_to_json,
    util::{dump_box_body, set_log},
};

#[derive(Parser, Debug)]
#[command(version, about = "HEIF/ISOBMFF box explorer")]
struct Args {
    /// HEIF file path
    path: String,

    /// Limit recursion depth of the printed tree
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Print decoded fields under each box
    #[arg(long, action = ArgAction::SetTrue)]
    decode: bool,

    /// Emit JSON instead of the human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Hex-dump the body of every box of this type (e.g. --hexdump hvcC)
    #[arg(long)]
    hexdump: Option<String>,

    /// Bytes to show per hex dump (0 means the whole body)
    #[arg(long, default_value_t = 256)]
    bytes: usize,

    /// List items with their types, references and properties
    #[arg(long, action = ArgAction::SetTrue)]
    items: bool,

    /// Show the property boxes associated with this item
    #[arg(long)]
    props: Option<u32>,

    /// Treat reserved-bit mismatches as errors
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Log every parsed box
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    set_log(args.debug);

    let bytes = std::fs::read(&args.path)?;
    let opts = ParseOptions { strict: args.strict, debug: args.debug, ..ParseOptions::default() };
    let tree = parse(&bytes, &opts)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree_to_json(&tree))?);
        return Ok(());
    }

    if args.items {
        for item in item_summaries(&tree) {
            print!("ItemID:{}", item.item_id);
            if let Some(t) = &item.item_type {
                print!(" infe:{t}");
            }
            if item.primary {
                print!(" pitm");
            }
            for r in &item.references {
                print!(" {}:{}->{:?}", r.kind, r.from, r.to);
            }
            if let Some(aux) = &item.aux_type {
                print!("  {aux}");
            }
            println!("  [{}]", item.properties.join(","));
        }
        return Ok(());
    }

    if let Some(item_id) = args.props {
        let index = ItemIndex::new(&tree);
        for id in index.property_boxes_for_item(item_id) {
            print_box(&tree, id, 0, 0, true)?;
        }
        return Ok(());
    }

    for &id in tree.roots() {
        print_box(&tree, id, 0, args.max_depth, args.decode)?;
    }

    if let Some(sel) = &args.hexdump {
        let typ: FourCC = sel.parse()?;
        for (i, id) in tree.find_all(typ).into_iter().enumerate() {
            println!("\n== Dump {i} ({typ}) ==");
            print!("{}", dump_box_body(&tree, id, args.bytes));
        }
    }
    Ok(())
}

fn print_box(tree: &BoxTree, id: BoxId, depth: usize, max_depth: usize, decode: bool) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    let node = tree.node(id);
    let offset = node.offset.map(|o| format!("{o:#x}")).unwrap_or_else(|| "-".to_string());
    let size = node.length.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string());
    println!(
        "{indent}{offset:>8} {size:>10} {} ({}){}",
        node.typ,
        KnownBox::from(node.typ).full_name(),
        if node.is_container() { " (container)" } else { "" }
    );
    if decode && !node.is_container() {
        println!("{indent}         -> {}", serde_json::to_string(&node.body)?);
        if let BoxBody::HevcConfig(c) = &node.body {
            println!("{indent}         chroma: {}({})", c.chroma_format, c.chroma_format_name());
        }
    }
    if node.is_container() && depth < max_depth {
        for &child in tree.children(id) {
            print_box(tree, child, depth + 1, max_depth, decode)?;
        }
    }
    Ok(())
}
