use crate::boxes::{BoxId, BoxTree};
use std::fmt::Write;

/// Classic 16-bytes-per-row hex dump; `start_offset` labels the first row.
pub fn hex_dump(bytes: &[u8], start_offset: u64) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let hexs: String = chunk.iter().map(|b| format!("{b:02x} ")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect();
        let _ = writeln!(out, "{:08x}  {hexs:<48}  |{ascii}|", start_offset + row as u64 * 16);
    }
    out
}

/// Hex dump of a parsed box's body (header excluded), capped at `limit`
/// bytes when `limit > 0`.
pub fn dump_box_body(tree: &BoxTree, id: BoxId, limit: usize) -> String {
    let node = tree.node(id);
    let body = tree.media_bytes(id);
    let shown = if limit > 0 { &body[..body.len().min(limit)] } else { body };
    let start = node.offset.map(|o| o + 8).unwrap_or(0);
    hex_dump(shown, start)
}

/// Install a stderr `tracing` subscriber for the command-line tools.
/// `RUST_LOG` wins; otherwise `warn`, or `debug` when `debug` is set.
pub fn set_log(debug: bool) {
    use tracing_subscriber::EnvFilter;
    let fallback = if debug { "heifbox=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .compact()
        .with_target(true)
        .init();
}
