use crate::{
    boxes::{BoxBody, BoxId, BoxTree},
    known_boxes::KnownBox,
};
use serde::{Serialize, Serializer, ser::SerializeSeq};

/// A JSON-serializable view of one box and its subtree.
///
/// Designed for `heifdump --json` and for callers that want to inspect a
/// tree without matching on [`BoxBody`] themselves.
#[derive(Serialize)]
pub struct JsonBox<'a> {
    /// Box ID inside the tree arena.
    pub id: usize,
    /// Absolute offset in the source; `None` for synthesized boxes.
    pub offset: Option<u64>,
    /// Total size including the 8-byte header; `None` for synthesized boxes.
    pub size: Option<u64>,
    pub open_ended: bool,

    pub typ: String,
    /// Human-readable box name (e.g. "Item location").
    pub full_name: &'static str,
    /// "container", "leaf", "media" or "opaque".
    pub kind: &'static str,
    /// Body bytes a typed leaf left unparsed; kept verbatim on rebuild.
    pub unparsed_len: Option<usize>,
    /// Decoded fields; hex for binary data.
    pub fields: &'a BoxBody,
    pub children: Option<Vec<JsonBox<'a>>>,
}

pub fn tree_to_json(tree: &BoxTree) -> Vec<JsonBox<'_>> {
    tree.roots().iter().map(|&id| box_to_json(tree, id)).collect()
}

pub fn box_to_json(tree: &BoxTree, id: BoxId) -> JsonBox<'_> {
    let node = tree.node(id);
    let kind = match &node.body {
        BoxBody::Container(_) => "container",
        BoxBody::MediaData(_) => "media",
        BoxBody::Opaque => "opaque",
        _ => "leaf",
    };
    let children = node
        .is_container()
        .then(|| node.children.iter().map(|&c| box_to_json(tree, c)).collect());
    let unparsed_len = match (kind, node.origin()) {
        ("leaf", Some(o)) => Some(o.unparsed.len()),
        _ => None,
    };

    JsonBox {
        id: id.index(),
        offset: node.offset,
        size: node.length,
        open_ended: node.open_ended,
        typ: node.typ.to_string(),
        full_name: KnownBox::from(node.typ).full_name(),
        kind,
        unparsed_len,
        fields: &node.body,
        children,
    }
}

/// Serialize raw bytes as a lossy UTF-8 string (names, URLs).
pub fn as_text<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(bytes))
}

pub fn as_hex<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

pub fn as_hex_list<S: Serializer>(list: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
    let mut seq = s.serialize_seq(Some(list.len()))?;
    for bytes in list {
        seq.serialize_element(&hex::encode(bytes))?;
    }
    seq.end()
}
