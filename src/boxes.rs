use crate::relink::Links;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(b: &[u8; 4]) -> Self {
        FourCC(*b)
    }
    pub fn as_str_lossy(&self) -> String {
        self.0.iter().map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
    /// All four bytes printable ASCII (spaces allowed).
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|c| (32..=126).contains(c))
    }
}
impl fmt::Debug for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }
impl fmt::Display for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }

impl FromStr for FourCC {
    type Err = crate::error::HeifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Ok(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            Err(crate::error::HeifError::InvalidParameter(format!(
                "box type '{s}' is not 4 bytes"
            )))
        }
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

/// Stable index of a box inside a [`BoxTree`] arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
pub struct BoxId(pub(crate) usize);

impl BoxId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a parsed box came from in the source buffer.
#[derive(Debug, Clone)]
pub struct Origin {
    /// Box body (everything after the 8-byte header).
    pub data: Range<usize>,
    /// Body bytes a typed codec did not consume; re-emitted verbatim.
    pub unparsed: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct BoxNode {
    pub typ: FourCC,
    /// Absolute offset in the source buffer; `None` for synthesized boxes.
    pub offset: Option<u64>,
    /// Total size including the header; `None` for synthesized boxes.
    pub length: Option<u64>,
    /// Declared with size 0 or 1 (extends to the end of its list).
    pub open_ended: bool,
    pub body: BoxBody,
    pub children: Vec<BoxId>,
    pub parent: Option<BoxId>,
    pub(crate) origin: Option<Origin>,
}

impl BoxNode {
    /// A box with no source position, e.g. built by the HEVC bridge.
    pub fn synthesized(typ: FourCC, body: BoxBody) -> Self {
        BoxNode {
            typ,
            offset: None,
            length: None,
            open_ended: false,
            body,
            children: Vec::new(),
            parent: None,
            origin: None,
        }
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn is_container(&self) -> bool {
        matches!(self.body, BoxBody::Container(_))
    }
}

/// Version and flags shared by "full" boxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FullHeader {
    pub version: u8,
    pub flags: u32,
}

/// Header written in front of a container's child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerHeader {
    None,
    Full(FullHeader),
    /// Full header followed by a 2- or 4-byte child count (`iinf`, `dref`).
    /// `declared` is what the source said; the builder writes the live count.
    Counted { full: FullHeader, count_bytes: u8, declared: u32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "codec", content = "fields", rename_all = "snake_case")]
pub enum BoxBody {
    Container(ContainerHeader),
    FileType(FileType),
    Handler(Handler),
    SpatialExtents(SpatialExtents),
    PixelAspectRatio(PixelAspectRatio),
    PrimaryItem(PrimaryItem),
    HevcConfig(HevcConfig),
    ItemLocation(ItemLocation),
    ItemReference(ItemReference),
    PropertyAssociation(PropertyAssociation),
    ItemInfoEntry(ItemInfoEntry),
    ColourInformation(ColourInformation),
    PixelInformation(PixelInformation),
    CleanAperture(CleanAperture),
    AuxiliaryType(AuxiliaryType),
    DataEntryUrl(DataEntryUrl),
    MovieHeader(MovieHeader),
    TrackHeader(TrackHeader),
    MediaData(MediaData),
    /// Unrecognized leaf; body copied from the source on build.
    Opaque,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileType {
    pub major: FourCC,
    pub minor: u32,
    pub compatible: Vec<FourCC>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Handler {
    pub full: FullHeader,
    pub component_type: FourCC,
    pub component_subtype: FourCC,
    pub component_manufacturer: FourCC,
    pub component_flags: u32,
    pub component_flags_mask: u32,
    #[serde(serialize_with = "crate::json_api::as_text")]
    pub name: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpatialExtents {
    pub full: FullHeader,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PixelAspectRatio {
    pub hspace: u32,
    pub vspace: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrimaryItem {
    pub full: FullHeader,
    pub item_id: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HevcConfig {
    pub version: u8,
    pub profile_space: u8,
    pub tier_flag: bool,
    pub profile_idc: u8,
    pub profile_compatibility_flags: u32,
    pub constraint_indicator_flags: u64,
    pub level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
    pub length_size_minus_one: u8,
    pub nal_arrays: Vec<NalArray>,
    /// Reserved bit groups as read, in stream order. Re-emitted unchanged.
    #[serde(skip)]
    pub reserved: [u8; 5],
}

impl HevcConfig {
    pub fn chroma_format_name(&self) -> &'static str {
        match self.chroma_format {
            0 => "Grayscale",
            1 => "YUV420",
            2 => "YUV422",
            3 => "YUV444",
            _ => "Unknown Chroma Format",
        }
    }
}

pub const HVCC_RESERVED: [u8; 5] = [0xF, 0x3F, 0x3F, 0x1F, 0x1F];

#[derive(Debug, Clone, Serialize)]
pub struct NalArray {
    pub array_completeness: bool,
    #[serde(skip)]
    pub reserved: bool,
    pub nal_unit_type: u8,
    #[serde(serialize_with = "crate::json_api::as_hex_list")]
    pub nalus: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemLocation {
    pub full: FullHeader,
    pub offset_size: u8,
    pub length_size: u8,
    pub base_offset_size: u8,
    /// Low nibble after `base_offset_size`: reserved in v0, `index_size` otherwise.
    pub index_size: u8,
    pub items: Vec<ItemLocationEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemLocationEntry {
    pub item_id: u32,
    pub construction_method: Option<u16>,
    pub data_reference_index: u16,
    pub base_offset: u64,
    pub extents: Vec<Extent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Extent {
    pub offset: u64,
    pub index: Option<u64>,
    pub length: u64,
}

/// `from_item_id -> [to_item_id]`, used by every child of `iref`
/// as well as standalone `thmb`/`dimg`/`auxl`/`cdsc` boxes.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReference {
    pub id_width: u8,
    pub from_item_id: u32,
    pub to_item_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyAssociation {
    pub full: FullHeader,
    pub entries: Vec<AssociationEntry>,
}

impl PropertyAssociation {
    pub fn wide_indices(&self) -> bool {
        self.full.flags & 1 != 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssociationEntry {
    pub item_id: u32,
    pub associations: Vec<Association>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Association {
    pub essential: bool,
    /// 1-origin index into the `ipco` child list; 0 means "no property".
    pub property_index: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemInfoEntry {
    pub full: FullHeader,
    pub item_id: u32,
    pub protection_index: u16,
    pub item_type: Option<FourCC>,
    pub item_name: String,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColourInformation {
    pub colour_type: FourCC,
    #[serde(serialize_with = "crate::json_api::as_hex")]
    pub data: Vec<u8>,
}

/// Leading `mvhd` fields. Rate, volume, matrix and next track ID stay in
/// the unparsed tail.
#[derive(Debug, Clone, Serialize)]
pub struct MovieHeader {
    pub full: FullHeader,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
}

/// Leading `tkhd` fields; the rest stays in the unparsed tail.
#[derive(Debug, Clone, Serialize)]
pub struct TrackHeader {
    pub full: FullHeader,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    #[serde(skip)]
    pub reserved: u32,
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PixelInformation {
    pub full: FullHeader,
    pub bits_per_channel: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanAperture {
    pub width_n: i32,
    pub width_d: i32,
    pub height_n: i32,
    pub height_d: i32,
    pub horiz_off_n: i32,
    pub horiz_off_d: i32,
    pub vert_off_n: i32,
    pub vert_off_d: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuxiliaryType {
    pub full: FullHeader,
    pub aux_type: String,
    #[serde(serialize_with = "crate::json_api::as_hex")]
    pub aux_subtype: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataEntryUrl {
    pub full: FullHeader,
    #[serde(serialize_with = "crate::json_api::as_text")]
    pub location: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaData {
    /// In-memory payload for synthesized boxes; parsed boxes keep `None`
    /// and are copied from the source buffer.
    #[serde(skip)]
    pub payload: Option<Vec<u8>>,
}

/// Arena of boxes plus the source buffer they were parsed from.
///
/// Removing a box detaches it from its parent's child list; its slot stays
/// in the arena so every [`BoxId`] remains valid for the life of the tree.
#[derive(Debug, Clone, Default)]
pub struct BoxTree {
    nodes: Vec<BoxNode>,
    roots: Vec<BoxId>,
    source: Vec<u8>,
    pub(crate) links: Links,
    pub(crate) warnings: Vec<String>,
}

impl BoxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_source(source: Vec<u8>) -> Self {
        BoxTree { source, ..Self::default() }
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn roots(&self) -> &[BoxId] {
        &self.roots
    }

    pub fn node(&self, id: BoxId) -> &BoxNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: BoxId) -> &mut BoxNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: BoxId) -> Option<&BoxNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: BoxId) -> &[BoxId] {
        &self.nodes[id.0].children
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    /// Non-fatal problems found while parsing (non-strict mode).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn warn(&mut self, msg: String) {
        tracing::warn!("{msg}");
        self.warnings.push(msg);
    }

    /// Add a box at the end of `parent`'s children, or as a new root.
    pub fn push(&mut self, parent: Option<BoxId>, mut node: BoxNode) -> BoxId {
        let id = BoxId(self.nodes.len());
        node.parent = parent;
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Insert a box at `index` among `parent`'s children (or the roots).
    pub fn insert(&mut self, parent: Option<BoxId>, index: usize, mut node: BoxNode) -> BoxId {
        let id = BoxId(self.nodes.len());
        node.parent = parent;
        self.nodes.push(node);
        let list = match parent {
            Some(p) => &mut self.nodes[p.0].children,
            None => &mut self.roots,
        };
        list.insert(index.min(list.len()), id);
        id
    }

    /// Detach `id` from its parent (or the roots). Returns false if it was
    /// not attached.
    pub fn detach(&mut self, id: BoxId) -> bool {
        let list = match self.nodes[id.0].parent {
            Some(p) => &mut self.nodes[p.0].children,
            None => &mut self.roots,
        };
        let before = list.len();
        list.retain(|&c| c != id);
        before != list.len()
    }

    /// Pre-order walk over every attached box.
    pub fn walk(&self) -> Vec<BoxId> {
        let mut out = Vec::new();
        let mut stack: Vec<BoxId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Every attached box of the given type, in document order.
    pub fn find_all(&self, typ: FourCC) -> Vec<BoxId> {
        self.walk().into_iter().filter(|&id| self.node(id).typ == typ).collect()
    }

    pub fn find_first(&self, typ: FourCC) -> Option<BoxId> {
        self.walk().into_iter().find(|&id| self.node(id).typ == typ)
    }

    /// Depth of `id` below the roots (roots are depth 0).
    pub fn depth(&self, id: BoxId) -> usize {
        let mut d = 0;
        let mut cur = self.nodes[id.0].parent;
        while let Some(p) = cur {
            d += 1;
            cur = self.nodes[p.0].parent;
        }
        d
    }

    /// Source bytes of a parsed box's body.
    pub fn body_bytes(&self, id: BoxId) -> &[u8] {
        match &self.nodes[id.0].origin {
            Some(o) => self.source.get(o.data.clone()).unwrap_or(&[]),
            None => &[],
        }
    }

    /// Payload of an `mdat`, whether synthesized or parsed.
    pub fn media_bytes(&self, id: BoxId) -> &[u8] {
        match &self.nodes[id.0].body {
            BoxBody::MediaData(MediaData { payload: Some(p) }) => p,
            _ => self.body_bytes(id),
        }
    }
}
