//! Bridge between raw HEVC elementary streams and HEIF trees.

use crate::api::{HevcExtractOptions, ItemRole};
use crate::bits::BitReader;
use crate::boxes::*;
use crate::error::{HeifError, Result};
use crate::items::{ItemIndex, item_data};
use crate::relink::Anchor;
use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

pub const NAL_IDR_W_RADL: u8 = 19;
pub const NAL_IDR_N_LP: u8 = 20;
pub const NAL_VPS: u8 = 32;
pub const NAL_SPS: u8 = 33;
pub const NAL_PPS: u8 = 34;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// One NAL unit of an Annex-B stream, header included, start code excluded.
#[derive(Debug, Clone, Copy)]
pub struct NalUnit<'a> {
    pub nal_type: u8,
    pub data: &'a [u8],
}

/// Split an Annex-B stream on `00 00 01` / `00 00 00 01` start codes.
/// Units shorter than the 2-byte NAL header are skipped.
pub fn split_annexb(data: &[u8]) -> Vec<NalUnit<'_>> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push((i, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut nals = Vec::with_capacity(starts.len());
    for (n, &(_, payload_start)) in starts.iter().enumerate() {
        let mut end = starts.get(n + 1).map(|&(code, _)| code).unwrap_or(data.len());
        // a 4-byte start code leaves its leading zero on the previous unit
        while end > payload_start && data[end - 1] == 0 && n + 1 < starts.len() {
            end -= 1;
        }
        let unit = &data[payload_start..end];
        if unit.len() >= 2 {
            nals.push(NalUnit { nal_type: (unit[0] >> 1) & 0x3F, data: unit });
        }
    }
    nals
}

/// Strip emulation prevention bytes (`00 00 03` becomes `00 00`).
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &b in data {
        if zeros >= 2 && b == 3 {
            zeros = 0;
            continue;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        out.push(b);
    }
    out
}

/// Numeric fields taken from a sequence parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile_space: u8,
    pub tier_flag: bool,
    pub profile_idc: u8,
    pub profile_compatibility_flags: u32,
    pub constraint_indicator_flags: u64,
    pub level_idc: u8,
    pub chroma_format_idc: u8,
    pub width: u32,
    pub height: u32,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
}

/// Parse an SPS NAL unit (2-byte header included) far enough to get the
/// profile, picture size and bit depths.
pub fn parse_sps(nal: &[u8]) -> Result<SpsInfo> {
    if nal.len() < 2 {
        return Err(HeifError::Hevc("SPS shorter than its NAL header".to_string()));
    }
    let rbsp = remove_emulation_prevention(&nal[2..]);
    read_sps(&mut BitReader::new(&rbsp)).map_err(|e| match e {
        HeifError::EndOfData { bit } => HeifError::Hevc(format!("SPS truncated at bit {bit}")),
        other => other,
    })
}

fn read_sps(r: &mut BitReader) -> Result<SpsInfo> {
    let mut sps = SpsInfo::default();

    r.skip_bits(4)?; // sps_video_parameter_set_id
    let max_sub_layers_minus1 = r.read_bits(3)? as usize;
    r.skip_bits(1)?; // sps_temporal_id_nesting_flag

    // profile_tier_level(1, max_sub_layers_minus1)
    sps.profile_space = r.read_bits(2)? as u8;
    sps.tier_flag = r.read_bit()?;
    sps.profile_idc = r.read_bits(5)? as u8;
    sps.profile_compatibility_flags = r.read_u32()?;
    sps.constraint_indicator_flags = r.read_bits(48)?;
    sps.level_idc = r.read_u8()?;
    let mut sub_layer_flags = [(false, false); 8];
    for flags in sub_layer_flags.iter_mut().take(max_sub_layers_minus1) {
        *flags = (r.read_bit()?, r.read_bit()?);
    }
    if max_sub_layers_minus1 > 0 {
        r.skip_bits(2 * (8 - max_sub_layers_minus1 as u64))?;
    }
    for &(profile_present, level_present) in sub_layer_flags.iter().take(max_sub_layers_minus1) {
        if profile_present {
            r.skip_bits(88)?;
        }
        if level_present {
            r.skip_bits(8)?;
        }
    }

    r.read_ue()?; // sps_seq_parameter_set_id
    sps.chroma_format_idc = r.read_ue()? as u8;
    if sps.chroma_format_idc == 3 {
        r.skip_bits(1)?; // separate_colour_plane_flag
    }
    sps.width = r.read_ue()?;
    sps.height = r.read_ue()?;
    if r.read_bit()? {
        for _ in 0..4 {
            r.read_ue()?; // conformance window offsets
        }
    }
    sps.bit_depth_luma_minus8 = r.read_ue()? as u8;
    sps.bit_depth_chroma_minus8 = r.read_ue()? as u8;
    Ok(sps)
}

/// What a single-image HEVC stream contributes to a HEIF file.
#[derive(Debug, Clone)]
pub struct ParameterBundle {
    pub vps: Vec<u8>,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
    pub idr: Vec<u8>,
    pub sps_info: SpsInfo,
}

impl ParameterBundle {
    pub fn from_stream(bytes: &[u8]) -> Result<Self> {
        let nals = split_annexb(bytes);
        let first = |t: u8| nals.iter().find(|n| n.nal_type == t).map(|n| n.data.to_vec());
        let require = |t: u8, name: &str| {
            first(t).ok_or_else(|| HeifError::Hevc(format!("stream has no {name} (NAL type {t})")))
        };

        let idr = first(NAL_IDR_W_RADL)
            .or_else(|| first(NAL_IDR_N_LP))
            .ok_or_else(|| HeifError::Hevc("stream has neither IDR_W_RADL nor IDR_N_LP".to_string()))?;
        let vps = require(NAL_VPS, "VPS")?;
        let sps = require(NAL_SPS, "SPS")?;
        let pps = require(NAL_PPS, "PPS")?;
        let sps_info = parse_sps(&sps)?;
        debug!(nals = nals.len(), width = sps_info.width, height = sps_info.height, "hevc stream");
        Ok(Self { vps, sps, pps, idr, sps_info })
    }

    /// `mdat` payload: the IDR unit behind a 4-byte length.
    pub fn media_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.idr.len() + 4);
        out.extend_from_slice(&(self.idr.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.idr);
        out
    }

    pub fn hevc_config(&self) -> HevcConfig {
        let s = &self.sps_info;
        let array = |nal_unit_type: u8, nalu: &[u8]| NalArray {
            array_completeness: true,
            reserved: false,
            nal_unit_type,
            nalus: vec![nalu.to_vec()],
        };
        HevcConfig {
            version: 1,
            profile_space: s.profile_space,
            tier_flag: s.tier_flag,
            profile_idc: s.profile_idc,
            profile_compatibility_flags: s.profile_compatibility_flags,
            constraint_indicator_flags: s.constraint_indicator_flags,
            level_idc: s.level_idc,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 3,
            chroma_format: s.chroma_format_idc,
            bit_depth_luma_minus8: s.bit_depth_luma_minus8,
            bit_depth_chroma_minus8: s.bit_depth_chroma_minus8,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 1,
            temporal_id_nested: true,
            length_size_minus_one: 3,
            nal_arrays: vec![
                array(NAL_VPS, &self.vps),
                array(NAL_SPS, &self.sps),
                array(NAL_PPS, &self.pps),
            ],
            reserved: HVCC_RESERVED,
        }
    }
}

const ITEM_ID: u32 = 1;

fn leaf(tree: &mut BoxTree, parent: BoxId, typ: &[u8; 4], body: BoxBody) -> BoxId {
    tree.push(Some(parent), BoxNode::synthesized(FourCC(*typ), body))
}

/// Wrap a single coded image into `ftyp`, `mdat` and `meta`.
pub fn from_hevc(bytes: &[u8]) -> Result<BoxTree> {
    let bundle = ParameterBundle::from_stream(bytes)?;
    let payload = bundle.media_payload();
    let payload_len = payload.len() as u64;
    let full = FullHeader::default();

    let mut tree = BoxTree::new();
    tree.push(
        None,
        BoxNode::synthesized(
            FourCC(*b"ftyp"),
            BoxBody::FileType(FileType {
                major: FourCC(*b"mif1"),
                minor: 0,
                compatible: vec![FourCC(*b"mif1"), FourCC(*b"heic")],
            }),
        ),
    );
    let mdat = tree.push(
        None,
        BoxNode::synthesized(FourCC(*b"mdat"), BoxBody::MediaData(MediaData { payload: Some(payload) })),
    );
    let meta = tree.push(None, BoxNode::synthesized(FourCC(*b"meta"), BoxBody::Container(ContainerHeader::Full(full))));

    leaf(
        &mut tree,
        meta,
        b"hdlr",
        BoxBody::Handler(Handler {
            full,
            component_type: FourCC([0; 4]),
            component_subtype: FourCC(*b"pict"),
            component_manufacturer: FourCC([0; 4]),
            component_flags: 0,
            component_flags_mask: 0,
            name: b"heifbox pict Handler\0".to_vec(),
        }),
    );
    leaf(&mut tree, meta, b"pitm", BoxBody::PrimaryItem(PrimaryItem { full, item_id: ITEM_ID }));
    let iloc = leaf(
        &mut tree,
        meta,
        b"iloc",
        BoxBody::ItemLocation(ItemLocation {
            full,
            offset_size: 0,
            length_size: 4,
            base_offset_size: 4,
            index_size: 0,
            items: vec![ItemLocationEntry {
                item_id: ITEM_ID,
                construction_method: None,
                data_reference_index: 0,
                base_offset: 0,
                extents: vec![Extent { offset: 0, index: None, length: payload_len }],
            }],
        }),
    );
    let iinf = leaf(
        &mut tree,
        meta,
        b"iinf",
        BoxBody::Container(ContainerHeader::Counted { full, count_bytes: 2, declared: 1 }),
    );
    leaf(
        &mut tree,
        iinf,
        b"infe",
        BoxBody::ItemInfoEntry(ItemInfoEntry {
            full: FullHeader { version: 2, flags: 0 },
            item_id: ITEM_ID,
            protection_index: 0,
            item_type: Some(FourCC(*b"hvc1")),
            item_name: "Image".to_string(),
            content_type: None,
            content_encoding: None,
        }),
    );
    let iprp = leaf(&mut tree, meta, b"iprp", BoxBody::Container(ContainerHeader::None));
    let ipco = leaf(&mut tree, iprp, b"ipco", BoxBody::Container(ContainerHeader::None));
    leaf(
        &mut tree,
        ipco,
        b"ispe",
        BoxBody::SpatialExtents(SpatialExtents {
            full,
            width: bundle.sps_info.width,
            height: bundle.sps_info.height,
        }),
    );
    leaf(&mut tree, ipco, b"pasp", BoxBody::PixelAspectRatio(PixelAspectRatio { hspace: 1, vspace: 1 }));
    leaf(&mut tree, ipco, b"hvcC", BoxBody::HevcConfig(bundle.hevc_config()));
    let association = |property_index: u16, essential: bool| Association { essential, property_index };
    leaf(
        &mut tree,
        iprp,
        b"ipma",
        BoxBody::PropertyAssociation(PropertyAssociation {
            full,
            entries: vec![AssociationEntry {
                item_id: ITEM_ID,
                associations: vec![association(1, false), association(2, false), association(3, true)],
            }],
        }),
    );

    // the item's data starts right after the 8-byte mdat header
    tree.links.link(iloc, ITEM_ID, mdat, Anchor::Base { relative: 8 });
    Ok(tree)
}

fn resolve_item(tree: &BoxTree, index: &ItemIndex, opts: &HevcExtractOptions) -> Result<u32> {
    if let Some(id) = opts.item_id {
        return Ok(id);
    }
    match opts.role.unwrap_or(ItemRole::Primary) {
        ItemRole::Primary => index
            .primary
            .ok_or_else(|| HeifError::UnresolvedReference("no pitm box names a primary item".to_string())),
        ItemRole::Thumbnail => {
            let thumbs: Vec<u32> = index
                .references
                .iter()
                .filter(|&&id| tree.node(id).typ == b"thmb")
                .filter_map(|&id| match &tree.node(id).body {
                    BoxBody::ItemReference(r) => Some(r.from_item_id),
                    _ => None,
                })
                .collect();
            match thumbs.as_slice() {
                [only] => Ok(*only),
                other => Err(HeifError::UnresolvedReference(format!(
                    "expected exactly one thmb reference, found {}",
                    other.len()
                ))),
            }
        }
        ItemRole::Auxiliary => {
            let urn = opts
                .urn
                .as_deref()
                .ok_or_else(|| HeifError::InvalidParameter("the auxiliary role needs a urn".to_string()))?;
            index
                .associations
                .keys()
                .copied()
                .find(|&item_id| {
                    index.property_boxes_for_item(item_id).iter().any(|&p| {
                        matches!(&tree.node(p).body, BoxBody::AuxiliaryType(a) if a.aux_type == urn)
                    })
                })
                .ok_or_else(|| HeifError::UnresolvedReference(format!("no item has auxiliary type '{urn}'")))
        }
    }
}

/// Re-emit an item as Annex-B: every parameter set from its `hvcC`, then
/// each length-prefixed unit of its data. A truncated trailing unit ends the
/// stream without error.
pub fn to_hevc(tree: &BoxTree, opts: &HevcExtractOptions) -> Result<Vec<u8>> {
    let index = ItemIndex::new(tree);
    let item_id = resolve_item(tree, &index, opts)?;
    let config = index
        .property_boxes_for_item(item_id)
        .into_iter()
        .find_map(|p| match &tree.node(p).body {
            BoxBody::HevcConfig(c) => Some(c),
            _ => None,
        })
        .ok_or_else(|| HeifError::Hevc(format!("item {item_id} has no hvcC property")))?;
    let data = item_data(tree, &index, item_id)?;
    debug!(item_id, bytes = data.len(), "extracting item");

    let mut out = Vec::new();
    for nalu in config.nal_arrays.iter().flat_map(|a| a.nalus.iter()) {
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(nalu);
    }

    let len_size = config.length_size_minus_one as usize + 1;
    let mut pos = 0;
    while pos + len_size <= data.len() {
        let len = BigEndian::read_uint(&data[pos..pos + len_size], len_size) as usize;
        pos += len_size;
        if len > data.len() - pos {
            break;
        }
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(&data[pos..pos + len]);
        pos += len;
    }
    Ok(out)
}
