//! Field layouts of the leaf boxes.
//!
//! Each parser reads from a cursor positioned at the start of the box body
//! and leaves it wherever the layout ends; the caller keeps whatever follows
//! as the unparsed tail. Builders write the body only, never the header.

use crate::bits::{BitReader, BitWriter};
use crate::boxes::*;
use crate::error::{HeifError, Result};
use crate::registry::Codec;
use crate::{hvcc, iloc};

/// Per-box state handed to a leaf parser.
pub(crate) struct LeafContext {
    pub typ: FourCC,
    /// Absolute offset of the first body byte.
    pub body_offset: u64,
    pub strict: bool,
    /// Item ID width for reference lists (2, or 4 under `iref` version >= 1).
    pub id_width: u8,
    pub warnings: Vec<String>,
}

impl LeafContext {
    /// Check a reserved bit group. `at` is the byte position in the body.
    pub fn reserved(&mut self, found: u64, expected: u64, at: usize) -> Result<()> {
        if found == expected {
            return Ok(());
        }
        let offset = self.body_offset + at as u64;
        if self.strict {
            return Err(HeifError::ReservedBitMismatch {
                typ: self.typ,
                offset,
                found,
                expected,
            });
        }
        self.warnings.push(format!(
            "'{}' at {offset}: reserved bits {found:#x}, expected {expected:#x}",
            self.typ
        ));
        Ok(())
    }
}

pub(crate) fn read_full(r: &mut BitReader) -> Result<FullHeader> {
    Ok(FullHeader {
        version: r.read_u8()?,
        flags: r.read_u24()?,
    })
}

pub(crate) fn write_full(w: &mut BitWriter, full: FullHeader) -> Result<()> {
    w.put_u8(full.version)?;
    w.put_u24(full.flags)
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn optional_cstring(r: &mut BitReader) -> Result<Option<String>> {
    if r.remaining_bytes() == 0 {
        return Ok(None);
    }
    Ok(Some(text(r.read_cstring()?)))
}

fn put_cstring(w: &mut BitWriter, s: &str) -> Result<()> {
    w.put_bytes(s.as_bytes())?;
    w.put_u8(0)
}

/// Parse the body of a leaf box. Containers, `mdat` and opaque boxes never
/// reach this function.
pub(crate) fn parse_leaf(codec: Codec, r: &mut BitReader, ctx: &mut LeafContext) -> Result<BoxBody> {
    let body = match codec {
        Codec::FileType => {
            let major = r.read_fourcc()?;
            let minor = r.read_u32()?;
            let mut compatible = Vec::new();
            while r.has_bytes(4) {
                compatible.push(r.read_fourcc()?);
            }
            BoxBody::FileType(FileType { major, minor, compatible })
        }
        Codec::Handler => BoxBody::Handler(Handler {
            full: read_full(r)?,
            component_type: r.read_fourcc()?,
            component_subtype: r.read_fourcc()?,
            component_manufacturer: r.read_fourcc()?,
            component_flags: r.read_u32()?,
            component_flags_mask: r.read_u32()?,
            name: r.read_rest()?.to_vec(),
        }),
        Codec::SpatialExtents => BoxBody::SpatialExtents(SpatialExtents {
            full: read_full(r)?,
            width: r.read_u32()?,
            height: r.read_u32()?,
        }),
        Codec::PixelAspectRatio => BoxBody::PixelAspectRatio(PixelAspectRatio {
            hspace: r.read_u32()?,
            vspace: r.read_u32()?,
        }),
        Codec::PrimaryItem => {
            let full = read_full(r)?;
            let item_id = if full.version == 0 { r.read_u16()? as u32 } else { r.read_u32()? };
            BoxBody::PrimaryItem(PrimaryItem { full, item_id })
        }
        Codec::HevcConfig => BoxBody::HevcConfig(hvcc::parse(r, ctx)?),
        Codec::ItemLocation => BoxBody::ItemLocation(iloc::parse(r)?),
        Codec::ItemReference => {
            let width = ctx.id_width;
            let from_item_id = r.read_uint(width)? as u32;
            let count = r.read_u16()?;
            let to_item_ids = (0..count)
                .map(|_| r.read_uint(width).map(|v| v as u32))
                .collect::<Result<Vec<_>>>()?;
            BoxBody::ItemReference(ItemReference { id_width: width, from_item_id, to_item_ids })
        }
        Codec::PropertyAssociation => {
            let full = read_full(r)?;
            let wide = full.flags & 1 != 0;
            let entry_count = r.read_u32()?;
            let mut entries = Vec::new();
            for _ in 0..entry_count {
                let item_id = if full.version < 1 { r.read_u16()? as u32 } else { r.read_u32()? };
                let n = r.read_u8()?;
                let mut associations = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let essential = r.read_bit()?;
                    let property_index = r.read_bits(if wide { 15 } else { 7 })? as u16;
                    associations.push(Association { essential, property_index });
                }
                entries.push(AssociationEntry { item_id, associations });
            }
            BoxBody::PropertyAssociation(PropertyAssociation { full, entries })
        }
        Codec::ItemInfoEntry => {
            let full = read_full(r)?;
            let item_id = if full.version >= 3 { r.read_u32()? } else { r.read_u16()? as u32 };
            let protection_index = r.read_u16()?;
            let item_type = if full.version >= 2 { Some(r.read_fourcc()?) } else { None };
            let item_name = text(r.read_cstring()?);
            let content_type = optional_cstring(r)?;
            let content_encoding = optional_cstring(r)?;
            BoxBody::ItemInfoEntry(ItemInfoEntry {
                full,
                item_id,
                protection_index,
                item_type,
                item_name,
                content_type,
                content_encoding,
            })
        }
        Codec::ColourInformation => BoxBody::ColourInformation(ColourInformation {
            colour_type: r.read_fourcc()?,
            data: r.read_rest()?.to_vec(),
        }),
        Codec::PixelInformation => {
            let full = read_full(r)?;
            let channels = r.read_u8()?;
            let bits_per_channel = r.read_bytes(channels as usize)?.to_vec();
            BoxBody::PixelInformation(PixelInformation { full, bits_per_channel })
        }
        Codec::CleanAperture => BoxBody::CleanAperture(CleanAperture {
            width_n: r.read_i32()?,
            width_d: r.read_i32()?,
            height_n: r.read_i32()?,
            height_d: r.read_i32()?,
            horiz_off_n: r.read_i32()?,
            horiz_off_d: r.read_i32()?,
            vert_off_n: r.read_i32()?,
            vert_off_d: r.read_i32()?,
        }),
        Codec::AuxiliaryType => BoxBody::AuxiliaryType(AuxiliaryType {
            full: read_full(r)?,
            aux_type: text(r.read_cstring()?),
            aux_subtype: r.read_rest()?.to_vec(),
        }),
        Codec::DataEntryUrl => BoxBody::DataEntryUrl(DataEntryUrl {
            full: read_full(r)?,
            location: r.read_rest()?.to_vec(),
        }),
        Codec::MovieHeader => {
            let full = read_full(r)?;
            let width = time_width(full);
            BoxBody::MovieHeader(MovieHeader {
                full,
                creation_time: r.read_uint(width)?,
                modification_time: r.read_uint(width)?,
                timescale: r.read_u32()?,
                duration: r.read_uint(width)?,
            })
        }
        Codec::TrackHeader => {
            let full = read_full(r)?;
            let width = time_width(full);
            BoxBody::TrackHeader(TrackHeader {
                full,
                creation_time: r.read_uint(width)?,
                modification_time: r.read_uint(width)?,
                track_id: r.read_u32()?,
                reserved: r.read_u32()?,
                duration: r.read_uint(width)?,
            })
        }
        Codec::MediaData => BoxBody::MediaData(MediaData::default()),
        Codec::Opaque => BoxBody::Opaque,
        Codec::Container(_) => {
            return Err(HeifError::UnsupportedConstruction(format!(
                "'{}' is a container, not a leaf",
                ctx.typ
            )));
        }
    };
    Ok(body)
}

/// Which offset field of an `iloc` entry is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OffsetSlot {
    Base,
    Extent(usize),
}

/// Called for each offset field as it is written: item ID, slot, absolute
/// position of the field in the output and its width in bytes.
pub(crate) type OffsetSink<'a> = dyn FnMut(u32, OffsetSlot, usize, u8) + 'a;

/// Emit the body of a typed leaf. `mdat`, opaque boxes and containers are
/// written by the builder itself.
pub(crate) fn build_leaf(body: &BoxBody, w: &mut BitWriter, on_offset: &mut OffsetSink<'_>) -> Result<()> {
    match body {
        BoxBody::FileType(b) => {
            w.put_bytes(&b.major.0)?;
            w.put_u32(b.minor)?;
            for c in &b.compatible {
                w.put_bytes(&c.0)?;
            }
        }
        BoxBody::Handler(b) => {
            write_full(w, b.full)?;
            w.put_bytes(&b.component_type.0)?;
            w.put_bytes(&b.component_subtype.0)?;
            w.put_bytes(&b.component_manufacturer.0)?;
            w.put_u32(b.component_flags)?;
            w.put_u32(b.component_flags_mask)?;
            w.put_bytes(&b.name)?;
        }
        BoxBody::SpatialExtents(b) => {
            write_full(w, b.full)?;
            w.put_u32(b.width)?;
            w.put_u32(b.height)?;
        }
        BoxBody::PixelAspectRatio(b) => {
            w.put_u32(b.hspace)?;
            w.put_u32(b.vspace)?;
        }
        BoxBody::PrimaryItem(b) => {
            write_full(w, b.full)?;
            if b.full.version == 0 {
                w.put_u16(narrow_id(b.item_id, 2)? as u16)?;
            } else {
                w.put_u32(b.item_id)?;
            }
        }
        BoxBody::HevcConfig(b) => hvcc::build(w, b)?,
        BoxBody::ItemLocation(b) => iloc::build(w, b, on_offset)?,
        BoxBody::ItemReference(b) => {
            w.put_uint(narrow_id(b.from_item_id, b.id_width)?, b.id_width)?;
            w.put_u16(count_u16(b.to_item_ids.len(), "item reference")?)?;
            for &id in &b.to_item_ids {
                w.put_uint(narrow_id(id, b.id_width)?, b.id_width)?;
            }
        }
        BoxBody::PropertyAssociation(b) => {
            write_full(w, b.full)?;
            let wide = b.wide_indices();
            w.put_u32(b.entries.len() as u32)?;
            for e in &b.entries {
                if b.full.version < 1 {
                    w.put_u16(narrow_id(e.item_id, 2)? as u16)?;
                } else {
                    w.put_u32(e.item_id)?;
                }
                let n = e.associations.len();
                if n > u8::MAX as usize {
                    return Err(HeifError::UnsupportedConstruction(format!(
                        "{n} associations for item {}",
                        e.item_id
                    )));
                }
                w.put_u8(n as u8)?;
                for a in &e.associations {
                    let bits = if wide { 15 } else { 7 };
                    if a.property_index as u64 >= 1 << bits {
                        return Err(HeifError::UnsupportedConstruction(format!(
                            "property index {} needs 15-bit ipma entries",
                            a.property_index
                        )));
                    }
                    w.put_bit(a.essential)?;
                    w.put_bits(a.property_index as u64, bits)?;
                }
            }
        }
        BoxBody::ItemInfoEntry(b) => {
            write_full(w, b.full)?;
            if b.full.version >= 3 {
                w.put_u32(b.item_id)?;
            } else {
                w.put_u16(narrow_id(b.item_id, 2)? as u16)?;
            }
            w.put_u16(b.protection_index)?;
            if b.full.version >= 2 {
                w.put_bytes(&b.item_type.unwrap_or_default().0)?;
            }
            put_cstring(w, &b.item_name)?;
            if let Some(ct) = &b.content_type {
                put_cstring(w, ct)?;
            }
            if let Some(ce) = &b.content_encoding {
                put_cstring(w, ce)?;
            }
        }
        BoxBody::ColourInformation(b) => {
            w.put_bytes(&b.colour_type.0)?;
            w.put_bytes(&b.data)?;
        }
        BoxBody::PixelInformation(b) => {
            write_full(w, b.full)?;
            w.put_u8(count_u8(b.bits_per_channel.len(), "channel")?)?;
            w.put_bytes(&b.bits_per_channel)?;
        }
        BoxBody::CleanAperture(b) => {
            for v in [
                b.width_n,
                b.width_d,
                b.height_n,
                b.height_d,
                b.horiz_off_n,
                b.horiz_off_d,
                b.vert_off_n,
                b.vert_off_d,
            ] {
                w.put_i32(v)?;
            }
        }
        BoxBody::AuxiliaryType(b) => {
            write_full(w, b.full)?;
            put_cstring(w, &b.aux_type)?;
            w.put_bytes(&b.aux_subtype)?;
        }
        BoxBody::DataEntryUrl(b) => {
            write_full(w, b.full)?;
            w.put_bytes(&b.location)?;
        }
        BoxBody::MovieHeader(b) => {
            write_full(w, b.full)?;
            let width = time_width(b.full);
            put_time(w, b.creation_time, width)?;
            put_time(w, b.modification_time, width)?;
            w.put_u32(b.timescale)?;
            put_time(w, b.duration, width)?;
        }
        BoxBody::TrackHeader(b) => {
            write_full(w, b.full)?;
            let width = time_width(b.full);
            put_time(w, b.creation_time, width)?;
            put_time(w, b.modification_time, width)?;
            w.put_u32(b.track_id)?;
            w.put_u32(b.reserved)?;
            put_time(w, b.duration, width)?;
        }
        BoxBody::Container(_) | BoxBody::MediaData(_) | BoxBody::Opaque => {}
    }
    Ok(())
}

/// Times and durations in `mvhd`/`tkhd` are 64-bit from version 1 on.
fn time_width(full: FullHeader) -> u8 {
    if full.version >= 1 { 8 } else { 4 }
}

fn put_time(w: &mut BitWriter, v: u64, width: u8) -> Result<()> {
    if v > crate::bits::max_for_width(width) {
        return Err(HeifError::UnsupportedConstruction(format!("time value {v} does not fit {width} bytes")));
    }
    w.put_uint(v, width)
}

fn narrow_id(id: u32, width: u8) -> Result<u64> {
    let id = id as u64;
    if id > crate::bits::max_for_width(width) {
        return Err(HeifError::UnsupportedConstruction(format!(
            "item ID {id} does not fit {width} bytes"
        )));
    }
    Ok(id)
}

pub(crate) fn count_u8(n: usize, what: &str) -> Result<u8> {
    u8::try_from(n).map_err(|_| HeifError::UnsupportedConstruction(format!("{n} {what} entries exceed 8 bits")))
}

pub(crate) fn count_u16(n: usize, what: &str) -> Result<u16> {
    u16::try_from(n)
        .map_err(|_| HeifError::UnsupportedConstruction(format!("{n} {what} entries exceed 16 bits")))
}
