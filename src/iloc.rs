//! `iloc` (item location) outside of `iref`.

use crate::bits::{BitReader, BitWriter};
use crate::boxes::{Extent, ItemLocation, ItemLocationEntry};
use crate::codec::{OffsetSink, OffsetSlot, count_u16, read_full, write_full};
use crate::error::{HeifError, Result};

pub(crate) fn parse(r: &mut BitReader) -> Result<ItemLocation> {
    let full = read_full(r)?;
    let offset_size = r.read_bits(4)? as u8;
    let length_size = r.read_bits(4)? as u8;
    let base_offset_size = r.read_bits(4)? as u8;
    let index_size = r.read_bits(4)? as u8;
    let wide = full.version >= 2;
    let count = if wide { r.read_u32()? } else { r.read_u16()? as u32 };

    let mut items = Vec::new();
    for _ in 0..count {
        let item_id = if wide { r.read_u32()? } else { r.read_u16()? as u32 };
        let construction_method = if full.version >= 1 { Some(r.read_u16()?) } else { None };
        let data_reference_index = r.read_u16()?;
        let base_offset = r.read_uint(base_offset_size)?;
        let extent_count = r.read_u16()?;
        let mut extents = Vec::with_capacity(extent_count as usize);
        for _ in 0..extent_count {
            let offset = r.read_uint(offset_size)?;
            let index = if full.version >= 1 { Some(r.read_uint(index_size)?) } else { None };
            let length = r.read_uint(length_size)?;
            extents.push(Extent { offset, index, length });
        }
        items.push(ItemLocationEntry {
            item_id,
            construction_method,
            data_reference_index,
            base_offset,
            extents,
        });
    }

    Ok(ItemLocation {
        full,
        offset_size,
        length_size,
        base_offset_size,
        index_size,
        items,
    })
}

/// Write the table. Offsets are written with their current values; every
/// base and extent offset field is reported to `on_offset` so the caller can
/// patch it once the referenced data has been placed.
pub(crate) fn build(w: &mut BitWriter, iloc: &ItemLocation, on_offset: &mut OffsetSink<'_>) -> Result<()> {
    write_full(w, iloc.full)?;
    w.put_bits(iloc.offset_size as u64, 4)?;
    w.put_bits(iloc.length_size as u64, 4)?;
    w.put_bits(iloc.base_offset_size as u64, 4)?;
    w.put_bits(iloc.index_size as u64, 4)?;
    let wide = iloc.full.version >= 2;
    if wide {
        w.put_u32(iloc.items.len() as u32)?;
    } else {
        w.put_u16(count_u16(iloc.items.len(), "iloc item")?)?;
    }

    for item in &iloc.items {
        if wide {
            w.put_u32(item.item_id)?;
        } else {
            let id = u16::try_from(item.item_id).map_err(|_| {
                HeifError::UnsupportedConstruction(format!(
                    "item ID {} in a version {} iloc",
                    item.item_id, iloc.full.version
                ))
            })?;
            w.put_u16(id)?;
        }
        if iloc.full.version >= 1 {
            w.put_u16(item.construction_method.unwrap_or(0))?;
        }
        w.put_u16(item.data_reference_index)?;
        on_offset(item.item_id, OffsetSlot::Base, w.tell(), iloc.base_offset_size);
        put_sized(w, item.base_offset, iloc.base_offset_size)?;
        w.put_u16(count_u16(item.extents.len(), "extent")?)?;
        for (i, e) in item.extents.iter().enumerate() {
            on_offset(item.item_id, OffsetSlot::Extent(i), w.tell(), iloc.offset_size);
            put_sized(w, e.offset, iloc.offset_size)?;
            if iloc.full.version >= 1 {
                put_sized(w, e.index.unwrap_or(0), iloc.index_size)?;
            }
            put_sized(w, e.length, iloc.length_size)?;
        }
    }
    Ok(())
}

fn put_sized(w: &mut BitWriter, value: u64, width: u8) -> Result<()> {
    if width > 8 || value > crate::bits::max_for_width(width) {
        return Err(HeifError::UnsupportedConstruction(format!(
            "iloc value {value} does not fit {width} bytes"
        )));
    }
    w.put_uint(value, width)
}
