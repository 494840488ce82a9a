//! `hvcC` (HEVC decoder configuration record).

use crate::bits::{BitReader, BitWriter};
use crate::boxes::{HVCC_RESERVED, HevcConfig, NalArray};
use crate::codec::{LeafContext, count_u8, count_u16};
use crate::error::Result;

const RESERVED_WIDTHS: [u32; 5] = [4, 6, 6, 5, 5];

fn read_reserved(r: &mut BitReader, ctx: &mut LeafContext, i: usize, out: &mut [u8; 5]) -> Result<()> {
    let at = r.tell();
    let v = r.read_bits(RESERVED_WIDTHS[i])?;
    ctx.reserved(v, HVCC_RESERVED[i] as u64, at)?;
    out[i] = v as u8;
    Ok(())
}

pub(crate) fn parse(r: &mut BitReader, ctx: &mut LeafContext) -> Result<HevcConfig> {
    let mut reserved = [0u8; 5];

    let version = r.read_u8()?;
    let profile_space = r.read_bits(2)? as u8;
    let tier_flag = r.read_bit()?;
    let profile_idc = r.read_bits(5)? as u8;
    let profile_compatibility_flags = r.read_u32()?;
    let constraint_indicator_flags = r.read_bits(48)?;
    let level_idc = r.read_u8()?;
    read_reserved(r, ctx, 0, &mut reserved)?;
    let min_spatial_segmentation_idc = r.read_bits(12)? as u16;
    read_reserved(r, ctx, 1, &mut reserved)?;
    let parallelism_type = r.read_bits(2)? as u8;
    read_reserved(r, ctx, 2, &mut reserved)?;
    let chroma_format = r.read_bits(2)? as u8;
    read_reserved(r, ctx, 3, &mut reserved)?;
    let bit_depth_luma_minus8 = r.read_bits(3)? as u8;
    read_reserved(r, ctx, 4, &mut reserved)?;
    let bit_depth_chroma_minus8 = r.read_bits(3)? as u8;
    let avg_frame_rate = r.read_u16()?;
    let constant_frame_rate = r.read_bits(2)? as u8;
    let num_temporal_layers = r.read_bits(3)? as u8;
    let temporal_id_nested = r.read_bit()?;
    let length_size_minus_one = r.read_bits(2)? as u8;

    let num_arrays = r.read_u8()?;
    let mut nal_arrays = Vec::with_capacity(num_arrays as usize);
    for _ in 0..num_arrays {
        let array_completeness = r.read_bit()?;
        let at = r.tell();
        let reserved_bit = r.read_bit()?;
        ctx.reserved(reserved_bit as u64, 0, at)?;
        let nal_unit_type = r.read_bits(6)? as u8;
        let num_nalus = r.read_u16()?;
        let mut nalus = Vec::with_capacity(num_nalus as usize);
        for _ in 0..num_nalus {
            let len = r.read_u16()?;
            nalus.push(r.read_bytes(len as usize)?.to_vec());
        }
        nal_arrays.push(NalArray {
            array_completeness,
            reserved: reserved_bit,
            nal_unit_type,
            nalus,
        });
    }

    Ok(HevcConfig {
        version,
        profile_space,
        tier_flag,
        profile_idc,
        profile_compatibility_flags,
        constraint_indicator_flags,
        level_idc,
        min_spatial_segmentation_idc,
        parallelism_type,
        chroma_format,
        bit_depth_luma_minus8,
        bit_depth_chroma_minus8,
        avg_frame_rate,
        constant_frame_rate,
        num_temporal_layers,
        temporal_id_nested,
        length_size_minus_one,
        nal_arrays,
        reserved,
    })
}

pub(crate) fn build(w: &mut BitWriter, c: &HevcConfig) -> Result<()> {
    let reserved = |i: usize| c.reserved[i] as u64;

    w.put_u8(c.version)?;
    w.put_bits(c.profile_space as u64, 2)?;
    w.put_bit(c.tier_flag)?;
    w.put_bits(c.profile_idc as u64, 5)?;
    w.put_u32(c.profile_compatibility_flags)?;
    w.put_bits(c.constraint_indicator_flags, 48)?;
    w.put_u8(c.level_idc)?;
    w.put_bits(reserved(0), 4)?;
    w.put_bits(c.min_spatial_segmentation_idc as u64, 12)?;
    w.put_bits(reserved(1), 6)?;
    w.put_bits(c.parallelism_type as u64, 2)?;
    w.put_bits(reserved(2), 6)?;
    w.put_bits(c.chroma_format as u64, 2)?;
    w.put_bits(reserved(3), 5)?;
    w.put_bits(c.bit_depth_luma_minus8 as u64, 3)?;
    w.put_bits(reserved(4), 5)?;
    w.put_bits(c.bit_depth_chroma_minus8 as u64, 3)?;
    w.put_u16(c.avg_frame_rate)?;
    w.put_bits(c.constant_frame_rate as u64, 2)?;
    w.put_bits(c.num_temporal_layers as u64, 3)?;
    w.put_bit(c.temporal_id_nested)?;
    w.put_bits(c.length_size_minus_one as u64, 2)?;

    w.put_u8(count_u8(c.nal_arrays.len(), "NAL array")?)?;
    for a in &c.nal_arrays {
        w.put_bit(a.array_completeness)?;
        w.put_bit(a.reserved)?;
        w.put_bits(a.nal_unit_type as u64, 6)?;
        w.put_u16(count_u16(a.nalus.len(), "NAL unit")?)?;
        for nalu in &a.nalus {
            w.put_u16(count_u16(nalu.len(), "NAL payload byte")?)?;
            w.put_bytes(nalu)?;
        }
    }
    Ok(())
}
