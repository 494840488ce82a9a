mod common;

use common::*;
use heifbox::boxes::{BoxBody, BoxNode, FourCC, FullHeader, PixelAspectRatio, PixelInformation};
use heifbox::items::{ItemIndex, item_data};
use heifbox::{BuildOptions, ErrorKind, ParseOptions, build, parse, remove_boxes_by_type};

fn rebuild(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let tree = parse(bytes, &ParseOptions::default())?;
    Ok(build(&tree, &BuildOptions::default())?)
}

fn item_bytes(bytes: &[u8]) -> anyhow::Result<Vec<Vec<u8>>> {
    let tree = parse(bytes, &ParseOptions::default())?;
    let index = ItemIndex::new(&tree);
    Ok([1, 2, 3]
        .into_iter()
        .map(|id| item_data(&tree, &index, id))
        .collect::<heifbox::Result<Vec<_>>>()?)
}

fn iloc_offsets(bytes: &[u8]) -> anyhow::Result<Vec<(u64, u64)>> {
    let tree = parse(bytes, &ParseOptions::default())?;
    let iloc = tree.find_first(FourCC(*b"iloc")).expect("iloc");
    match &tree.node(iloc).body {
        BoxBody::ItemLocation(l) => Ok(l.items.iter().map(|e| (e.base_offset, e.extents[0].offset)).collect()),
        other => panic!("unexpected iloc body {other:?}"),
    }
}

#[test]
fn unmodified_tree_rebuilds_byte_for_byte() -> anyhow::Result<()> {
    let original = sample_heic();
    assert_eq!(rebuild(&original)?, original);
    Ok(())
}

#[test]
fn unparsed_tail_is_kept() -> anyhow::Result<()> {
    // pasp with four extra bytes after hSpacing/vSpacing
    let data = bx(b"pasp", &[0, 0, 0, 1, 0, 0, 0, 1, 0xDE, 0xAD, 0xBE, 0xEF]);
    let tree = parse(&data, &ParseOptions::default())?;
    let origin = tree.node(tree.roots()[0]).origin().expect("parsed box has an origin");
    assert_eq!(origin.unparsed.len(), 4);
    assert_eq!(build(&tree, &BuildOptions::default())?, data);
    Ok(())
}

#[test]
fn short_leaf_rebuilds_verbatim() -> anyhow::Result<()> {
    let data = bx(b"ispe", &[0, 0, 0, 0, 0, 0, 1, 0]);
    assert_eq!(rebuild(&data)?, data);
    Ok(())
}

#[test]
fn removing_free_moves_mdat_and_patches_iloc() -> anyhow::Result<()> {
    let original = sample_heic();
    let mut tree = parse(&original, &ParseOptions::default())?;
    assert_eq!(remove_boxes_by_type(&mut tree, &[FourCC(*b"free")]), 1);
    let out = build(&tree, &BuildOptions::default())?;

    assert_eq!(out.len(), original.len() - 16);
    let before = iloc_offsets(&original)?;
    let after = iloc_offsets(&out)?;
    assert_eq!(after[0], (before[0].0 - 16, 0));
    assert_eq!(after[1], (before[1].0 - 16, 8));
    assert_eq!(after[2], (0, before[2].1 - 16));
    assert_eq!(item_bytes(&out)?, item_bytes(&original)?);
    Ok(())
}

#[test]
fn inserting_a_box_before_mdat_patches_iloc() -> anyhow::Result<()> {
    let original = sample_heic();
    let mut tree = parse(&original, &ParseOptions::default())?;
    let pasp = BoxNode::synthesized(
        FourCC(*b"pasp"),
        BoxBody::PixelAspectRatio(PixelAspectRatio { hspace: 4, vspace: 3 }),
    );
    tree.insert(None, 1, pasp);
    let out = build(&tree, &BuildOptions::default())?;

    assert_eq!(out.len(), original.len() + 16);
    let before = iloc_offsets(&original)?;
    let after = iloc_offsets(&out)?;
    assert_eq!(after[0].0, before[0].0 + 16);
    assert_eq!(after[2].1, before[2].1 + 16);
    assert_eq!(item_bytes(&out)?, item_bytes(&original)?);
    Ok(())
}

#[test]
fn removal_is_idempotent() -> anyhow::Result<()> {
    let mut tree = parse(&sample_heic(), &ParseOptions::default())?;
    let types = [FourCC(*b"zzzz"), FourCC(*b"free")];
    assert_eq!(remove_boxes_by_type(&mut tree, &types), 2);
    let once = build(&tree, &BuildOptions::default())?;
    assert_eq!(remove_boxes_by_type(&mut tree, &types), 0);
    assert_eq!(build(&tree, &BuildOptions::default())?, once);
    Ok(())
}

#[test]
fn removing_nested_boxes_shrinks_their_parents() -> anyhow::Result<()> {
    let original = sample_heic();
    let mut tree = parse(&original, &ParseOptions::default())?;
    let meta = tree.find_first(FourCC(*b"meta")).expect("meta");
    let meta_len = tree.node(meta).length.expect("parsed meta has a length");
    assert_eq!(remove_boxes_by_type(&mut tree, &[FourCC(*b"auxl")]), 1);
    let out = build(&tree, &BuildOptions::default())?;

    let reparsed = parse(&out, &ParseOptions::default())?;
    let iref = reparsed.find_first(FourCC(*b"iref")).expect("iref");
    assert_eq!(reparsed.children(iref).len(), 1);
    let meta = reparsed.find_first(FourCC(*b"meta")).expect("meta");
    // auxl is 8 header bytes plus a 6-byte body
    assert_eq!(reparsed.node(meta).length, Some(meta_len - 14));
    assert_eq!(item_bytes(&out)?, item_bytes(&original)?);
    Ok(())
}

#[test]
fn building_without_the_linked_mdat_fails() -> anyhow::Result<()> {
    let mut tree = parse(&sample_heic(), &ParseOptions::default())?;
    remove_boxes_by_type(&mut tree, &[FourCC(*b"mdat")]);
    let err = build(&tree, &BuildOptions::default()).expect_err("dangling iloc offsets");
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    Ok(())
}

#[test]
fn leaf_with_children_is_rejected() -> anyhow::Result<()> {
    let mut tree = parse(&bx(b"pasp", &[0, 0, 0, 1, 0, 0, 0, 1]), &ParseOptions::default())?;
    let pasp = tree.roots()[0];
    tree.push(Some(pasp), BoxNode::synthesized(FourCC(*b"free"), BoxBody::Opaque));
    let err = build(&tree, &BuildOptions::default()).expect_err("pasp cannot hold children");
    assert_eq!(err.kind(), ErrorKind::UnsupportedConstruction);
    Ok(())
}

/// `iloc` version 1 with 4-byte extent indices; the single extent points at
/// the payload of the `mdat` that follows a 16-byte `free`.
fn indexed_iloc_file(payload: &[u8]) -> Vec<u8> {
    let mdat_body = (24 + 48 + 16 + 8) as u32;
    let mut iloc = vec![0x44, 0x04];
    iloc.extend_from_slice(&1u16.to_be_bytes());
    iloc.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 1]);
    iloc.extend_from_slice(&mdat_body.to_be_bytes());
    iloc.extend_from_slice(&7u32.to_be_bytes());
    iloc.extend_from_slice(&(payload.len() as u32).to_be_bytes());

    let mut data = ftyp();
    data.extend_from_slice(&full_bx(b"meta", 0, 0, &full_bx(b"iloc", 1, 0, &iloc)));
    data.extend_from_slice(&bx(b"free", &[0; 8]));
    data.extend_from_slice(&bx(b"mdat", payload));
    data
}

#[test]
fn versioned_iloc_reads_offset_before_index() -> anyhow::Result<()> {
    let data = indexed_iloc_file(b"heifdata");
    let tree = parse(&data, &ParseOptions::default())?;
    let iloc = tree.find_first(FourCC(*b"iloc")).expect("iloc");
    match &tree.node(iloc).body {
        BoxBody::ItemLocation(l) => {
            let e = &l.items[0].extents[0];
            assert_eq!((e.offset, e.index, e.length), (96, Some(7), 8));
        }
        other => panic!("unexpected iloc body {other:?}"),
    }
    assert_eq!(tree.links().item_count(), 1);
    assert_eq!(build(&tree, &BuildOptions::default())?, data);

    let mut tree = tree;
    remove_boxes_by_type(&mut tree, &[FourCC(*b"free")]);
    let moved = parse(&build(&tree, &BuildOptions::default())?, &ParseOptions::default())?;
    let iloc = moved.find_first(FourCC(*b"iloc")).expect("iloc");
    match &moved.node(iloc).body {
        BoxBody::ItemLocation(l) => {
            let e = &l.items[0].extents[0];
            assert_eq!((e.offset, e.index), (80, Some(7)));
        }
        other => panic!("unexpected iloc body {other:?}"),
    }
    assert_eq!(item_data(&moved, &ItemIndex::new(&moved), 1)?, b"heifdata");
    Ok(())
}

#[test]
fn byte_sized_counts_over_255_are_rejected() -> anyhow::Result<()> {
    let mut tree = heifbox::BoxTree::new();
    let pixi = PixelInformation { full: FullHeader::default(), bits_per_channel: vec![8; 256] };
    tree.push(None, BoxNode::synthesized(FourCC(*b"pixi"), BoxBody::PixelInformation(pixi)));
    let err = build(&tree, &BuildOptions::default()).expect_err("256 channels");
    assert_eq!(err.kind(), ErrorKind::UnsupportedConstruction);

    let mut tree = parse(&sample_heic(), &ParseOptions::default())?;
    let hvcc = tree.find_first(FourCC(*b"hvcC")).expect("hvcC");
    match &mut tree.node_mut(hvcc).body {
        BoxBody::HevcConfig(c) => {
            let first = c.nal_arrays[0].clone();
            c.nal_arrays.resize(256, first);
        }
        other => panic!("unexpected hvcC body {other:?}"),
    }
    let err = build(&tree, &BuildOptions::default()).expect_err("256 NAL arrays");
    assert_eq!(err.kind(), ErrorKind::UnsupportedConstruction);
    Ok(())
}

#[test]
fn movie_and_track_headers_decode_and_rebuild() -> anyhow::Result<()> {
    let mut mvhd = Vec::new();
    for v in [1u32, 2, 600, 1200] {
        mvhd.extend_from_slice(&v.to_be_bytes());
    }
    mvhd.extend_from_slice(&[0xAB; 80]);
    let mut tkhd = Vec::new();
    for v in [3u64, 4] {
        tkhd.extend_from_slice(&v.to_be_bytes());
    }
    tkhd.extend_from_slice(&[0, 0, 0, 9, 0, 0, 0, 0]);
    tkhd.extend_from_slice(&5000u64.to_be_bytes());
    tkhd.extend_from_slice(&[0xCD; 60]);
    let mut moov = full_bx(b"mvhd", 0, 0, &mvhd);
    moov.extend_from_slice(&bx(b"trak", &full_bx(b"tkhd", 1, 3, &tkhd)));
    let data = bx(b"moov", &moov);

    let tree = parse(&data, &ParseOptions { strict: true, ..Default::default() })?;
    match &tree.node(tree.find_first(FourCC(*b"mvhd")).expect("mvhd")).body {
        BoxBody::MovieHeader(m) => {
            assert_eq!((m.creation_time, m.modification_time), (1, 2));
            assert_eq!((m.timescale, m.duration), (600, 1200));
        }
        other => panic!("unexpected mvhd body {other:?}"),
    }
    match &tree.node(tree.find_first(FourCC(*b"tkhd")).expect("tkhd")).body {
        BoxBody::TrackHeader(t) => {
            assert_eq!(t.full.version, 1);
            assert_eq!((t.creation_time, t.track_id, t.duration), (3, 9, 5000));
        }
        other => panic!("unexpected tkhd body {other:?}"),
    }
    assert_eq!(build(&tree, &BuildOptions::default())?, data);
    Ok(())
}
