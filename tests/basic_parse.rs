mod common;

use common::*;
use heifbox::boxes::{BoxBody, ContainerHeader, FourCC};
use heifbox::parser::read_box_header;
use heifbox::relink::Anchor;
use heifbox::{ParseOptions, parse};

fn types(tree: &heifbox::BoxTree, ids: &[heifbox::BoxId]) -> Vec<String> {
    ids.iter().map(|&id| tree.node(id).typ.to_string()).collect()
}

#[test]
fn read_single_ftyp_header() {
    let data = ftyp();
    let (hdr, end) = read_box_header(&data, 0, data.len()).expect("read_box_header failed");

    assert_eq!(hdr.start, 0);
    assert_eq!(hdr.size, 24);
    assert_eq!(hdr.typ, FourCC(*b"ftyp"));
    assert!(!hdr.open_ended());
    assert_eq!(end, 24);
}

#[test]
fn parses_sample_layout() -> anyhow::Result<()> {
    let tree = parse(&sample_heic(), &ParseOptions::default())?;

    assert_eq!(types(&tree, tree.roots()), ["ftyp", "meta", "zzzz", "free", "mdat"]);
    let meta = tree.find_first(FourCC(*b"meta")).expect("meta");
    assert_eq!(
        types(&tree, tree.children(meta)),
        ["hdlr", "pitm", "iloc", "iinf", "iref", "iprp"]
    );
    assert!(tree.warnings().is_empty());

    let ftyp = tree.node(tree.roots()[0]);
    match &ftyp.body {
        BoxBody::FileType(f) => {
            assert_eq!(f.major, FourCC(*b"heic"));
            assert_eq!(f.compatible, vec![FourCC(*b"mif1"), FourCC(*b"heic")]);
        }
        other => panic!("expected ftyp fields, got {other:?}"),
    }

    let mdat = tree.find_first(FourCC(*b"mdat")).expect("mdat");
    assert_eq!(tree.node(mdat).offset, Some(sample_mdat_offset() as u64));
    assert_eq!(tree.media_bytes(mdat), media_payload().as_slice());
    Ok(())
}

#[test]
fn unknown_boxes_stay_opaque() -> anyhow::Result<()> {
    let tree = parse(&sample_heic(), &ParseOptions::default())?;
    let zzzz = tree.find_first(FourCC(*b"zzzz")).expect("zzzz");
    assert!(matches!(tree.node(zzzz).body, BoxBody::Opaque));
    assert_eq!(tree.body_bytes(zzzz), &[1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn decodes_item_tables() -> anyhow::Result<()> {
    let tree = parse(&sample_heic(), &ParseOptions::default())?;

    let iinf = tree.find_first(FourCC(*b"iinf")).expect("iinf");
    match &tree.node(iinf).body {
        BoxBody::Container(ContainerHeader::Counted { count_bytes, declared, .. }) => {
            assert_eq!(*count_bytes, 2);
            assert_eq!(*declared, 3);
        }
        other => panic!("unexpected iinf body {other:?}"),
    }
    assert_eq!(tree.children(iinf).len(), 3);

    let infe = tree.node(tree.children(iinf)[1]);
    match &infe.body {
        BoxBody::ItemInfoEntry(e) => {
            assert_eq!(e.item_id, 2);
            assert_eq!(e.item_type, Some(FourCC(*b"hvc1")));
            assert_eq!(e.item_name, "Thumbnail");
            assert_eq!(e.content_type, None);
        }
        other => panic!("unexpected infe body {other:?}"),
    }

    let thmb = tree.find_first(FourCC(*b"thmb")).expect("thmb");
    match &tree.node(thmb).body {
        BoxBody::ItemReference(r) => {
            assert_eq!(r.id_width, 2);
            assert_eq!(r.from_item_id, 2);
            assert_eq!(r.to_item_ids, vec![1]);
        }
        other => panic!("unexpected thmb body {other:?}"),
    }

    let hvcc = tree.find_first(FourCC(*b"hvcC")).expect("hvcC");
    match &tree.node(hvcc).body {
        BoxBody::HevcConfig(c) => {
            assert_eq!(c.profile_idc, 1);
            assert_eq!(c.level_idc, 90);
            assert_eq!(c.chroma_format, 1);
            assert_eq!(c.chroma_format_name(), "YUV420");
            assert_eq!(c.length_size_minus_one, 3);
            assert_eq!(c.nal_arrays.len(), 3);
            assert_eq!(c.nal_arrays[1].nal_unit_type, 33);
            assert_eq!(c.nal_arrays[1].nalus[0], SPS.to_vec());
        }
        other => panic!("unexpected hvcC body {other:?}"),
    }
    Ok(())
}

#[test]
fn links_items_to_mdat() -> anyhow::Result<()> {
    let tree = parse(&sample_heic(), &ParseOptions::default())?;
    let iloc = tree.find_first(FourCC(*b"iloc")).expect("iloc");
    let mdat = tree.find_first(FourCC(*b"mdat")).expect("mdat");

    assert_eq!(tree.links().item_count(), 3);
    let primary = tree.links().item(iloc, 1).expect("item 1 linked");
    assert_eq!(primary.mdat, mdat);
    assert_eq!(primary.anchor, Anchor::Base { relative: 8 });

    let alpha = tree.links().item(iloc, 3).expect("item 3 linked");
    assert_eq!(alpha.anchor, Anchor::Extents { relatives: vec![Some(23)] });
    // one correlation per mdat
    assert_eq!(primary.correlation, alpha.correlation);
    Ok(())
}

#[test]
fn iref_children_parse_as_references_whatever_their_type() -> anyhow::Result<()> {
    // iref v1 (32-bit IDs) holding a child typed 'iloc'
    let reference = bx(b"iloc", &[0, 0, 0, 7, 0, 1, 0, 0, 0, 9]);
    let data = full_bx(b"meta", 0, 0, &full_bx(b"iref", 1, 0, &reference));
    let tree = parse(&data, &ParseOptions::default())?;

    let child = tree.find_first(FourCC(*b"iloc")).expect("iloc child");
    match &tree.node(child).body {
        BoxBody::ItemReference(r) => {
            assert_eq!(r.id_width, 4);
            assert_eq!(r.from_item_id, 7);
            assert_eq!(r.to_item_ids, vec![9]);
        }
        other => panic!("expected an item reference, got {other:?}"),
    }
    Ok(())
}

#[test]
fn short_leaf_degrades_to_opaque_with_warning() -> anyhow::Result<()> {
    let data = bx(b"ispe", &[0, 0, 0, 0, 0, 0, 1, 0]);
    let tree = parse(&data, &ParseOptions::default())?;
    let ispe = tree.roots()[0];
    assert!(matches!(tree.node(ispe).body, BoxBody::Opaque));
    assert_eq!(tree.warnings().len(), 1);
    Ok(())
}

#[test]
fn open_ended_box_runs_to_the_end() -> anyhow::Result<()> {
    let mut data = ftyp();
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[9; 20]);

    let tree = parse(&data, &ParseOptions::default())?;
    let mdat = tree.roots()[1];
    assert!(tree.node(mdat).open_ended);
    assert_eq!(tree.node(mdat).length, Some(28));
    assert_eq!(tree.media_bytes(mdat), &[9; 20]);
    Ok(())
}
