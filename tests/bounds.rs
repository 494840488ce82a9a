mod common;

use common::*;
use heifbox::boxes::{BoxBody, FourCC, HVCC_RESERVED};
use heifbox::{BuildOptions, ErrorKind, HeifError, ParseOptions, build, parse};

fn nested_moov(levels: usize) -> Vec<u8> {
    (0..levels).fold(Vec::new(), |inner, _| bx(b"moov", &inner))
}

#[test]
fn size_below_header_is_rejected() {
    let data = [0, 0, 0, 4, b'f', b'r', b'e', b'e'];
    let err = parse(&data, &ParseOptions::default()).expect_err("size 4 is too small");
    assert!(matches!(err, HeifError::SizeTooSmall { offset: 0, size: 4 }));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn size_past_the_buffer_is_rejected() {
    let mut data = bx(b"free", &[0; 8]);
    data[3] = 100;
    let err = parse(&data, &ParseOptions::default()).expect_err("size 100 overruns 16 bytes");
    assert!(matches!(err, HeifError::TruncatedBuffer { offset: 0, size: 100, remaining: 16 }));
}

#[test]
fn child_overrunning_its_parent_is_rejected() {
    // the inner box claims 32 bytes inside a 24-byte moov
    let mut inner = bx(b"free", &[0; 8]);
    inner[3] = 32;
    let data = bx(b"moov", &inner);
    let err = parse(&data, &ParseOptions::default()).expect_err("child overruns moov");
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn nesting_limit_is_enforced() -> anyhow::Result<()> {
    let data = nested_moov(4);
    let err = parse(&data, &ParseOptions { max_depth: 2, ..Default::default() }).expect_err("too deep");
    assert!(matches!(err, HeifError::DepthExceeded { limit: 2, .. }));

    let tree = parse(&data, &ParseOptions::default())?;
    let innermost = *tree.walk().last().expect("boxes");
    assert_eq!(tree.depth(innermost), 3);
    Ok(())
}

#[test]
fn input_limit_is_enforced() {
    let data = ftyp();
    let opts = ParseOptions { max_input_len: 16, ..Default::default() };
    let err = parse(&data, &opts).expect_err("24 bytes over a 16-byte limit");
    assert!(matches!(err, HeifError::InputTooLarge { len: 24, limit: 16 }));
}

#[test]
fn trailing_bytes_are_dropped_with_a_warning() -> anyhow::Result<()> {
    let mut data = ftyp();
    data.extend_from_slice(&[1, 2, 3]);
    let tree = parse(&data, &ParseOptions::default())?;
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.warnings().len(), 1);
    assert_eq!(build(&tree, &BuildOptions::default())?, ftyp());
    Ok(())
}

#[test]
fn open_ended_leaf_followed_by_a_box() -> anyhow::Result<()> {
    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(b"pasp");
    data.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1]);
    data.extend_from_slice(&bx(b"free", &[]));

    let err = parse(&data, &ParseOptions { strict: true, ..Default::default() }).expect_err("strict");
    assert!(matches!(err, HeifError::OpenEndedNotLast { offset: 0, .. }));

    let tree = parse(&data, &ParseOptions::default())?;
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.warnings().len(), 1);
    // rebuilt with a concrete size, swallowed bytes kept as the tail
    let out = build(&tree, &BuildOptions::default())?;
    assert_eq!(&out[..4], &24u32.to_be_bytes());
    assert_eq!(&out[4..], &data[4..]);
    Ok(())
}

#[test]
fn strict_mode_rejects_bad_hvcc_reserved_bits() {
    let err = parse(&sample_heic_with(0), &ParseOptions { strict: true, ..Default::default() })
        .expect_err("reserved bits are zero");
    match err {
        HeifError::ReservedBitMismatch { typ, found, expected, .. } => {
            assert_eq!(typ, FourCC(*b"hvcC"));
            assert_eq!(found, 0);
            assert_eq!(expected, 0xF);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn lenient_mode_keeps_observed_reserved_bits() -> anyhow::Result<()> {
    let data = sample_heic_with(0);
    let tree = parse(&data, &ParseOptions::default())?;
    assert_eq!(tree.warnings().len(), 1);

    let hvcc = tree.find_first(FourCC(*b"hvcC")).expect("hvcC");
    match &tree.node(hvcc).body {
        BoxBody::HevcConfig(c) => {
            assert_eq!(c.reserved[0], 0);
            assert_eq!(&c.reserved[1..], &HVCC_RESERVED[1..]);
        }
        other => panic!("unexpected hvcC body {other:?}"),
    }
    assert_eq!(build(&tree, &BuildOptions::default())?, data);
    Ok(())
}

#[test]
fn well_formed_sample_passes_strict_mode() -> anyhow::Result<()> {
    let tree = parse(&sample_heic(), &ParseOptions { strict: true, ..Default::default() })?;
    assert!(tree.warnings().is_empty());
    Ok(())
}

fn open_ended(typ: &[u8; 4], rest: &[u8]) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(typ);
    data.extend_from_slice(rest);
    data
}

#[test]
fn open_ended_opaque_box_swallowing_a_sibling() -> anyhow::Result<()> {
    let data = open_ended(b"free", &ftyp());
    let err = parse(&data, &ParseOptions { strict: true, ..Default::default() }).expect_err("strict");
    assert!(matches!(err, HeifError::OpenEndedNotLast { offset: 0, .. }));

    let tree = parse(&data, &ParseOptions::default())?;
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.warnings().len(), 1);

    // padding that does not look like a box is fine
    let tree = parse(&open_ended(b"free", &[0; 12]), &ParseOptions { strict: true, ..Default::default() })?;
    assert!(tree.warnings().is_empty());
    Ok(())
}

#[test]
fn open_ended_container_swallowing_a_sibling() -> anyhow::Result<()> {
    let data = open_ended(b"moov", &ftyp());
    let err = parse(&data, &ParseOptions { strict: true, ..Default::default() }).expect_err("strict");
    assert!(matches!(err, HeifError::OpenEndedNotLast { offset: 0, .. }));

    let tree = parse(&data, &ParseOptions::default())?;
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.warnings().len(), 1);
    let moov = tree.roots()[0];
    assert_eq!(tree.node(tree.children(moov)[0]).typ, FourCC(*b"ftyp"));

    // a trailing open-ended moov with ordinary children passes
    let mut data = ftyp();
    data.extend_from_slice(&open_ended(b"moov", &bx(b"trak", &[])));
    let tree = parse(&data, &ParseOptions { strict: true, ..Default::default() })?;
    assert!(tree.warnings().is_empty());
    Ok(())
}
