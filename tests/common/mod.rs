//! Byte-level fixtures shared by the integration tests.
#![allow(dead_code)]

pub const VPS: [u8; 3] = [0x40, 0x01, 0x0C];
// profile 1, level 90, 4:2:0, 64x32, 8-bit
pub const SPS: [u8; 19] = [
    0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x00, 0x90, 0x00, 0x00, 0x00, 0x00, 0x00, 90, 0xA0,
    0x20, 0x82, 0x16,
];
pub const PPS: [u8; 3] = [0x44, 0x01, 0xC1];
pub const PRIMARY_IDR: [u8; 4] = [0x26, 0x01, 0xAF, 0x10];
pub const THUMB_IDR: [u8; 3] = [0x26, 0x01, 0xCC];
pub const ALPHA_IDR: [u8; 2] = [0x26, 0x01];
pub const ALPHA_URN: &str = "urn:mpeg:hevc:2015:auxid:1";

pub fn bx(typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(body.len() + 8);
    v.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(body);
    v
}

pub fn full_bx(typ: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut b = vec![version];
    b.extend_from_slice(&flags.to_be_bytes()[1..]);
    b.extend_from_slice(body);
    bx(typ, &b)
}

pub fn ftyp() -> Vec<u8> {
    let mut b = b"heic".to_vec();
    b.extend_from_slice(&0u32.to_be_bytes());
    b.extend_from_slice(b"mif1heic");
    bx(b"ftyp", &b)
}

pub fn annexb_stream() -> Vec<u8> {
    let mut v = Vec::new();
    for nal in [&VPS[..], &SPS[..], &PPS[..], &PRIMARY_IDR[..]] {
        v.extend_from_slice(&[0, 0, 0, 1]);
        v.extend_from_slice(nal);
    }
    v
}

fn length_prefixed(nal: &[u8]) -> Vec<u8> {
    let mut v = (nal.len() as u32).to_be_bytes().to_vec();
    v.extend_from_slice(nal);
    v
}

/// Contents of the sample's `mdat`: three length-prefixed IDR units at
/// offsets 0, 8 and 15.
pub fn media_payload() -> Vec<u8> {
    [length_prefixed(&PRIMARY_IDR), length_prefixed(&THUMB_IDR), length_prefixed(&ALPHA_IDR)].concat()
}

/// `hvcC` body; `reserved0` replaces the leading 4 reserved bits (0xF).
pub fn hvcc_body(reserved0: u8) -> Vec<u8> {
    let mut b = vec![1, 0x01, 0x60, 0x00, 0x00, 0x00, 0x90, 0, 0, 0, 0, 0, 90];
    b.push(reserved0 << 4);
    b.extend_from_slice(&[0x00, 0xFC, 0xFD, 0xF8, 0xF8, 0x00, 0x00, 0x0F, 3]);
    for (typ, nal) in [(0xA0u8, &VPS[..]), (0xA1, &SPS[..]), (0xA2, &PPS[..])] {
        b.push(typ);
        b.extend_from_slice(&1u16.to_be_bytes());
        b.extend_from_slice(&(nal.len() as u16).to_be_bytes());
        b.extend_from_slice(nal);
    }
    b
}

fn infe(item_id: u16, name: &str) -> Vec<u8> {
    let mut b = item_id.to_be_bytes().to_vec();
    b.extend_from_slice(&[0, 0]);
    b.extend_from_slice(b"hvc1");
    b.extend_from_slice(name.as_bytes());
    b.push(0);
    full_bx(b"infe", 2, 0, &b)
}

fn reference(typ: &[u8; 4], from: u16, to: u16) -> Vec<u8> {
    bx(typ, &[from.to_be_bytes(), 1u16.to_be_bytes(), to.to_be_bytes()].concat())
}

fn ispe(width: u32, height: u32) -> Vec<u8> {
    full_bx(b"ispe", 0, 0, &[width.to_be_bytes(), height.to_be_bytes()].concat())
}

/// `meta` for three items: 1 primary, 2 thumbnail of 1, 3 alpha of 1.
/// Items 1 and 2 use `base_offset = mdat_body`; item 3 uses base 0 and an
/// absolute extent offset.
fn meta(mdat_body: u32, reserved0: u8) -> Vec<u8> {
    let mut hdlr = vec![0u8; 4];
    hdlr.extend_from_slice(b"pict");
    hdlr.extend_from_slice(&[0; 12]);
    hdlr.extend_from_slice(b"test\0");
    let hdlr = full_bx(b"hdlr", 0, 0, &hdlr);
    let pitm = full_bx(b"pitm", 0, 0, &1u16.to_be_bytes());

    let mut iloc = vec![0x44, 0x40];
    iloc.extend_from_slice(&3u16.to_be_bytes());
    for (id, base, offset, len) in [
        (1u16, mdat_body, 0u32, 8u32),
        (2, mdat_body, 8, 7),
        (3, 0, mdat_body + 15, 6),
    ] {
        iloc.extend_from_slice(&id.to_be_bytes());
        iloc.extend_from_slice(&[0, 0]);
        iloc.extend_from_slice(&base.to_be_bytes());
        iloc.extend_from_slice(&1u16.to_be_bytes());
        iloc.extend_from_slice(&offset.to_be_bytes());
        iloc.extend_from_slice(&len.to_be_bytes());
    }
    let iloc = full_bx(b"iloc", 0, 0, &iloc);

    let iinf = full_bx(
        b"iinf",
        0,
        0,
        &[3u16.to_be_bytes().to_vec(), infe(1, "Primary"), infe(2, "Thumbnail"), infe(3, "Alpha")].concat(),
    );
    let iref = full_bx(b"iref", 0, 0, &[reference(b"thmb", 2, 1), reference(b"auxl", 3, 1)].concat());

    let mut auxc = ALPHA_URN.as_bytes().to_vec();
    auxc.push(0);
    let auxc = full_bx(b"auxC", 0, 0, &auxc);
    let ipco = bx(
        b"ipco",
        &[bx(b"hvcC", &hvcc_body(reserved0)), ispe(64, 32), ispe(32, 16), auxc].concat(),
    );
    let mut ipma = 3u32.to_be_bytes().to_vec();
    for (id, prop) in [(1u16, 2u8), (2, 3), (3, 4)] {
        ipma.extend_from_slice(&id.to_be_bytes());
        ipma.extend_from_slice(&[2, 0x81, prop]);
    }
    let ipma = full_bx(b"ipma", 0, 0, &ipma);
    let iprp = bx(b"iprp", &[ipco, ipma].concat());

    full_bx(b"meta", 0, 0, &[hdlr, pitm, iloc, iinf, iref, iprp].concat())
}

/// A three-item HEIC: `ftyp`, `meta`, an unknown `zzzz`, a 16-byte `free`
/// and the `mdat`.
pub fn sample_heic_with(reserved0: u8) -> Vec<u8> {
    let ftyp = ftyp();
    let unknown = bx(b"zzzz", &[1, 2, 3, 4, 5]);
    let free = bx(b"free", &[0; 8]);
    let meta_len = meta(0, reserved0).len();
    let mdat_body = (ftyp.len() + meta_len + unknown.len() + free.len() + 8) as u32;
    [ftyp, meta(mdat_body, reserved0), unknown, free, bx(b"mdat", &media_payload())].concat()
}

pub fn sample_heic() -> Vec<u8> {
    sample_heic_with(0xF)
}

/// Offset of the `mdat` box (its header) in [`sample_heic`].
pub fn sample_mdat_offset() -> usize {
    sample_heic().len() - media_payload().len() - 8
}
