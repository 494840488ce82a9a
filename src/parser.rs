use crate::api::ParseOptions;
use crate::bits::BitReader;
use crate::boxes::{BoxBody, BoxId, BoxNode, BoxTree, ContainerHeader, FourCC, MediaData, Origin};
use crate::codec::{LeafContext, parse_leaf, read_full};
use crate::error::{HeifError, Result};
use crate::known_boxes::KnownBox;
use crate::registry::{Codec, HeaderRule, Registry};
use crate::relink::relink;
use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

/// Size and type of a box as read from its 8-byte header.
#[derive(Debug, Clone, Copy)]
pub struct BoxHeader {
    pub start: usize,
    /// Raw size field; 0 and 1 mean "extends to the end of the list".
    pub size: u32,
    pub typ: FourCC,
}

impl BoxHeader {
    pub fn open_ended(&self) -> bool {
        self.size <= 1
    }
}

/// Read the header at `pos` and work out where the box ends, given the end of
/// the enclosing list.
pub fn read_box_header(data: &[u8], pos: usize, limit: usize) -> Result<(BoxHeader, usize)> {
    if pos + 8 > limit || limit > data.len() {
        return Err(HeifError::TruncatedBuffer {
            offset: pos as u64,
            size: 8,
            remaining: limit.saturating_sub(pos) as u64,
        });
    }
    let size = BigEndian::read_u32(&data[pos..pos + 4]);
    let typ = FourCC([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
    let hdr = BoxHeader { start: pos, size, typ };
    if hdr.open_ended() {
        return Ok((hdr, limit));
    }
    if size < 8 {
        return Err(HeifError::SizeTooSmall { offset: pos as u64, size: size as u64 });
    }
    let end = pos as u64 + size as u64;
    if end > limit as u64 {
        return Err(HeifError::TruncatedBuffer {
            offset: pos as u64,
            size: size as u64,
            remaining: (limit - pos) as u64,
        });
    }
    Ok((hdr, end as usize))
}

/// Parse `bytes` with a caller-supplied registry.
pub fn parse_with_registry(bytes: &[u8], registry: &Registry, opts: &ParseOptions) -> Result<BoxTree> {
    if bytes.len() > opts.max_input_len {
        return Err(HeifError::InputTooLarge { len: bytes.len(), limit: opts.max_input_len });
    }
    let mut p = Parser {
        data: bytes,
        registry,
        opts,
        tree: BoxTree::with_source(bytes.to_vec()),
    };
    p.parse_box_list(0, bytes.len(), None, 0)?;
    let mut tree = p.tree;
    relink(&mut tree);
    debug!(boxes = tree.walk().len(), items = tree.links().item_count(), "parsed");
    Ok(tree)
}

struct Parser<'a> {
    data: &'a [u8],
    registry: &'a Registry,
    opts: &'a ParseOptions,
    tree: BoxTree,
}

impl Parser<'_> {
    fn parse_box_list(&mut self, start: usize, limit: usize, parent: Option<BoxId>, depth: usize) -> Result<()> {
        if depth > self.opts.max_depth {
            return Err(HeifError::DepthExceeded { limit: self.opts.max_depth, offset: start as u64 });
        }
        let mut pos = start;
        while pos + 8 <= limit {
            let (hdr, end) = read_box_header(self.data, pos, limit)?;
            let id = self.parse_box(hdr, end, parent, depth)?;
            if self.opts.debug {
                debug!(
                    offset = pos,
                    size = end - pos,
                    typ = %hdr.typ,
                    depth,
                    open_ended = hdr.open_ended(),
                    id = id.index(),
                    "box"
                );
            }
            pos = end;
        }
        if pos < limit {
            self.tree.warn(format!(
                "{} trailing bytes at {pos} are too short for a box and were dropped",
                limit - pos
            ));
        }
        Ok(())
    }

    fn parse_box(&mut self, hdr: BoxHeader, end: usize, parent: Option<BoxId>, depth: usize) -> Result<BoxId> {
        let body_start = hdr.start + 8;
        let parent_node = parent.map(|p| self.tree.node(p));
        let codec = self.registry.resolve(hdr.typ, parent_node.map(|n| n.typ));
        let id_width = match parent_node {
            Some(n) if n.typ == b"iref" => match &n.body {
                BoxBody::Container(ContainerHeader::Full(h)) if h.version >= 1 => 4,
                _ => 2,
            },
            _ => 2,
        };

        let mut node = BoxNode::synthesized(hdr.typ, BoxBody::Opaque);
        node.offset = Some(hdr.start as u64);
        node.length = Some((end - hdr.start) as u64);
        node.open_ended = hdr.open_ended();
        node.origin = Some(Origin { data: body_start..end, unparsed: end..end });

        let data = self.data;
        let body = &data[body_start..end];
        match codec {
            Codec::Container(rule) => {
                let mut r = BitReader::new(body);
                node.body = BoxBody::Container(read_container_header(&mut r, rule)?);
                let id = self.tree.push(parent, node);
                self.parse_box_list(body_start + r.tell(), end, Some(id), depth + 1)?;
                if hdr.open_ended() {
                    self.check_open_ended_children(hdr, id)?;
                }
                Ok(id)
            }
            Codec::MediaData => {
                node.body = BoxBody::MediaData(MediaData::default());
                Ok(self.tree.push(parent, node))
            }
            Codec::Opaque => {
                if hdr.open_ended() {
                    self.check_open_ended_tail(hdr, body_start, end)?;
                }
                Ok(self.tree.push(parent, node))
            }
            leaf => {
                let mut ctx = self.context(hdr.typ, body_start, id_width);
                let mut r = BitReader::new(body);
                match parse_leaf(leaf, &mut r, &mut ctx) {
                    Ok(parsed) => {
                        node.body = parsed;
                        node.origin = Some(Origin { data: body_start..end, unparsed: body_start + r.tell()..end });
                    }
                    Err(HeifError::EndOfData { .. }) => {
                        ctx.warnings.push(format!(
                            "'{}' at {}: body too short for its layout, kept as raw bytes",
                            hdr.typ, hdr.start
                        ));
                    }
                    Err(e) => return Err(e),
                }
                for w in ctx.warnings {
                    self.tree.warn(w);
                }
                if hdr.open_ended() {
                    self.check_open_ended_tail(hdr, body_start + r.tell(), end)?;
                }
                Ok(self.tree.push(parent, node))
            }
        }
    }

    fn context(&self, typ: FourCC, body_start: usize, id_width: u8) -> LeafContext {
        LeafContext {
            typ,
            body_offset: body_start as u64,
            strict: self.opts.strict,
            id_width,
            warnings: Vec::new(),
        }
    }

    /// An open-ended leaf whose leftover bytes look like another box was
    /// probably followed by siblings it has swallowed.
    fn check_open_ended_tail(&mut self, hdr: BoxHeader, tail: usize, end: usize) -> Result<()> {
        if tail + 8 > end || !looks_like_box(&self.data[tail..end]) {
            return Ok(());
        }
        let msg = format!(
            "open-ended '{}' at {} is followed by what looks like another box at {tail}",
            hdr.typ, hdr.start
        );
        self.open_ended_not_last(hdr, msg)
    }

    /// An open-ended container that picked up a file-level box, or a box of
    /// its own type, has run over the siblings that followed it.
    fn check_open_ended_children(&mut self, hdr: BoxHeader, id: BoxId) -> Result<()> {
        let stray = self
            .tree
            .children(id)
            .iter()
            .map(|&c| self.tree.node(c))
            .find(|n| n.typ == hdr.typ || KnownBox::from(n.typ).is_file_level());
        let Some(stray) = stray else {
            return Ok(());
        };
        let msg = format!(
            "open-ended '{}' at {} contains '{}' at {}, which belongs beside it",
            hdr.typ,
            hdr.start,
            stray.typ,
            stray.offset.unwrap_or(0)
        );
        self.open_ended_not_last(hdr, msg)
    }

    fn open_ended_not_last(&mut self, hdr: BoxHeader, msg: String) -> Result<()> {
        if self.opts.strict {
            return Err(HeifError::OpenEndedNotLast { typ: hdr.typ, offset: hdr.start as u64 });
        }
        self.tree.warn(msg);
        Ok(())
    }
}

fn read_container_header(r: &mut BitReader, rule: HeaderRule) -> Result<ContainerHeader> {
    Ok(match rule {
        HeaderRule::None => ContainerHeader::None,
        HeaderRule::Full => ContainerHeader::Full(read_full(r)?),
        HeaderRule::ItemCount => {
            let full = read_full(r)?;
            let count_bytes = if full.version > 1 { 4 } else { 2 };
            let declared = r.read_uint(count_bytes)? as u32;
            ContainerHeader::Counted { full, count_bytes, declared }
        }
        HeaderRule::EntryCount => {
            let full = read_full(r)?;
            let declared = r.read_u32()?;
            ContainerHeader::Counted { full, count_bytes: 4, declared }
        }
    })
}

fn looks_like_box(bytes: &[u8]) -> bool {
    let size = BigEndian::read_u32(&bytes[..4]) as usize;
    let typ = FourCC([bytes[4], bytes[5], bytes[6], bytes[7]]);
    typ.is_printable() && size >= 8 && size <= bytes.len()
}
