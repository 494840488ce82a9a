//! Tree to bytes.
//!
//! Every box is written with a placeholder size that is overwritten once its
//! body is complete. Offsets in `iloc` entries linked to an `mdat` are fixed
//! up in a second pass, after every `mdat` has found its new position.

use crate::api::BuildOptions;
use crate::bits::BitWriter;
use crate::boxes::{BoxBody, BoxId, BoxTree, ContainerHeader};
use crate::codec::{OffsetSlot, build_leaf, write_full};
use crate::error::{HeifError, Result};
use crate::relink::{Anchor, Patcher};
use tracing::debug;

pub fn build(tree: &BoxTree, opts: &BuildOptions) -> Result<Vec<u8>> {
    let mut b = Builder {
        tree,
        opts,
        w: BitWriter::new(),
        patcher: Patcher::default(),
    };
    for &id in tree.roots() {
        b.write_box(id)?;
    }
    b.patcher.apply(&mut b.w)?;
    Ok(b.w.into_bytes())
}

struct Builder<'a> {
    tree: &'a BoxTree,
    opts: &'a BuildOptions,
    w: BitWriter,
    patcher: Patcher,
}

impl Builder<'_> {
    fn write_box(&mut self, id: BoxId) -> Result<()> {
        let tree = self.tree;
        let node = tree.node(id);
        let start = self.w.tell();
        self.w.put_u32(0)?;
        self.w.put_bytes(&node.typ.0)?;

        match &node.body {
            BoxBody::Container(header) => {
                self.write_container_header(*header, node.children.len())?;
                for &child in &node.children {
                    self.write_box(child)?;
                }
            }
            BoxBody::MediaData(_) => {
                if let Some(link) = tree.links().media(id) {
                    self.patcher.record_media(link.correlation, start as u64);
                }
                self.w.put_bytes(tree.media_bytes(id))?;
            }
            BoxBody::Opaque => self.w.put_bytes(tree.body_bytes(id))?,
            body => {
                if !node.children.is_empty() {
                    return Err(HeifError::UnsupportedConstruction(format!(
                        "'{}' has child boxes but no container header rule",
                        node.typ
                    )));
                }
                let patcher = &mut self.patcher;
                let mut on_offset = |item_id: u32, slot: OffsetSlot, pos: usize, width: u8| {
                    let Some(link) = tree.links().item(id, item_id) else {
                        return;
                    };
                    let relative = match (&link.anchor, slot) {
                        (Anchor::Base { relative }, OffsetSlot::Base) => Some(*relative),
                        (Anchor::Extents { relatives }, OffsetSlot::Extent(i)) => {
                            relatives.get(i).copied().flatten()
                        }
                        _ => None,
                    };
                    if let Some(relative) = relative {
                        patcher.record_field(link.correlation, item_id, pos, width, relative);
                    }
                };
                build_leaf(body, &mut self.w, &mut on_offset)?;
                if let Some(origin) = node.origin() {
                    self.w.put_bytes(&tree.source()[origin.unparsed.clone()])?;
                }
            }
        }

        let len = self.w.tell() - start;
        let size = u32::try_from(len).map_err(|_| {
            HeifError::UnsupportedConstruction(format!(
                "'{}' is {len} bytes, too large for a 32-bit size",
                node.typ
            ))
        })?;
        self.w.overwrite_u32(start, size)?;
        if self.opts.debug {
            debug!(offset = start, size, typ = %node.typ, id = id.index(), "wrote box");
        }
        Ok(())
    }

    fn write_container_header(&mut self, header: ContainerHeader, children: usize) -> Result<()> {
        match header {
            ContainerHeader::None => Ok(()),
            ContainerHeader::Full(full) => write_full(&mut self.w, full),
            ContainerHeader::Counted { full, count_bytes, .. } => {
                write_full(&mut self.w, full)?;
                if children as u64 > crate::bits::max_for_width(count_bytes) {
                    return Err(HeifError::UnsupportedConstruction(format!(
                        "{children} children do not fit a {count_bytes}-byte count"
                    )));
                }
                self.w.put_uint(children as u64, count_bytes)
            }
        }
    }
}
