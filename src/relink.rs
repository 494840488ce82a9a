//! Correlation between `iloc` entries and the `mdat` boxes holding their bytes.
//!
//! After a parse, every item whose base offset (or, when that is zero, its
//! first extent offset) lands inside an `mdat` is linked to that box. The
//! builder records where each linked offset field and each `mdat` ended up and
//! rewrites the fields once the whole file has been emitted.

use crate::bits::BitWriter;
use crate::boxes::{BoxBody, BoxId, BoxTree, ItemLocationEntry};
use crate::error::{HeifError, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CorrelationId(pub u32);

/// Which offset fields of an item entry point into the linked `mdat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// `base_offset` lies in the region, `relative` bytes from its start.
    Base { relative: u64 },
    /// `base_offset` is zero and extent offsets are absolute; one entry per
    /// extent, `None` for extents outside the region.
    Extents { relatives: Vec<Option<u64>> },
}

#[derive(Debug, Clone)]
pub struct ItemLink {
    pub correlation: CorrelationId,
    pub mdat: BoxId,
    pub anchor: Anchor,
}

#[derive(Debug, Clone)]
pub struct MediaLink {
    pub correlation: CorrelationId,
    /// Most recently linked item.
    pub item_id: u32,
    pub relative: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Links {
    items: HashMap<(BoxId, u32), ItemLink>,
    media: HashMap<BoxId, MediaLink>,
    next: u32,
}

impl Links {
    pub fn item(&self, iloc: BoxId, item_id: u32) -> Option<&ItemLink> {
        self.items.get(&(iloc, item_id))
    }

    pub fn media(&self, mdat: BoxId) -> Option<&MediaLink> {
        self.media.get(&mdat)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Link an item entry to an `mdat`. Items sharing an `mdat` share its
    /// correlation, so a moved region patches every item inside it.
    pub fn link(&mut self, iloc: BoxId, item_id: u32, mdat: BoxId, anchor: Anchor) -> CorrelationId {
        let relative = match &anchor {
            Anchor::Base { relative } => *relative,
            Anchor::Extents { relatives } => relatives.iter().flatten().next().copied().unwrap_or(0),
        };
        let correlation = match self.media.get(&mdat) {
            Some(m) => m.correlation,
            None => {
                self.next += 1;
                CorrelationId(self.next)
            }
        };
        self.media.insert(mdat, MediaLink { correlation, item_id, relative });
        self.items.insert((iloc, item_id), ItemLink { correlation, mdat, anchor });
        correlation
    }
}

struct Region {
    id: BoxId,
    start: u64,
    end: u64,
}

impl Region {
    fn contains(&self, off: u64) -> bool {
        self.start <= off && off < self.end
    }
}

fn anchor_for(entry: &ItemLocationEntry, region: &Region) -> Option<Anchor> {
    if !matches!(entry.construction_method, None | Some(0)) {
        return None;
    }
    if entry.base_offset > 0 {
        return region
            .contains(entry.base_offset)
            .then(|| Anchor::Base { relative: entry.base_offset - region.start });
    }
    let first = entry.extents.first()?;
    if !region.contains(first.offset) {
        return None;
    }
    let relatives = entry
        .extents
        .iter()
        .map(|e| region.contains(e.offset).then(|| e.offset - region.start))
        .collect();
    Some(Anchor::Extents { relatives })
}

/// Scan the whole tree and link every `iloc` entry to the `mdat` containing it.
pub fn relink(tree: &mut BoxTree) {
    let order = tree.walk();
    let regions: Vec<Region> = order
        .iter()
        .filter_map(|&id| {
            let n = tree.node(id);
            match (&n.body, n.offset, n.length) {
                (BoxBody::MediaData(_), Some(start), Some(len)) => Some(Region { id, start, end: start + len }),
                _ => None,
            }
        })
        .collect();

    let mut pending = Vec::new();
    for &id in &order {
        let BoxBody::ItemLocation(iloc) = &tree.node(id).body else {
            continue;
        };
        for entry in &iloc.items {
            for region in &regions {
                if let Some(anchor) = anchor_for(entry, region) {
                    pending.push((id, entry.item_id, region.id, anchor));
                    break;
                }
            }
        }
    }

    for (iloc, item_id, mdat, anchor) in pending {
        trace!(item_id, ?anchor, "linking item to mdat");
        tree.links.link(iloc, item_id, mdat, anchor);
    }
}

/// Item IDs referenced by `pitm`, item references, `ipma` or `iloc` that no
/// `infe` declares. Purely informational; the builder does not consult it.
pub fn dangling_references(tree: &BoxTree) -> Vec<u32> {
    let mut declared = BTreeSet::new();
    let mut referenced = BTreeSet::new();
    for id in tree.walk() {
        match &tree.node(id).body {
            BoxBody::ItemInfoEntry(e) => {
                declared.insert(e.item_id);
            }
            BoxBody::PrimaryItem(p) => {
                referenced.insert(p.item_id);
            }
            BoxBody::ItemReference(r) => {
                referenced.insert(r.from_item_id);
                referenced.extend(r.to_item_ids.iter().copied());
            }
            BoxBody::PropertyAssociation(a) => {
                referenced.extend(a.entries.iter().map(|e| e.item_id));
            }
            BoxBody::ItemLocation(l) => {
                referenced.extend(l.items.iter().map(|e| e.item_id));
            }
            _ => {}
        }
    }
    referenced.difference(&declared).copied().collect()
}

struct OffsetField {
    correlation: CorrelationId,
    item_id: u32,
    field_offset: usize,
    width: u8,
    relative: u64,
}

/// Build-time side lists: offset fields awaiting a value and the new start
/// of every linked `mdat`.
#[derive(Default)]
pub(crate) struct Patcher {
    fields: Vec<OffsetField>,
    placements: HashMap<CorrelationId, u64>,
}

impl Patcher {
    pub(crate) fn record_field(
        &mut self,
        correlation: CorrelationId,
        item_id: u32,
        field_offset: usize,
        width: u8,
        relative: u64,
    ) {
        self.fields.push(OffsetField { correlation, item_id, field_offset, width, relative });
    }

    pub(crate) fn record_media(&mut self, correlation: CorrelationId, start: u64) {
        self.placements.insert(correlation, start);
    }

    /// Rewrite every recorded field as `new mdat start + relative offset`.
    pub(crate) fn apply(&self, w: &mut BitWriter) -> Result<()> {
        for f in &self.fields {
            let start = self.placements.get(&f.correlation).ok_or_else(|| {
                HeifError::UnresolvedReference(format!(
                    "iloc entry for item {} points into an mdat that was not written",
                    f.item_id
                ))
            })?;
            if !matches!(f.width, 1 | 2 | 4) {
                return Err(HeifError::UnsupportedConstruction(format!(
                    "{}-byte iloc offset field for item {}",
                    f.width, f.item_id
                )));
            }
            let value = start + f.relative;
            trace!(item_id = f.item_id, offset = f.field_offset, value, "patching iloc offset");
            w.overwrite_uint(f.field_offset, f.width, value)?;
        }
        Ok(())
    }
}
