//! Item-level views over a box tree: which boxes describe an item, which
//! properties it has, and where its bytes live.

use crate::boxes::*;
use crate::error::{HeifError, Result};
use crate::relink::Anchor;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One-walk index of the item tables in a tree.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    /// `infe` box per item ID.
    pub infos: BTreeMap<u32, BoxId>,
    /// `iloc` box and entry position per item ID.
    pub locations: BTreeMap<u32, (BoxId, usize)>,
    /// Children of the first `ipco`; property index `n` is `properties[n - 1]`.
    pub properties: Vec<BoxId>,
    /// Associations per item, merged over every `ipma`.
    pub associations: BTreeMap<u32, Vec<Association>>,
    /// Item reference boxes, inside `iref` or standalone.
    pub references: Vec<BoxId>,
    pub primary: Option<u32>,
    pub ipco: Option<BoxId>,
    pub ipma: Option<BoxId>,
}

impl ItemIndex {
    pub fn new(tree: &BoxTree) -> Self {
        let mut index = ItemIndex::default();
        for id in tree.walk() {
            let node = tree.node(id);
            match &node.body {
                BoxBody::ItemInfoEntry(e) => {
                    index.infos.entry(e.item_id).or_insert(id);
                }
                BoxBody::ItemLocation(l) => {
                    for (i, e) in l.items.iter().enumerate() {
                        index.locations.entry(e.item_id).or_insert((id, i));
                    }
                }
                BoxBody::PropertyAssociation(a) => {
                    index.ipma.get_or_insert(id);
                    for e in &a.entries {
                        index.associations.entry(e.item_id).or_default().extend(&e.associations);
                    }
                }
                BoxBody::ItemReference(_) => index.references.push(id),
                BoxBody::PrimaryItem(p) => {
                    index.primary.get_or_insert(p.item_id);
                }
                BoxBody::Container(_) if node.typ == b"ipco" && index.ipco.is_none() => {
                    index.ipco = Some(id);
                    index.properties = tree.children(id).to_vec();
                }
                _ => {}
            }
        }
        index
    }

    /// Property box for a 1-origin `ipco` index.
    pub fn property_box(&self, index: u16) -> Option<BoxId> {
        (index as usize).checked_sub(1).and_then(|i| self.properties.get(i).copied())
    }

    /// Property boxes associated with an item, in association order.
    /// Index 0 and out-of-range indices are skipped.
    pub fn property_boxes_for_item(&self, item_id: u32) -> Vec<BoxId> {
        self.associations
            .get(&item_id)
            .map(|list| list.iter().filter_map(|a| self.property_box(a.property_index)).collect())
            .unwrap_or_default()
    }

    pub fn location<'t>(&self, tree: &'t BoxTree, item_id: u32) -> Option<(BoxId, &'t ItemLocationEntry)> {
        let &(iloc, i) = self.locations.get(&item_id)?;
        match &tree.node(iloc).body {
            BoxBody::ItemLocation(l) => l.items.get(i).map(|e| (iloc, e)),
            _ => None,
        }
    }

    /// Every item ID mentioned by `infe`, `iloc` or `ipma`, ascending.
    pub fn item_ids(&self) -> Vec<u32> {
        let mut ids: BTreeSet<u32> = self.infos.keys().copied().collect();
        ids.extend(self.locations.keys());
        ids.extend(self.associations.keys());
        ids.into_iter().collect()
    }
}

/// Every box that mentions `item_id`: its `infe`, the `iloc` and `ipma`
/// holding entries for it, `pitm` and reference boxes naming it.
pub fn boxes_for_item(tree: &BoxTree, item_id: u32) -> Vec<BoxId> {
    tree.walk()
        .into_iter()
        .filter(|&id| match &tree.node(id).body {
            BoxBody::ItemInfoEntry(e) => e.item_id == item_id,
            BoxBody::ItemLocation(l) => l.items.iter().any(|e| e.item_id == item_id),
            BoxBody::PropertyAssociation(a) => a.entries.iter().any(|e| e.item_id == item_id),
            BoxBody::PrimaryItem(p) => p.item_id == item_id,
            BoxBody::ItemReference(r) => r.from_item_id == item_id || r.to_item_ids.contains(&item_id),
            _ => false,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSummary {
    /// Reference type, e.g. `thmb` or `dimg`.
    pub kind: String,
    pub from: u32,
    pub to: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub item_id: u32,
    pub item_type: Option<String>,
    pub name: Option<String>,
    pub primary: bool,
    pub references: Vec<ReferenceSummary>,
    pub aux_type: Option<String>,
    /// Types of the associated properties, in association order.
    pub properties: Vec<String>,
}

/// Overview of every item in the tree.
pub fn item_summaries(tree: &BoxTree) -> Vec<ItemSummary> {
    let index = ItemIndex::new(tree);
    index
        .item_ids()
        .into_iter()
        .map(|item_id| {
            let info = index.infos.get(&item_id).and_then(|&id| match &tree.node(id).body {
                BoxBody::ItemInfoEntry(e) => Some(e),
                _ => None,
            });
            let references = index
                .references
                .iter()
                .filter_map(|&id| match &tree.node(id).body {
                    BoxBody::ItemReference(r) if r.from_item_id == item_id || r.to_item_ids.contains(&item_id) => {
                        Some(ReferenceSummary {
                            kind: tree.node(id).typ.to_string(),
                            from: r.from_item_id,
                            to: r.to_item_ids.clone(),
                        })
                    }
                    _ => None,
                })
                .collect();
            let props = index.property_boxes_for_item(item_id);
            let aux_type = props.iter().find_map(|&p| match &tree.node(p).body {
                BoxBody::AuxiliaryType(a) => Some(a.aux_type.clone()),
                _ => None,
            });
            ItemSummary {
                item_id,
                item_type: info.and_then(|e| e.item_type).map(|t| t.to_string()),
                name: info.map(|e| e.item_name.clone()),
                primary: index.primary == Some(item_id),
                references,
                aux_type,
                properties: props.iter().map(|&p| tree.node(p).typ.to_string()).collect(),
            }
        })
        .collect()
}

/// Bytes of an item stored in the file (construction method 0), extents
/// concatenated. Items linked to an `mdat` are read through the link, so
/// this also works on synthesized trees.
pub fn item_data(tree: &BoxTree, index: &ItemIndex, item_id: u32) -> Result<Vec<u8>> {
    let (iloc, entry) = index
        .location(tree, item_id)
        .ok_or_else(|| HeifError::UnresolvedReference(format!("item {item_id} has no iloc entry")))?;
    if !matches!(entry.construction_method, None | Some(0)) {
        return Err(HeifError::UnsupportedConstruction(format!(
            "item {item_id} uses construction method {}",
            entry.construction_method.unwrap_or(0)
        )));
    }

    let outside = |what: &str| HeifError::UnresolvedReference(format!("item {item_id}: {what} lies outside its data"));
    let mut out = Vec::new();
    match tree.links().item(iloc, item_id) {
        Some(link) => {
            let media = tree.media_bytes(link.mdat);
            for (i, extent) in entry.extents.iter().enumerate() {
                let relative = match &link.anchor {
                    Anchor::Base { relative } => {
                        relative.checked_add(extent.offset).ok_or_else(|| outside("an extent"))?
                    }
                    Anchor::Extents { relatives } => relatives
                        .get(i)
                        .copied()
                        .flatten()
                        .ok_or_else(|| outside("an extent"))?,
                };
                let start = relative.checked_sub(8).ok_or_else(|| outside("an extent"))? as usize;
                out.extend_from_slice(slice(media, start, extent.length).ok_or_else(|| outside("an extent"))?);
            }
        }
        None => {
            let source = tree.source();
            for extent in &entry.extents {
                let start = entry
                    .base_offset
                    .checked_add(extent.offset)
                    .and_then(|s| usize::try_from(s).ok())
                    .ok_or_else(|| outside("an extent"))?;
                out.extend_from_slice(slice(source, start, extent.length).ok_or_else(|| outside("an extent"))?);
            }
        }
    }
    Ok(out)
}

/// `len == 0` means "to the end".
fn slice(data: &[u8], start: usize, len: u64) -> Option<&[u8]> {
    let end = if len == 0 { data.len() } else { start.checked_add(len as usize)? };
    data.get(start..end)
}

const IMAGE_ITEM_TYPES: [&[u8; 4]; 6] = [b"hvc1", b"grid", b"iden", b"iovl", b"av01", b"jpeg"];

/// Add an ICC profile as a `colr` (`prof`) property and associate it with
/// every image item. Returns the new property's index.
pub fn append_icc_profile(tree: &mut BoxTree, icc: &[u8]) -> Result<u16> {
    let index = ItemIndex::new(tree);
    let ipco = index
        .ipco
        .ok_or_else(|| HeifError::UnresolvedReference("no ipco box to hold the profile".to_string()))?;
    let ipma = index
        .ipma
        .ok_or_else(|| HeifError::UnresolvedReference("no ipma box to associate the profile".to_string()))?;
    let property_index = u16::try_from(tree.children(ipco).len() + 1)
        .ok()
        .filter(|&i| i < 1 << 15)
        .ok_or_else(|| HeifError::UnsupportedConstruction("ipco is full".to_string()))?;

    let images: Vec<u32> = index
        .infos
        .iter()
        .filter(|&(_, &id)| match &tree.node(id).body {
            BoxBody::ItemInfoEntry(e) => e.item_type.is_some_and(|t| IMAGE_ITEM_TYPES.iter().any(|&i| t == i)),
            _ => false,
        })
        .map(|(&item_id, _)| item_id)
        .collect();

    tree.push(
        Some(ipco),
        BoxNode::synthesized(
            FourCC(*b"colr"),
            BoxBody::ColourInformation(ColourInformation {
                colour_type: FourCC(*b"prof"),
                data: icc.to_vec(),
            }),
        ),
    );

    let BoxBody::PropertyAssociation(assoc) = &mut tree.node_mut(ipma).body else {
        return Err(HeifError::UnresolvedReference("ipma box has no association table".to_string()));
    };
    if property_index > 127 {
        assoc.full.flags |= 1;
    }
    let association = Association { essential: false, property_index };
    for item_id in images {
        match assoc.entries.iter_mut().find(|e| e.item_id == item_id) {
            Some(entry) => entry.associations.push(association),
            None => assoc.entries.push(AssociationEntry { item_id, associations: vec![association] }),
        }
    }
    Ok(property_index)
}
