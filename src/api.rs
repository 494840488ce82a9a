use crate::{
    boxes::{BoxTree, FourCC},
    builder,
    error::{HeifError, Result},
    hevc, parser,
    registry::default_registry,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Options controlling [`parse`].
///
/// Every field has a default, so options can be loaded from partial JSON:
///
/// ```
/// let opts: heifbox::ParseOptions = serde_json::from_str(r#"{"strict": true}"#)?;
/// assert!(opts.strict);
/// assert_eq!(opts.max_depth, 32);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Reserved-bit mismatches and misplaced open-ended boxes are errors
    /// instead of warnings.
    pub strict: bool,
    /// Log every box at `debug` level.
    pub debug: bool,
    /// Maximum container nesting.
    pub max_depth: usize,
    /// Largest accepted input, in bytes.
    pub max_input_len: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: false,
            debug: false,
            max_depth: 32,
            max_input_len: 1 << 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub debug: bool,
}

/// Semantic role used to pick an item when no item ID is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    Primary,
    Thumbnail,
    Auxiliary,
}

impl FromStr for ItemRole {
    type Err = HeifError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary" | "pitm" => Ok(ItemRole::Primary),
            "thumbnail" | "thmb" => Ok(ItemRole::Thumbnail),
            "auxiliary" | "auxl" | "aux" => Ok(ItemRole::Auxiliary),
            other => Err(HeifError::InvalidParameter(format!("unknown item role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HevcExtractOptions {
    /// Takes precedence over `role`.
    pub item_id: Option<u32>,
    pub role: Option<ItemRole>,
    /// `auxC` type to match for [`ItemRole::Auxiliary`].
    pub urn: Option<String>,
}

/// Parse a HEIF/ISOBMFF buffer into a box tree and correlate its item
/// locations with the media data they point into.
///
/// # Example
/// ```no_run
/// use heifbox::{ParseOptions, parse};
///
/// let bytes = std::fs::read("image.heic")?;
/// let tree = parse(&bytes, &ParseOptions::default())?;
/// for id in tree.walk() {
///     println!("{}{}", "  ".repeat(tree.depth(id)), tree.node(id).typ);
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn parse(bytes: &[u8], opts: &ParseOptions) -> Result<BoxTree> {
    parser::parse_with_registry(bytes, &default_registry(), opts)
}

/// Serialize a tree, fixing up every box size and every correlated
/// `iloc` offset.
pub fn build(tree: &BoxTree, opts: &BuildOptions) -> Result<Vec<u8>> {
    builder::build(tree, opts)
}

/// Wrap a raw Annex-B HEVC stream holding one coded image into a minimal
/// HEIF tree.
pub fn from_hevc(bytes: &[u8]) -> Result<BoxTree> {
    hevc::from_hevc(bytes)
}

/// Extract one image item as an Annex-B stream: its parameter sets followed
/// by its coded data.
pub fn to_hevc(tree: &BoxTree, opts: &HevcExtractOptions) -> Result<Vec<u8>> {
    hevc::to_hevc(tree, opts)
}

/// Detach every box whose type is in `types`, wherever it sits in the tree.
/// Returns how many boxes were detached; removing twice is a no-op.
pub fn remove_boxes_by_type(tree: &mut BoxTree, types: &[FourCC]) -> usize {
    let doomed: Vec<_> = tree
        .walk()
        .into_iter()
        .filter(|&id| types.contains(&tree.node(id).typ))
        .collect();
    for &id in &doomed {
        tree.detach(id);
    }
    doomed.len()
}
