pub mod api;
pub mod bits;
pub mod boxes;
pub mod builder;
mod codec;
pub mod error;
pub mod hevc;
mod hvcc;
mod iloc;
pub mod items;
pub mod json_api;
pub mod known_boxes;
pub mod parser;
pub mod registry;
pub mod relink;
pub mod util;

pub use api::{
    BuildOptions, HevcExtractOptions, ItemRole, ParseOptions, build, from_hevc, parse,
    remove_boxes_by_type, to_hevc,
};
pub use boxes::{BoxBody, BoxId, BoxNode, BoxTree, FourCC};
pub use error::{ErrorKind, HeifError, Result};
pub use items::{ItemIndex, append_icc_profile, boxes_for_item, item_summaries};
pub use json_api::{JsonBox, tree_to_json};
pub use registry::{Codec, Registry, default_registry};
pub use relink::{dangling_references, relink};
