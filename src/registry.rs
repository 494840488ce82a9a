use crate::boxes::FourCC;
use std::collections::HashMap;

/// Fixed header in front of a container's child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRule {
    /// Children start right after the box header (`moov`, `iprp`, `ipco`, ...).
    None,
    /// 1-byte version + 3-byte flags (`meta`, `iref`).
    Full,
    /// Version + flags + item count, 16-bit unless version > 1 (`iinf`).
    ItemCount,
    /// Version + flags + 32-bit entry count (`dref`).
    EntryCount,
}

/// How a box body is parsed and built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Container(HeaderRule),
    FileType,
    Handler,
    SpatialExtents,
    PixelAspectRatio,
    PrimaryItem,
    HevcConfig,
    ItemLocation,
    ItemReference,
    PropertyAssociation,
    ItemInfoEntry,
    ColourInformation,
    PixelInformation,
    CleanAperture,
    AuxiliaryType,
    DataEntryUrl,
    MovieHeader,
    TrackHeader,
    MediaData,
    /// Body kept verbatim.
    Opaque,
}

/// Mapping from box type to codec.
///
/// The mapping depends on the parent as well: inside `iref` every child is
/// an item reference list, whatever its type code (including `iloc`).
pub struct Registry {
    map: HashMap<FourCC, Codec>,
}

impl Registry {
    /// Create an empty registry. Every type resolves to [`Codec::Opaque`].
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Return a new registry with `typ` mapped to `codec`.
    pub fn with_codec(mut self, typ: FourCC, codec: Codec) -> Self {
        self.map.insert(typ, codec);
        self
    }

    /// Resolve the codec for a box of type `typ` whose parent is `parent`.
    pub fn resolve(&self, typ: FourCC, parent: Option<FourCC>) -> Codec {
        if parent.is_some_and(|p| p == b"iref") {
            return Codec::ItemReference;
        }
        self.map.get(&typ).copied().unwrap_or(Codec::Opaque)
    }

    /// Header rule for a container type; `None` if `typ` is not a container.
    pub fn container_rule(&self, typ: FourCC) -> Option<HeaderRule> {
        match self.map.get(&typ) {
            Some(Codec::Container(rule)) => Some(*rule),
            _ => None,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_registry() -> Registry {
    use Codec::*;
    let entries: [(&[u8; 4], Codec); 32] = [
        (b"moov", Container(HeaderRule::None)),
        (b"trak", Container(HeaderRule::None)),
        (b"mdia", Container(HeaderRule::None)),
        (b"dinf", Container(HeaderRule::None)),
        (b"iprp", Container(HeaderRule::None)),
        (b"ipco", Container(HeaderRule::None)),
        (b"meta", Container(HeaderRule::Full)),
        (b"iref", Container(HeaderRule::Full)),
        (b"iinf", Container(HeaderRule::ItemCount)),
        (b"dref", Container(HeaderRule::EntryCount)),
        (b"ftyp", FileType),
        (b"hdlr", Handler),
        (b"ispe", SpatialExtents),
        (b"pasp", PixelAspectRatio),
        (b"pitm", PrimaryItem),
        (b"hvcC", HevcConfig),
        (b"iloc", ItemLocation),
        (b"thmb", ItemReference),
        (b"dimg", ItemReference),
        (b"auxl", ItemReference),
        (b"cdsc", ItemReference),
        (b"ipma", PropertyAssociation),
        (b"infe", ItemInfoEntry),
        (b"colr", ColourInformation),
        (b"pixi", PixelInformation),
        (b"clap", CleanAperture),
        (b"auxC", AuxiliaryType),
        (b"url ", DataEntryUrl),
        (b"mvhd", MovieHeader),
        (b"tkhd", TrackHeader),
        (b"mdat", MediaData),
        (b"free", Opaque),
    ];
    entries
        .into_iter()
        .fold(Registry::new(), |reg, (typ, codec)| reg.with_codec(FourCC(*typ), codec))
}
