use crate::boxes::FourCC;

/// Typed view over the HEIF / ISOBMFF boxes this crate knows by name.
///
/// Anything not in this list becomes `KnownBox::Unknown(fourcc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Meta,
    Mdat,
    Moov,
    Free,
    Skip,

    // movie structure (passed through)
    Trak,
    Mdia,
    Mvhd,
    Tkhd,

    // meta children
    Hdlr,
    Pitm,
    Iloc,
    Iinf,
    Infe,
    Idat,

    // data information
    Dinf,
    Dref,
    Url,
    Urn,

    // item references
    Iref,
    Dimg,
    Thmb,
    Auxl,
    Cdsc,

    // item properties
    Iprp,
    Ipco,
    Ipma,
    Pasp,
    Hvcc,
    Ispe,
    Colr,
    Pixi,
    Clap,
    AuxC,
    Irot,
    Imir,

    // Anything else
    Unknown(FourCC),
}

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"meta" => KnownBox::Meta,
            b"mdat" => KnownBox::Mdat,
            b"moov" => KnownBox::Moov,
            b"free" => KnownBox::Free,
            b"skip" => KnownBox::Skip,

            b"trak" => KnownBox::Trak,
            b"mdia" => KnownBox::Mdia,
            b"mvhd" => KnownBox::Mvhd,
            b"tkhd" => KnownBox::Tkhd,

            b"hdlr" => KnownBox::Hdlr,
            b"pitm" => KnownBox::Pitm,
            b"iloc" => KnownBox::Iloc,
            b"iinf" => KnownBox::Iinf,
            b"infe" => KnownBox::Infe,
            b"idat" => KnownBox::Idat,

            b"dinf" => KnownBox::Dinf,
            b"dref" => KnownBox::Dref,
            b"url " => KnownBox::Url,
            b"urn " => KnownBox::Urn,

            b"iref" => KnownBox::Iref,
            b"dimg" => KnownBox::Dimg,
            b"thmb" => KnownBox::Thmb,
            b"auxl" => KnownBox::Auxl,
            b"cdsc" => KnownBox::Cdsc,

            b"iprp" => KnownBox::Iprp,
            b"ipco" => KnownBox::Ipco,
            b"ipma" => KnownBox::Ipma,
            b"pasp" => KnownBox::Pasp,
            b"hvcC" => KnownBox::Hvcc,
            b"ispe" => KnownBox::Ispe,
            b"colr" => KnownBox::Colr,
            b"pixi" => KnownBox::Pixi,
            b"clap" => KnownBox::Clap,
            b"auxC" => KnownBox::AuxC,
            b"irot" => KnownBox::Irot,
            b"imir" => KnownBox::Imir,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    /// Does this box *contain* child boxes (container semantics)?
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov
                | KnownBox::Trak
                | KnownBox::Mdia
                | KnownBox::Meta
                | KnownBox::Dinf
                | KnownBox::Dref
                | KnownBox::Iprp
                | KnownBox::Ipco
                | KnownBox::Iinf
                | KnownBox::Iref
        )
    }

    /// Is this a FullBox (version + flags)?
    pub fn is_full_box(&self) -> bool {
        matches!(
            self,
            KnownBox::Meta
                | KnownBox::Mvhd
                | KnownBox::Tkhd
                | KnownBox::Hdlr
                | KnownBox::Pitm
                | KnownBox::Iloc
                | KnownBox::Iinf
                | KnownBox::Infe
                | KnownBox::Dref
                | KnownBox::Url
                | KnownBox::Urn
                | KnownBox::Iref
                | KnownBox::Ipma
                | KnownBox::Ispe
                | KnownBox::Pixi
                | KnownBox::AuxC
        )
    }

    /// Boxes that only appear at file level; finding one nested means its
    /// parent overran into its siblings.
    pub fn is_file_level(&self) -> bool {
        matches!(self, KnownBox::Ftyp | KnownBox::Moov | KnownBox::Mdat)
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type and Compatibility",
            KnownBox::Meta => "Information about items",
            KnownBox::Mdat => "Media Data",
            KnownBox::Moov => "Movie Box",
            KnownBox::Free => "Free Space",
            KnownBox::Skip => "Free Space",
            KnownBox::Trak => "Track Box",
            KnownBox::Mdia => "Media Box",
            KnownBox::Mvhd => "Movie Header",
            KnownBox::Tkhd => "Track Header",
            KnownBox::Hdlr => "Handler reference",
            KnownBox::Pitm => "Primary item reference",
            KnownBox::Iloc => "Item location",
            KnownBox::Iinf => "Item information",
            KnownBox::Infe => "Item information entry",
            KnownBox::Idat => "Item data",
            KnownBox::Dinf => "Data Information Box",
            KnownBox::Dref => "Data Reference Box",
            KnownBox::Url => "Data Entry Url Box",
            KnownBox::Urn => "Data Entry Urn Box",
            KnownBox::Iref => "Item Reference Box",
            KnownBox::Dimg => "Derived Image",
            KnownBox::Thmb => "Thumbnail",
            KnownBox::Auxl => "Auxiliary Image",
            KnownBox::Cdsc => "Content describes",
            KnownBox::Iprp => "Item Properties",
            KnownBox::Ipco => "Item Property Container",
            KnownBox::Ipma => "Item Properties Association",
            KnownBox::Pasp => "Pixel Aspect Ratio",
            KnownBox::Hvcc => "HEVC Decoder Configuration",
            KnownBox::Ispe => "Image Spatial Extents",
            KnownBox::Colr => "Colour Information",
            KnownBox::Pixi => "Pixel Information",
            KnownBox::Clap => "Clean Aperture",
            KnownBox::AuxC => "Auxiliary Type",
            KnownBox::Irot => "Image Rotation",
            KnownBox::Imir => "Image Mirroring",
            KnownBox::Unknown(_) => "Unknown Box",
        }
    }
}
