use crate::boxes::FourCC;

/// Broad classification of a [`HeifError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed size/type framing, truncation, or a resource limit.
    Format,
    /// Reserved bits did not hold their fixed pattern (strict mode only).
    ReservedField,
    /// An item or correlation could not be resolved.
    UnresolvedReference,
    /// A structure the codec refuses to guess a layout for.
    UnsupportedConstruction,
    /// Bad caller-supplied options.
    Parameter,
    /// Missing or malformed HEVC NAL units.
    Hevc,
}

#[derive(thiserror::Error, Debug)]
pub enum HeifError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("box at offset {offset}: declared size {size} exceeds the {remaining} bytes left")]
    TruncatedBuffer { offset: u64, size: u64, remaining: u64 },
    #[error("box at offset {offset}: declared size {size} cannot hold the 8-byte header")]
    SizeTooSmall { offset: u64, size: u64 },
    #[error("box '{typ}' at offset {offset}: open-ended box is followed by another box")]
    OpenEndedNotLast { typ: FourCC, offset: u64 },
    #[error("box nesting exceeds {limit} levels at offset {offset}")]
    DepthExceeded { limit: usize, offset: u64 },
    #[error("input of {len} bytes exceeds the {limit}-byte limit")]
    InputTooLarge { len: usize, limit: usize },
    #[error("unexpected end of data at bit {bit}")]
    EndOfData { bit: u64 },
    #[error("'{typ}' at offset {offset}: reserved bits {found:#x}, expected {expected:#x}")]
    ReservedBitMismatch {
        typ: FourCC,
        offset: u64,
        found: u64,
        expected: u64,
    },
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("not implemented: {0}")]
    UnsupportedConstruction(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("hevc: {0}")]
    Hevc(String),
}

impl HeifError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeifError::Io(_)
            | HeifError::TruncatedBuffer { .. }
            | HeifError::SizeTooSmall { .. }
            | HeifError::OpenEndedNotLast { .. }
            | HeifError::DepthExceeded { .. }
            | HeifError::InputTooLarge { .. }
            | HeifError::EndOfData { .. } => ErrorKind::Format,
            HeifError::ReservedBitMismatch { .. } => ErrorKind::ReservedField,
            HeifError::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            HeifError::UnsupportedConstruction(_) => ErrorKind::UnsupportedConstruction,
            HeifError::InvalidParameter(_) => ErrorKind::Parameter,
            HeifError::Hevc(_) => ErrorKind::Hevc,
        }
    }
}

pub type Result<T> = std::result::Result<T, HeifError>;
