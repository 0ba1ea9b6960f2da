//! Error types for boot image parsing

use core::fmt;

/// Result type for boot image operations
pub type Result<T> = core::result::Result<T, BootImageError>;

/// Errors that can occur while decoding boot image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootImageError {
    /// Buffer is shorter than the structure being decoded
    BufferTooSmall,

    /// Boot image magic does not read "ANDROID!"
    BadMagic,

    /// Page size is zero or not a power of two
    InvalidPageSize,

    /// Payloads do not fit in the space the image lives in
    ImageTooLarge,

    /// Device tree table magic is not "QCDT"
    BadDtMagic,

    /// Device tree table version is not supported
    UnsupportedDtVersion,

    /// Device tree table entries do not fit in one page
    DtTableTooLarge,

    /// Device tree entry points outside the dt payload
    DtEntryOutOfBounds,

    /// Sparse image magic mismatch
    BadSparseMagic,

    /// Sparse image major version is not supported
    UnsupportedSparseVersion,

    /// Sparse header or chunk header length is shorter than the format minimum
    BadSparseHeaderSize,

    /// Chunk total size disagrees with its type and block count
    BogusChunkSize,

    /// Unknown chunk type
    UnknownChunkType,

    /// Chunk data runs past the end of the buffer
    TruncatedChunk,
}

impl fmt::Display for BootImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::BadMagic => write!(f, "invalid boot image header"),
            Self::InvalidPageSize => write!(f, "invalid page size"),
            Self::ImageTooLarge => write!(f, "image larger than its container"),
            Self::BadDtMagic => write!(f, "invalid device tree table magic"),
            Self::UnsupportedDtVersion => write!(f, "unsupported device tree table version"),
            Self::DtTableTooLarge => write!(f, "device tree table exceeds one page"),
            Self::DtEntryOutOfBounds => write!(f, "device tree entry out of bounds"),
            Self::BadSparseMagic => write!(f, "not a sparse image"),
            Self::UnsupportedSparseVersion => write!(f, "unsupported sparse image version"),
            Self::BadSparseHeaderSize => write!(f, "invalid sparse header size"),
            Self::BogusChunkSize => write!(f, "bogus chunk size"),
            Self::UnknownChunkType => write!(f, "unknown chunk type"),
            Self::TruncatedChunk => write!(f, "truncated chunk"),
        }
    }
}
