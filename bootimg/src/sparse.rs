//! Android sparse image format
//!
//! ```text
//! file header (28 bytes, or more if file_hdr_sz says so)
//! chunk header (12 bytes) + payload
//! chunk header (12 bytes) + payload
//! ...
//! ```
//!
//! Only parsing lives here. Writing chunks out to a partition is the flashing
//! code's job since it depends on the storage backend.

use crate::error::{BootImageError, Result};
use crate::header::le_u32;

/// Sparse file magic
pub const SPARSE_MAGIC: u32 = 0xed26_ff3a;

/// Supported major version
pub const SPARSE_MAJOR_VERSION: u16 = 1;

/// Minimum file header size
pub const SPARSE_HEADER_SIZE: usize = 28;

/// Minimum chunk header size
pub const CHUNK_HEADER_SIZE: usize = 12;

/// Raw data chunk
pub const CHUNK_TYPE_RAW: u16 = 0xCAC1;
/// Fill chunk, payload is a 4-byte pattern
pub const CHUNK_TYPE_FILL: u16 = 0xCAC2;
/// Skip chunk, no payload
pub const CHUNK_TYPE_DONT_CARE: u16 = 0xCAC3;
/// CRC32 chunk, optional 4-byte payload
pub const CHUNK_TYPE_CRC32: u16 = 0xCAC4;

fn le_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Sparse file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseHeader {
    /// Major format version
    pub major_version: u16,
    /// Minor format version
    pub minor_version: u16,
    /// Declared file header length
    pub file_hdr_sz: u16,
    /// Declared chunk header length
    pub chunk_hdr_sz: u16,
    /// Output block size in bytes
    pub blk_sz: u32,
    /// Output blocks the image expands to
    pub total_blks: u32,
    /// Chunks following the header
    pub total_chunks: u32,
    /// CRC32 of the expanded image (not checked)
    pub image_checksum: u32,
}

impl SparseHeader {
    /// Decode and validate a file header
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < SPARSE_HEADER_SIZE {
            return Err(BootImageError::BufferTooSmall);
        }
        if le_u32(data, 0) != SPARSE_MAGIC {
            return Err(BootImageError::BadSparseMagic);
        }

        let header = Self {
            major_version: le_u16(data, 4),
            minor_version: le_u16(data, 6),
            file_hdr_sz: le_u16(data, 8),
            chunk_hdr_sz: le_u16(data, 10),
            blk_sz: le_u32(data, 12),
            total_blks: le_u32(data, 16),
            total_chunks: le_u32(data, 20),
            image_checksum: le_u32(data, 24),
        };

        if header.major_version != SPARSE_MAJOR_VERSION {
            return Err(BootImageError::UnsupportedSparseVersion);
        }
        if (header.file_hdr_sz as usize) < SPARSE_HEADER_SIZE
            || (header.chunk_hdr_sz as usize) < CHUNK_HEADER_SIZE
            || header.blk_sz == 0
            || header.blk_sz % 4 != 0
        {
            return Err(BootImageError::BadSparseHeaderSize);
        }
        log::trace!(
            "sparse: v{}.{} blk_sz {} total_blks {} chunks {}",
            header.major_version,
            header.minor_version,
            header.blk_sz,
            header.total_blks,
            header.total_chunks
        );
        Ok(header)
    }

    /// Size of the expanded image in bytes
    pub fn expanded_size(&self) -> u64 {
        self.total_blks as u64 * self.blk_sz as u64
    }
}

/// Kind of a sparse chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Payload is copied verbatim
    Raw,
    /// Output blocks are filled with a 4-byte pattern
    Fill(u32),
    /// Output blocks are skipped
    DontCare,
    /// Checksum over the data so far, no output
    Crc32,
}

/// A validated chunk borrowed from the image buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseChunk<'a> {
    /// Chunk kind
    pub kind: ChunkKind,
    /// Output blocks covered by this chunk
    pub blocks: u32,
    /// Chunk payload (empty unless `Raw`, `Fill` or a CRC with a value)
    pub data: &'a [u8],
}

impl SparseChunk<'_> {
    /// Output bytes covered by the chunk
    pub fn output_len(&self, blk_sz: u32) -> u64 {
        self.blocks as u64 * blk_sz as u64
    }
}

/// A sparse image held in memory
#[derive(Debug, Clone, Copy)]
pub struct SparseImage<'a> {
    header: SparseHeader,
    data: &'a [u8],
}

impl<'a> SparseImage<'a> {
    /// Wrap `data` after validating the file header
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = SparseHeader::parse(data)?;
        if data.len() < header.file_hdr_sz as usize {
            return Err(BootImageError::BufferTooSmall);
        }
        Ok(Self { header, data })
    }

    /// File header
    pub fn header(&self) -> &SparseHeader {
        &self.header
    }

    /// Iterate over the chunks, stopping after the first malformed one
    pub fn chunks(&self) -> Chunks<'a> {
        Chunks {
            data: self.data,
            pos: self.header.file_hdr_sz as usize,
            remaining: self.header.total_chunks,
            chunk_hdr_sz: self.header.chunk_hdr_sz as usize,
            blk_sz: self.header.blk_sz,
            failed: false,
        }
    }
}

/// True when `data` starts with the sparse magic
pub fn is_sparse(data: &[u8]) -> bool {
    data.len() >= SPARSE_HEADER_SIZE && le_u32(data, 0) == SPARSE_MAGIC
}

/// Iterator over the chunks of a [`SparseImage`]
pub struct Chunks<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: u32,
    chunk_hdr_sz: usize,
    blk_sz: u32,
    failed: bool,
}

impl<'a> Chunks<'a> {
    fn next_chunk(&mut self) -> Result<SparseChunk<'a>> {
        let header_end = self
            .pos
            .checked_add(self.chunk_hdr_sz)
            .ok_or(BootImageError::TruncatedChunk)?;
        if header_end > self.data.len() {
            return Err(BootImageError::TruncatedChunk);
        }

        let raw = &self.data[self.pos..];
        let chunk_type = le_u16(raw, 0);
        let blocks = le_u32(raw, 4);
        let total_sz = le_u32(raw, 8) as u64;
        let payload_len = total_sz
            .checked_sub(self.chunk_hdr_sz as u64)
            .ok_or(BootImageError::BogusChunkSize)?;

        let kind = match chunk_type {
            CHUNK_TYPE_RAW => {
                if payload_len != blocks as u64 * self.blk_sz as u64 {
                    return Err(BootImageError::BogusChunkSize);
                }
                ChunkKind::Raw
            }
            CHUNK_TYPE_FILL => {
                if payload_len != 4 {
                    return Err(BootImageError::BogusChunkSize);
                }
                ChunkKind::Fill(0)
            }
            CHUNK_TYPE_DONT_CARE => {
                if payload_len != 0 {
                    return Err(BootImageError::BogusChunkSize);
                }
                ChunkKind::DontCare
            }
            CHUNK_TYPE_CRC32 => {
                if payload_len != 0 && payload_len != 4 {
                    return Err(BootImageError::BogusChunkSize);
                }
                ChunkKind::Crc32
            }
            _ => return Err(BootImageError::UnknownChunkType),
        };

        let payload_len =
            usize::try_from(payload_len).map_err(|_| BootImageError::TruncatedChunk)?;
        let end = header_end
            .checked_add(payload_len)
            .ok_or(BootImageError::TruncatedChunk)?;
        if end > self.data.len() {
            return Err(BootImageError::TruncatedChunk);
        }
        let data = &self.data[header_end..end];
        self.pos = end;

        let kind = match kind {
            ChunkKind::Fill(_) => ChunkKind::Fill(le_u32(data, 0)),
            other => other,
        };
        let blocks = if kind == ChunkKind::Crc32 { 0 } else { blocks };

        Ok(SparseChunk { kind, blocks, data })
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<SparseChunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let chunk = self.next_chunk();
        if chunk.is_err() {
            self.failed = true;
        }
        Some(chunk)
    }
}
