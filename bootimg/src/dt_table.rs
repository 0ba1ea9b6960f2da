//! QCDT device tree table
//!
//! Multi-board boot images carry one device tree blob per supported board. A
//! table at the start of the dt payload maps `(platform_id, variant_id,
//! soc_rev)` to the blob's location inside the image.

use alloc::vec::Vec;

use crate::error::{BootImageError, Result};
use crate::header::le_u32;

/// Table magic, "QCDT"
pub const DT_MAGIC: &[u8; 4] = b"QCDT";

/// Only supported table version
pub const DT_VERSION: u32 = 1;

/// magic + version + num_entries
pub const DT_HEADER_SIZE: usize = 12;

/// platform_id + variant_id + soc_rev + offset + size
pub const DT_ENTRY_SIZE: usize = 20;

/// One board's device tree blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtEntry {
    /// Platform id the blob was built for
    pub platform_id: u32,
    /// Hardware variant id
    pub variant_id: u32,
    /// SoC revision, 0 for "any"
    pub soc_rev: u32,
    /// Byte offset of the blob from the start of the boot image
    pub offset: u32,
    /// Blob size in bytes
    pub size: u32,
}

impl DtEntry {
    /// First byte past the blob
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

/// Decoded QCDT table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtTable {
    /// Table format version
    pub version: u32,
    /// Entries in storage order
    pub entries: Vec<DtEntry>,
}

impl DtTable {
    /// Parse the table from the first page of the dt payload
    ///
    /// Magic and version are checked independently. The header plus every
    /// entry must fit in `page_size` bytes.
    pub fn parse(page: &[u8], page_size: usize) -> Result<Self> {
        if page.len() < DT_HEADER_SIZE {
            return Err(BootImageError::BufferTooSmall);
        }
        if &page[..4] != DT_MAGIC {
            return Err(BootImageError::BadDtMagic);
        }
        let version = le_u32(page, 4);
        if version != DT_VERSION {
            return Err(BootImageError::UnsupportedDtVersion);
        }

        let num_entries = le_u32(page, 8) as usize;
        let table_len = num_entries
            .checked_mul(DT_ENTRY_SIZE)
            .and_then(|n| n.checked_add(DT_HEADER_SIZE))
            .ok_or(BootImageError::DtTableTooLarge)?;
        if table_len > page_size || table_len > page.len() {
            return Err(BootImageError::DtTableTooLarge);
        }

        let entries = page[DT_HEADER_SIZE..table_len]
            .chunks_exact(DT_ENTRY_SIZE)
            .map(|raw| DtEntry {
                platform_id: le_u32(raw, 0),
                variant_id: le_u32(raw, 4),
                soc_rev: le_u32(raw, 8),
                offset: le_u32(raw, 12),
                size: le_u32(raw, 16),
            })
            .collect();

        Ok(Self { version, entries })
    }

    /// First entry matching the board with `soc_rev == 0`
    pub fn select(&self, platform_id: u32, variant_id: u32) -> Option<&DtEntry> {
        let found = self.entries.iter().find(|e| {
            e.platform_id == platform_id && e.variant_id == variant_id && e.soc_rev == 0
        });
        match found {
            Some(e) => log::debug!(
                "qcdt: platform {} variant {} -> offset {:#x} size {}",
                platform_id,
                variant_id,
                e.offset,
                e.size
            ),
            None => log::debug!(
                "qcdt: no entry for platform {} variant {} among {}",
                platform_id,
                variant_id,
                self.entries.len()
            ),
        }
        found
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table lists no blobs
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
