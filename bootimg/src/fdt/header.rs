//! Flattened device tree header

use super::FdtError;

/// FDT magic, big-endian on storage
pub const FDT_MAGIC: u32 = 0xd00d_feed;

/// Size of the version 17 header
pub const FDT_HEADER_SIZE: usize = 40;

/// Version emitted by [`super::Fdt::pack`]
pub const FDT_VERSION: u32 = 17;

/// Oldest version a packed blob stays compatible with
pub const FDT_LAST_COMP_VERSION: u32 = 16;

/// Decoded FDT header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    /// Blob size including every block
    pub totalsize: u32,
    /// Structure block offset
    pub off_dt_struct: u32,
    /// Strings block offset
    pub off_dt_strings: u32,
    /// Memory reservation map offset
    pub off_mem_rsvmap: u32,
    /// Format version
    pub version: u32,
    /// Lowest compatible version
    pub last_comp_version: u32,
    /// Boot CPU id
    pub boot_cpuid_phys: u32,
    /// Strings block length
    pub size_dt_strings: u32,
    /// Structure block length
    pub size_dt_struct: u32,
}

pub(crate) fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

impl FdtHeader {
    /// Decode and sanity check the header of `blob`
    ///
    /// Every block must lie inside `totalsize`, and `totalsize` inside `blob`.
    pub fn parse(blob: &[u8]) -> Result<Self, FdtError> {
        if blob.len() < FDT_HEADER_SIZE {
            return Err(FdtError::Truncated);
        }
        if be_u32(blob, 0) != FDT_MAGIC {
            return Err(FdtError::BadMagic);
        }

        let header = Self {
            totalsize: be_u32(blob, 4),
            off_dt_struct: be_u32(blob, 8),
            off_dt_strings: be_u32(blob, 12),
            off_mem_rsvmap: be_u32(blob, 16),
            version: be_u32(blob, 20),
            last_comp_version: be_u32(blob, 24),
            boot_cpuid_phys: be_u32(blob, 28),
            size_dt_strings: be_u32(blob, 32),
            size_dt_struct: be_u32(blob, 36),
        };

        if header.version < FDT_LAST_COMP_VERSION || header.last_comp_version > FDT_VERSION {
            return Err(FdtError::BadVersion);
        }

        let total = header.totalsize as u64;
        if total > blob.len() as u64 || total < FDT_HEADER_SIZE as u64 {
            return Err(FdtError::Truncated);
        }
        let struct_end = header.off_dt_struct as u64 + header.size_dt_struct as u64;
        let strings_end = header.off_dt_strings as u64 + header.size_dt_strings as u64;
        if struct_end > total
            || strings_end > total
            || header.off_mem_rsvmap as u64 >= total
            || header.off_dt_struct % 4 != 0
        {
            return Err(FdtError::BadLayout);
        }

        Ok(header)
    }

    pub(crate) fn write(&self, out: &mut [u8]) {
        let words = [
            FDT_MAGIC,
            self.totalsize,
            self.off_dt_struct,
            self.off_dt_strings,
            self.off_mem_rsvmap,
            self.version,
            self.last_comp_version,
            self.boot_cpuid_phys,
            self.size_dt_strings,
            self.size_dt_struct,
        ];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_be_bytes());
        }
    }
}
