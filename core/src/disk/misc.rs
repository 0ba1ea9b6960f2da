//! Regions of the `misc` partition
//!
//! ```text
//! 0x00000  boot reason      16K   boot-mode message
//! 0x04000  switch control   16K
//! 0x08000  log              16K
//! 0x0c000  cpr               4K   CPR status record
//! 0x0d000  reserve         972K
//! 0x100000 end
//! ```
//!
//! Every access must start and end on a storage page boundary.

use core::fmt;

use crate::storage::{Storage, StorageError};

/// Partition holding the regions
pub const MISC_PARTITION: &str = "misc";

const SZ_BOOT_REASON: u64 = 0x4000;
const SZ_SWITCH_CTL: u64 = 0x4000;
const SZ_LOG: u64 = 0x4000;
const SZ_CPR: u64 = 0x1000;
const SZ_RESERVE: u64 = 0xF3000;

/// Total bytes laid out by [`MiscRegion`]
pub const SZ_MISC_TOTAL: u64 = 0x10_0000;

const _: () = assert!(SZ_BOOT_REASON + SZ_SWITCH_CTL + SZ_LOG + SZ_CPR + SZ_RESERVE == SZ_MISC_TOTAL);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscRegion {
    BootReason,
    SwitchControl,
    Log,
    Cpr,
    Reserve,
}

impl MiscRegion {
    /// Offset from the start of `misc`
    pub const fn offset(self) -> u64 {
        match self {
            Self::BootReason => 0,
            Self::SwitchControl => SZ_BOOT_REASON,
            Self::Log => SZ_BOOT_REASON + SZ_SWITCH_CTL,
            Self::Cpr => SZ_BOOT_REASON + SZ_SWITCH_CTL + SZ_LOG,
            Self::Reserve => SZ_BOOT_REASON + SZ_SWITCH_CTL + SZ_LOG + SZ_CPR,
        }
    }

    pub const fn size(self) -> u64 {
        match self {
            Self::BootReason => SZ_BOOT_REASON,
            Self::SwitchControl => SZ_SWITCH_CTL,
            Self::Log => SZ_LOG,
            Self::Cpr => SZ_CPR,
            Self::Reserve => SZ_RESERVE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscError {
    /// Offset or length is not a whole number of pages
    Misaligned,
    /// Access leaves the region
    OutOfRegion,
    Storage(StorageError),
}

impl From<StorageError> for MiscError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for MiscError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned => write!(f, "offset & sz should be page aligned"),
            Self::OutOfRegion => write!(f, "offset & sz exceeded the misc region"),
            Self::Storage(e) => write!(f, "misc: {}", e),
        }
    }
}

fn check<S: Storage + ?Sized>(
    storage: &S,
    region: MiscRegion,
    offset: u64,
    len: usize,
) -> Result<u64, MiscError> {
    let page = storage.page_size() as u64;
    if page == 0 || offset % page != 0 || len as u64 % page != 0 {
        return Err(MiscError::Misaligned);
    }
    match offset.checked_add(len as u64) {
        Some(end) if end <= region.size() => Ok(region.offset() + offset),
        _ => Err(MiscError::OutOfRegion),
    }
}

/// Read `buf.len()` bytes at `offset` inside `region`
pub fn read_region<S: Storage + ?Sized>(
    storage: &mut S,
    region: MiscRegion,
    offset: u64,
    buf: &mut [u8],
) -> Result<(), MiscError> {
    let at = check(storage, region, offset, buf.len())?;
    let part = storage.find(MISC_PARTITION)?;
    storage.read(&part, at, buf)?;
    Ok(())
}

/// Write `buf` at `offset` inside `region`
pub fn write_region<S: Storage + ?Sized>(
    storage: &mut S,
    region: MiscRegion,
    offset: u64,
    buf: &[u8],
) -> Result<(), MiscError> {
    let at = check(storage, region, offset, buf.len())?;
    let part = storage.find(MISC_PARTITION)?;
    storage.write(&part, at, buf)?;
    Ok(())
}

/// First good-flag word of [`CprStatus`]
pub const CPR_FLAG0: u32 = 0x900d_f1a9;
/// Second flag word, "CPRE"
pub const CPR_FLAG1: u32 = 0x4552_5043;

/// CPR (core power reduction) setting persisted for the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CprStatus {
    pub flag: [u32; 2],
    pub status: u32,
    pub reserve: u32,
}

impl CprStatus {
    pub const ENCODED_SIZE: usize = 16;

    pub const fn new(enabled: bool) -> Self {
        Self {
            flag: [CPR_FLAG0, CPR_FLAG1],
            status: enabled as u32,
            reserve: 0,
        }
    }

    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() < Self::ENCODED_SIZE {
            return None;
        }
        let word = |i: usize| {
            u32::from_le_bytes([raw[i * 4], raw[i * 4 + 1], raw[i * 4 + 2], raw[i * 4 + 3]])
        };
        Some(Self {
            flag: [word(0), word(1)],
            status: word(2),
            reserve: word(3),
        })
    }

    pub fn encode(&self, out: &mut [u8]) {
        let words = [self.flag[0], self.flag[1], self.status, self.reserve];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
    }

    /// Both flags match and the status is 0 or 1
    pub fn is_valid(&self) -> bool {
        self.flag == [CPR_FLAG0, CPR_FLAG1] && self.status <= 1
    }

    /// `Some(enabled)` for a valid record
    pub fn enabled(&self) -> Option<bool> {
        self.is_valid().then_some(self.status == 1)
    }
}

/// Marks a boot-reason page written by the factory test app
pub const BOOT_MODE_MAGIC: u32 = 0x444d_4f42;

/// Boot mode requested through the boot-reason region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootModeMessage {
    pub magic: u32,
    pub boot_mode: u32,
}

impl BootModeMessage {
    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() < 8 {
            return None;
        }
        Some(Self {
            magic: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            boot_mode: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }

    pub fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.boot_mode.to_le_bytes());
    }

    /// Requested mode, if the message carries the magic
    pub fn requested(&self) -> Option<u32> {
        (self.magic == BOOT_MODE_MAGIC).then_some(self.boot_mode)
    }
}
