//! Storage backends
//!
//! The boot pipeline reads and writes partitions through [`Storage`] and
//! never learns which medium is underneath beyond [`StorageKind`], which it
//! needs for the few places where eMMC and raw NAND behave differently
//! (page-size adoption, command line hints, spare bytes, erase semantics).

pub mod block;
pub mod flash;

use core::fmt;

use crate::disk::partition::{PartitionRegion, PartitionTable};

pub use block::BlockStorage;
pub use flash::{FlashStorage, NandFlash};

/// Medium behind a [`Storage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Managed block device (eMMC, SD)
    Block,
    /// Raw NAND with out-of-band spare bytes
    RawFlash,
}

/// Errors from storage access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No partition with the requested name
    PartitionNotFound,
    /// Access runs past the end of the partition or device
    OutOfBounds,
    /// Offset or length violates the medium's alignment rules
    Misaligned,
    /// The driver reported a failure
    Io,
    /// Operation is not available on this medium
    Unsupported,
    /// Partition registry is full
    TableFull,
    /// Data handed to a GPT rewrite has no GPT header
    InvalidGpt,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartitionNotFound => write!(f, "partition table doesn't exist"),
            Self::OutOfBounds => write!(f, "access beyond end of partition"),
            Self::Misaligned => write!(f, "unaligned access"),
            Self::Io => write!(f, "storage i/o error"),
            Self::Unsupported => write!(f, "not supported on this storage"),
            Self::TableFull => write!(f, "partition table full"),
            Self::InvalidGpt => write!(f, "no valid gpt in image"),
        }
    }
}

/// Byte-addressed partition access
///
/// Offsets are relative to the start of the partition. Implementations must
/// refuse any access that would leave the partition.
pub trait Storage {
    fn kind(&self) -> StorageKind;

    /// Page size images on this medium are packed with
    fn page_size(&self) -> u32;

    fn partitions(&self) -> &PartitionTable;

    fn read(&mut self, part: &PartitionRegion, offset: u64, dst: &mut [u8])
        -> Result<(), StorageError>;

    fn write(&mut self, part: &PartitionRegion, offset: u64, src: &[u8])
        -> Result<(), StorageError>;

    /// Make the partition read back as empty
    fn erase(&mut self, part: &PartitionRegion) -> Result<(), StorageError>;

    /// Write `src` laid out as `page_size + extra_per_page` records, the tail
    /// of each record going to the page's spare area
    fn write_with_spare(
        &mut self,
        _part: &PartitionRegion,
        _extra_per_page: u32,
        _src: &[u8],
    ) -> Result<(), StorageError> {
        Err(StorageError::Unsupported)
    }

    /// Spare bytes per page that flashed images carry, raw flash only
    fn spare_per_page(&self) -> Option<u32> {
        None
    }

    /// Replace the on-disk partition table with `image` and reload the registry
    fn write_partition_table(&mut self, _image: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Unsupported)
    }

    /// Copy of the partition called `name`
    fn find(&self, name: &str) -> Result<PartitionRegion, StorageError> {
        self.partitions()
            .find(name)
            .copied()
            .ok_or(StorageError::PartitionNotFound)
    }

    fn is_block(&self) -> bool {
        self.kind() == StorageKind::Block
    }
}
