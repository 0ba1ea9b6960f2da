//! Block device (eMMC) backend

use alloc::vec;
use alloc::vec::Vec;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use super::{Storage, StorageError, StorageKind};
use crate::disk::gpt_ops::{scan_partitions, GptError};
use crate::disk::partition::{PartitionRegion, PartitionTable};

/// Boot images on eMMC are packed with 2 KiB pages unless the header says
/// otherwise
pub const EMMC_PAGE_SIZE: u32 = 2048;

/// Bytes zeroed by [`BlockStorage::erase`]
pub const ERASE_SPAN: usize = 8 * 512;

/// Lends a device to `gpt_disk_io::Disk`, which wants its I/O by value
struct Borrowed<'a, B>(&'a mut B);

impl<B: BlockIo> BlockIo for Borrowed<'_, B> {
    type Error = B::Error;

    fn block_size(&self) -> BlockSize {
        self.0.block_size()
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        self.0.num_blocks()
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        self.0.read_blocks(start_lba, dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        self.0.write_blocks(start_lba, src)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.flush()
    }
}

/// Partitioned block device
pub struct BlockStorage<B: BlockIo> {
    io: B,
    table: PartitionTable,
    block_size: usize,
    num_blocks: u64,
}

impl<B: BlockIo> BlockStorage<B> {
    /// Wrap `io` and load its GPT into the registry
    ///
    /// A disk without a GPT is accepted with an empty registry.
    pub fn new(mut io: B) -> Result<Self, StorageError> {
        let block_size = io.block_size().to_u32() as usize;
        let num_blocks = io.num_blocks().map_err(|e| {
            log::error!("block: num_blocks failed: {}", e);
            StorageError::Io
        })?;

        let mut storage = Self {
            io,
            table: PartitionTable::new(),
            block_size,
            num_blocks,
        };
        storage.rescan()?;
        Ok(storage)
    }

    /// Reload the registry from the primary GPT
    pub fn rescan(&mut self) -> Result<(), StorageError> {
        match scan_partitions(Borrowed(&mut self.io), &mut self.table) {
            Ok(true) => {
                log::info!("block: {} partitions", self.table.count());
                Ok(())
            }
            Ok(false) => {
                log::warn!("block: no gpt found");
                Ok(())
            }
            Err(GptError::TableFull) => Err(StorageError::TableFull),
            Err(_) => Err(StorageError::Io),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Device size in bytes
    pub fn capacity(&self) -> u64 {
        self.num_blocks * self.block_size as u64
    }

    pub fn into_inner(self) -> B {
        self.io
    }

    /// Read from an absolute byte offset, splitting unaligned edges through
    /// a one-block bounce buffer
    fn read_at(&mut self, mut pos: u64, mut dst: &mut [u8]) -> Result<(), StorageError> {
        let bs = self.block_size as u64;
        let mut bounce: Vec<u8> = Vec::new();

        while !dst.is_empty() {
            let lba = pos / bs;
            let within = (pos % bs) as usize;

            if within == 0 && dst.len() >= self.block_size {
                let whole = dst.len() - dst.len() % self.block_size;
                let (head, rest) = core::mem::take(&mut dst).split_at_mut(whole);
                self.io.read_blocks(Lba(lba), head).map_err(|e| {
                    log::error!("block: read lba {} failed: {}", lba, e);
                    StorageError::Io
                })?;
                pos += whole as u64;
                dst = rest;
                continue;
            }

            if bounce.is_empty() {
                bounce = vec![0u8; self.block_size];
            }
            self.io.read_blocks(Lba(lba), &mut bounce).map_err(|e| {
                log::error!("block: read lba {} failed: {}", lba, e);
                StorageError::Io
            })?;
            let n = (self.block_size - within).min(dst.len());
            let (head, rest) = core::mem::take(&mut dst).split_at_mut(n);
            head.copy_from_slice(&bounce[within..within + n]);
            pos += n as u64;
            dst = rest;
        }
        Ok(())
    }

    /// Write at an absolute byte offset; partial blocks are read back first
    fn write_at(&mut self, mut pos: u64, mut src: &[u8]) -> Result<(), StorageError> {
        let bs = self.block_size as u64;
        let mut bounce: Vec<u8> = Vec::new();

        while !src.is_empty() {
            let lba = pos / bs;
            let within = (pos % bs) as usize;

            if within == 0 && src.len() >= self.block_size {
                let whole = src.len() - src.len() % self.block_size;
                let (head, rest) = src.split_at(whole);
                self.io.write_blocks(Lba(lba), head).map_err(|e| {
                    log::error!("block: write lba {} failed: {}", lba, e);
                    StorageError::Io
                })?;
                pos += whole as u64;
                src = rest;
                continue;
            }

            if bounce.is_empty() {
                bounce = vec![0u8; self.block_size];
            }
            self.io
                .read_blocks(Lba(lba), &mut bounce)
                .map_err(|_| StorageError::Io)?;
            let n = (self.block_size - within).min(src.len());
            let (head, rest) = src.split_at(n);
            bounce[within..within + n].copy_from_slice(head);
            self.io.write_blocks(Lba(lba), &bounce).map_err(|e| {
                log::error!("block: write lba {} failed: {}", lba, e);
                StorageError::Io
            })?;
            pos += n as u64;
            src = rest;
        }

        self.io.flush().map_err(|_| StorageError::Io)
    }
}

impl<B: BlockIo> Storage for BlockStorage<B> {
    fn kind(&self) -> StorageKind {
        StorageKind::Block
    }

    fn page_size(&self) -> u32 {
        EMMC_PAGE_SIZE
    }

    fn partitions(&self) -> &PartitionTable {
        &self.table
    }

    fn read(
        &mut self,
        part: &PartitionRegion,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<(), StorageError> {
        if !part.contains(offset, dst.len() as u64) {
            log::warn!(
                "block: read {}+{} past end of {}",
                offset,
                dst.len(),
                part.name()
            );
            return Err(StorageError::OutOfBounds);
        }
        self.read_at(part.byte_offset() + offset, dst)
    }

    fn write(&mut self, part: &PartitionRegion, offset: u64, src: &[u8]) -> Result<(), StorageError> {
        if !part.contains(offset, src.len() as u64) {
            log::warn!(
                "block: write {}+{} past end of {}",
                offset,
                src.len(),
                part.name()
            );
            return Err(StorageError::OutOfBounds);
        }
        self.write_at(part.byte_offset() + offset, src)
    }

    /// Zeroes the first [`ERASE_SPAN`] bytes, enough to invalidate any
    /// filesystem superblock or boot image header
    fn erase(&mut self, part: &PartitionRegion) -> Result<(), StorageError> {
        let span = (ERASE_SPAN as u64).min(part.byte_len()) as usize;
        let zeroes = vec![0u8; span];
        self.write(part, 0, &zeroes)
    }

    fn write_partition_table(&mut self, image: &[u8]) -> Result<(), StorageError> {
        let bs = self.block_size;
        if image.len() < 2 * bs || &image[bs..bs + 8] != b"EFI PART" {
            return Err(StorageError::InvalidGpt);
        }
        if image.len() as u64 > self.capacity() {
            return Err(StorageError::OutOfBounds);
        }
        self.write_at(0, image)?;
        self.rescan()
    }
}
