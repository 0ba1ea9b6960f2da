//! Raw NAND backend
//!
//! Partitions come from the board's static table and are measured in erase
//! blocks. Reads and writes go page by page; a block is erased right before
//! its first page is programmed.

use alloc::vec;

use super::{Storage, StorageError, StorageKind};
use crate::disk::partition::{PartitionRegion, PartitionTable};

/// Page-level NAND driver
pub trait NandFlash {
    type Error: core::fmt::Debug;

    /// Main-area bytes per page
    fn page_size(&self) -> u32;

    fn pages_per_block(&self) -> u32;

    /// True when the controller runs BCH ECC, which leaves more spare bytes
    /// free for file system tags
    fn uses_bch_ecc(&self) -> bool;

    fn read_page(&mut self, page: u32, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Program `data` (one full page) and `spare` (may be empty)
    fn write_page(&mut self, page: u32, data: &[u8], spare: &[u8]) -> Result<(), Self::Error>;

    fn erase_block(&mut self, block: u32) -> Result<(), Self::Error>;
}

/// NAND device plus its board partition table
pub struct FlashStorage<F: NandFlash> {
    nand: F,
    table: PartitionTable,
}

impl<F: NandFlash> FlashStorage<F> {
    pub fn new(nand: F, table: PartitionTable) -> Self {
        log::info!(
            "flash: page {} block {} pages, {} partitions",
            nand.page_size(),
            nand.pages_per_block(),
            table.count()
        );
        Self { nand, table }
    }

    pub fn nand(&self) -> &F {
        &self.nand
    }

    pub fn nand_mut(&mut self) -> &mut F {
        &mut self.nand
    }

    /// Bytes of spare area per page that image formats may carry
    pub fn spare_bytes(&self) -> u32 {
        let per_512 = if self.nand.uses_bch_ecc() { 20 } else { 16 };
        (self.nand.page_size() >> 9) * per_512
    }

    fn first_page(&self, part: &PartitionRegion) -> u64 {
        part.start * self.nand.pages_per_block() as u64
    }

    fn page_index(&self, part: &PartitionRegion, offset: u64) -> Result<u32, StorageError> {
        let page = self.nand.page_size() as u64;
        if offset % page != 0 {
            return Err(StorageError::Misaligned);
        }
        u32::try_from(self.first_page(part) + offset / page).map_err(|_| StorageError::OutOfBounds)
    }

    fn program(&mut self, page: u32, data: &[u8], spare: &[u8]) -> Result<(), StorageError> {
        let ppb = self.nand.pages_per_block();
        if page % ppb == 0 {
            self.nand.erase_block(page / ppb).map_err(|e| {
                log::error!("flash: erase block {} failed: {:?}", page / ppb, e);
                StorageError::Io
            })?;
        }
        self.nand.write_page(page, data, spare).map_err(|e| {
            log::error!("flash: write page {} failed: {:?}", page, e);
            StorageError::Io
        })
    }
}

impl<F: NandFlash> Storage for FlashStorage<F> {
    fn kind(&self) -> StorageKind {
        StorageKind::RawFlash
    }

    fn page_size(&self) -> u32 {
        self.nand.page_size()
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
            return Err(StorageError::OutOfBounds);
        }
        let page_size = self.nand.page_size() as usize;
        let mut page = self.page_index(part, offset)?;

        for chunk in dst.chunks_mut(page_size) {
            let result = if chunk.len() == page_size {
                self.nand.read_page(page, chunk)
            } else {
                let mut bounce = vec![0u8; page_size];
                self.nand.read_page(page, &mut bounce).map(|()| {
                    let n = chunk.len();
                    chunk.copy_from_slice(&bounce[..n]);
                })
            };
            result.map_err(|e| {
                log::error!("flash: read page {} failed: {:?}", page, e);
                StorageError::Io
            })?;
            page += 1;
        }
        Ok(())
    }

    /// The last page is padded with 0xff
    fn write(&mut self, part: &PartitionRegion, offset: u64, src: &[u8]) -> Result<(), StorageError> {
        let page_size = self.nand.page_size() as usize;
        let padded = (src.len() + page_size - 1) / page_size * page_size;
        if !part.contains(offset, padded as u64) {
            return Err(StorageError::OutOfBounds);
        }
        let mut page = self.page_index(part, offset)?;

        for chunk in src.chunks(page_size) {
            if chunk.len() == page_size {
                self.program(page, chunk, &[])?;
            } else {
                let mut last = vec![0xffu8; page_size];
                last[..chunk.len()].copy_from_slice(chunk);
                self.program(page, &last, &[])?;
            }
            page += 1;
        }
        Ok(())
    }

    fn erase(&mut self, part: &PartitionRegion) -> Result<(), StorageError> {
        for block in part.start..part.start + part.length {
            let block = u32::try_from(block).map_err(|_| StorageError::OutOfBounds)?;
            self.nand.erase_block(block).map_err(|e| {
                log::error!("flash: erase block {} failed: {:?}", block, e);
                StorageError::Io
            })?;
        }
        Ok(())
    }

    fn write_with_spare(
        &mut self,
        part: &PartitionRegion,
        extra_per_page: u32,
        src: &[u8],
    ) -> Result<(), StorageError> {
        let page_size = self.nand.page_size() as usize;
        let record = page_size + extra_per_page as usize;
        if src.len() % record != 0 {
            log::warn!("flash: image is not a whole number of {}-byte records", record);
            return Err(StorageError::Misaligned);
        }
        let pages = (src.len() / record) as u64;
        if !part.contains(0, pages * page_size as u64) {
            return Err(StorageError::OutOfBounds);
        }

        let mut page = self.page_index(part, 0)?;
        for rec in src.chunks_exact(record) {
            let (data, spare) = rec.split_at(page_size);
            self.program(page, data, spare)?;
            page += 1;
        }
        Ok(())
    }

    fn spare_per_page(&self) -> Option<u32> {
        Some(self.spare_bytes())
    }
}
