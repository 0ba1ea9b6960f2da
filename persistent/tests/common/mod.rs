//! Common test utilities and mock storage devices

#![allow(dead_code)]

#[path = "../../../core/tests/common/gpt.rs"]
pub mod gpt;
pub use gpt::GptBuilder;

use droidboot_core::storage::NandFlash;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use std::io;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    /// Zero-filled device of `blocks` 512-byte sectors
    pub fn new(blocks: usize) -> Self {
        Self {
            data: vec![0u8; blocks * 512],
            block_size: 512,
        }
    }

    fn range(&self, lba: Lba, len: usize) -> io::Result<std::ops::Range<usize>> {
        let start = lba.0 as usize * self.block_size;
        if len % self.block_size != 0 || start + len > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad block range"));
        }
        Ok(start..start + len)
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).unwrap()
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(start_lba, dst.len())?;
        dst.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(start_lba, src.len())?;
        self.data[range].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// In-memory NAND with per-page spare areas
#[derive(Debug, Clone)]
pub struct MemoryNand {
    pub page_size: u32,
    pub pages_per_block: u32,
    pub bch: bool,
    pub pages: Vec<Vec<u8>>,
    pub spare: Vec<Vec<u8>>,
    pub erased_blocks: Vec<u32>,
}

impl MemoryNand {
    pub fn new(page_size: u32, pages_per_block: u32, blocks: u32) -> Self {
        let count = (pages_per_block * blocks) as usize;
        Self {
            page_size,
            pages_per_block,
            bch: false,
            pages: vec![vec![0xff; page_size as usize]; count],
            spare: vec![Vec::new(); count],
            erased_blocks: Vec::new(),
        }
    }

    pub fn block_bytes(&self) -> u32 {
        self.page_size * self.pages_per_block
    }
}

impl NandFlash for MemoryNand {
    type Error = &'static str;

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn pages_per_block(&self) -> u32 {
        self.pages_per_block
    }

    fn uses_bch_ecc(&self) -> bool {
        self.bch
    }

    fn read_page(&mut self, page: u32, data: &mut [u8]) -> Result<(), Self::Error> {
        let src = self.pages.get(page as usize).ok_or("page out of range")?;
        data.copy_from_slice(src);
        Ok(())
    }

    fn write_page(&mut self, page: u32, data: &[u8], spare: &[u8]) -> Result<(), Self::Error> {
        let dst = self.pages.get_mut(page as usize).ok_or("page out of range")?;
        if dst.iter().any(|&b| b != 0xff) {
            return Err("programming a page that was not erased");
        }
        dst.copy_from_slice(data);
        self.spare[page as usize] = spare.to_vec();
        Ok(())
    }

    fn erase_block(&mut self, block: u32) -> Result<(), Self::Error> {
        let first = (block * self.pages_per_block) as usize;
        let last = first + self.pages_per_block as usize;
        if last > self.pages.len() {
            return Err("block out of range");
        }
        for page in first..last {
            self.pages[page].fill(0xff);
            self.spare[page].clear();
        }
        self.erased_blocks.push(block);
        Ok(())
    }
}
