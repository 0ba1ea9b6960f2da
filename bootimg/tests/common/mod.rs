//! Common test utilities and image builders

#![allow(dead_code)]

pub mod builder;
pub use builder::{BootImageBuilder, FdtBuilder, SparseBuilder};

/// Build a QCDT table page from `(platform, variant, soc_rev, offset, size)` rows
pub fn qcdt_page(page_size: usize, entries: &[(u32, u32, u32, u32, u32)]) -> Vec<u8> {
    let mut page = vec![0u8; page_size];
    page[0..4].copy_from_slice(b"QCDT");
    page[4..8].copy_from_slice(&1u32.to_le_bytes());
    page[8..12].copy_from_slice(&(entries.len() as u32).to_le_bytes());
    for (i, (platform, variant, rev, offset, size)) in entries.iter().enumerate() {
        let at = 12 + i * 20;
        for (j, word) in [platform, variant, rev, offset, size].iter().enumerate() {
            page[at + j * 4..at + j * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
    }
    page
}
