// GPT scanning using gpt-disk-rs

use core::fmt::Write;

use alloc::vec;

use super::GptError;
use crate::disk::partition::{PartitionRegion, PartitionTable, MAX_NAME_LEN};
use gpt_disk_io::{BlockIo, Disk};

/// Collects a UCS-2 partition name as UTF-8, dropping what doesn't fit
struct NameBuf {
    buf: [u8; MAX_NAME_LEN],
    len: usize,
}

impl Write for NameBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            let mut tmp = [0u8; 4];
            let enc = c.encode_utf8(&mut tmp);
            if self.len + enc.len() > MAX_NAME_LEN {
                break;
            }
            self.buf[self.len..self.len + enc.len()].copy_from_slice(enc.as_bytes());
            self.len += enc.len();
        }
        Ok(())
    }
}

impl NameBuf {
    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

/// Scan disk for GPT and populate partition table
///
/// Returns `Ok(false)` when the disk carries no readable GPT; the table is
/// left empty in that case.
pub fn scan_partitions<B: BlockIo>(
    block_io: B,
    partition_table: &mut PartitionTable,
) -> Result<bool, GptError> {
    partition_table.clear();

    let block_size = block_io.block_size().to_u32();
    let mut block_buf = vec![0u8; block_size as usize];

    // Create disk handle - if this fails, the disk may be inaccessible
    let mut disk = match Disk::new(block_io) {
        Ok(d) => d,
        Err(_) => return Ok(false),
    };

    let header = match disk.read_primary_gpt_header(&mut block_buf) {
        Ok(h) => h,
        Err(_) => return Ok(false), // No GPT is not an error
    };
    if !header.is_signature_valid() {
        return Ok(false);
    }

    let layout = match header.get_partition_entry_array_layout() {
        Ok(l) => l,
        Err(_) => return Err(GptError::InvalidHeader),
    };

    let iter = disk
        .gpt_partition_entry_array_iter(layout, &mut block_buf)
        .map_err(|_| GptError::IoError)?;

    for entry_result in iter {
        let entry = entry_result.map_err(|_| GptError::IoError)?;

        if !entry.is_used() {
            continue;
        }

        // Copy out of the entry to avoid unaligned references
        let name = entry.name;
        let mut name_buf = NameBuf {
            buf: [0; MAX_NAME_LEN],
            len: 0,
        };
        let _ = write!(name_buf, "{}", name);

        let start = entry.starting_lba.to_u64();
        let end = entry.ending_lba.to_u64();
        let region = PartitionRegion::new(
            name_buf.as_str(),
            start,
            end.saturating_sub(start) + 1,
            block_size,
            0,
        );
        log::debug!("gpt: {:?}", region);

        if partition_table.add_partition(region).is_err() {
            log::error!("gpt: partition table full");
            return Err(GptError::TableFull);
        }
    }

    Ok(true)
}
