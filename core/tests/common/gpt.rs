//! Writes a primary GPT onto a memory device
//!
//! Also included by the persistent and bootloader test suites; each provides its
//! own `MemoryBlockDevice` with a public `data` buffer.

use super::MemoryBlockDevice;
use gpt_disk_io::{BlockIoAdapter, Disk};
use gpt_disk_types::{
    guid, BlockSize, GptHeader, GptPartitionEntryArray, GptPartitionName, GptPartitionType,
    LbaLe, U32Le,
};

pub struct GptBuilder {
    blocks: usize,
    partitions: Vec<(String, u64, u64)>,
}

impl GptBuilder {
    pub fn new(blocks: usize) -> Self {
        Self {
            blocks,
            partitions: Vec::new(),
        }
    }

    /// Add a partition covering `[start, start + len)` sectors
    pub fn partition(mut self, name: &str, start: u64, len: u64) -> Self {
        self.partitions.push((name.to_string(), start, len));
        self
    }

    pub fn build(&self) -> MemoryBlockDevice {
        let mut device = MemoryBlockDevice::new(self.blocks);
        self.write_to(&mut device);
        device
    }

    pub fn write_to(&self, device: &mut MemoryBlockDevice) {
        let num_blocks = self.blocks as u64;
        let mut header = GptHeader {
            my_lba: LbaLe::from_u64(1),
            alternate_lba: LbaLe::from_u64(num_blocks - 1),
            first_usable_lba: LbaLe::from_u64(34),
            last_usable_lba: LbaLe::from_u64(num_blocks - 34),
            disk_guid: guid!("5a1c0de5-0000-4000-8000-00000000d15c"),
            partition_entry_lba: LbaLe::from_u64(2),
            number_of_partition_entries: U32Le::from_u32(128),
            ..Default::default()
        };
        let layout = header.get_partition_entry_array_layout().unwrap();
        let mut entry_buf = vec![0u8; 128 * 128];
        let mut entries =
            GptPartitionEntryArray::new(layout, BlockSize::BS_512, &mut entry_buf).unwrap();

        for (i, (name, start, len)) in self.partitions.iter().enumerate() {
            let entry = entries.get_partition_entry_mut(i as u32).unwrap();
            entry.partition_type_guid =
                GptPartitionType(guid!("0fc63daf-8483-4772-8e79-3d69d8477de4"));
            entry.unique_partition_guid = guid!("0badcafe-0000-4000-8000-000000000000");
            entry.starting_lba = LbaLe::from_u64(*start);
            entry.ending_lba = LbaLe::from_u64(start + len - 1);
            let mut raw = [0u8; 72];
            for (j, unit) in name.encode_utf16().take(36).enumerate() {
                raw[j * 2..j * 2 + 2].copy_from_slice(&unit.to_le_bytes());
            }
            entry.name = GptPartitionName(raw);
        }

        header.partition_entry_array_crc32 = entries.calculate_crc32();
        header.update_header_crc32();

        let io = BlockIoAdapter::new(device.data.as_mut_slice(), BlockSize::BS_512);
        let mut disk = Disk::new(io).unwrap();
        disk.write_protective_mbr(&mut [0u8; 512]).unwrap();
        disk.write_primary_gpt_header(&header, &mut [0u8; 512])
            .unwrap();
        disk.write_gpt_partition_entry_array(&entries).unwrap();
        disk.flush().unwrap();
    }
}
