//! eMMC backend: record in the final sector of `aboot`

use alloc::vec;

use droidboot_core::{PartitionRegion, Storage};

use super::PersistenceBackend;
use crate::device_info::{DeviceInfoError, RECORD_SIZE};

pub const PARTITION: &str = "aboot";

/// Bytes reserved at the end of the partition
pub const TAIL_SIZE: u64 = 512;

pub struct AbootTail;

impl AbootTail {
    fn tail_offset(storage: &dyn Storage) -> Result<(PartitionRegion, u64), DeviceInfoError> {
        let part = storage.find(PARTITION)?;
        let offset = part
            .byte_len()
            .checked_sub(TAIL_SIZE)
            .ok_or(DeviceInfoError::PartitionTooSmall)?;
        Ok((part, offset))
    }
}

impl PersistenceBackend for AbootTail {
    fn load(
        &self,
        storage: &mut dyn Storage,
        record: &mut [u8; RECORD_SIZE],
    ) -> Result<(), DeviceInfoError> {
        let (part, offset) = Self::tail_offset(storage)?;
        let mut sector = vec![0u8; TAIL_SIZE as usize];
        storage.read(&part, offset, &mut sector)?;
        record.copy_from_slice(&sector[..RECORD_SIZE]);
        Ok(())
    }

    fn store(&self, storage: &mut dyn Storage, record: &[u8; RECORD_SIZE]) -> Result<(), DeviceInfoError> {
        let (part, offset) = Self::tail_offset(storage)?;
        let mut sector = vec![0u8; TAIL_SIZE as usize];
        sector[..RECORD_SIZE].copy_from_slice(record);
        storage.write(&part, offset, &sector)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "aboot tail"
    }
}
