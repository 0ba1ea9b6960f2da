//! Raw NAND backend: record at the start of the `devinfo` partition

use alloc::vec;

use droidboot_core::Storage;

use super::PersistenceBackend;
use crate::device_info::{DeviceInfoError, RECORD_SIZE};

pub const PARTITION: &str = "devinfo";

pub struct DevinfoPage;

impl PersistenceBackend for DevinfoPage {
    fn load(
        &self,
        storage: &mut dyn Storage,
        record: &mut [u8; RECORD_SIZE],
    ) -> Result<(), DeviceInfoError> {
        let part = storage.find(PARTITION)?;
        let mut page = vec![0u8; storage.page_size() as usize];
        storage.read(&part, 0, &mut page)?;
        record.copy_from_slice(&page[..RECORD_SIZE]);
        Ok(())
    }

    // NAND pages cannot be rewritten in place; the write path erases the
    // block first
    fn store(&self, storage: &mut dyn Storage, record: &[u8; RECORD_SIZE]) -> Result<(), DeviceInfoError> {
        let part = storage.find(PARTITION)?;
        let mut page = vec![0u8; storage.page_size() as usize];
        page[..RECORD_SIZE].copy_from_slice(record);
        storage.write(&part, 0, &page)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "devinfo page"
    }
}
