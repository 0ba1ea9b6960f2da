//! Persistence storage backends
//!
//! One backend per storage medium; [`backend_for`] picks the right one.

pub mod aboot;
pub mod devinfo;

use droidboot_core::{Storage, StorageKind};

use crate::device_info::{DeviceInfoError, RECORD_SIZE};

/// Trait for persistence backends
pub trait PersistenceBackend {
    /// Read the raw record
    fn load(
        &self,
        storage: &mut dyn Storage,
        record: &mut [u8; RECORD_SIZE],
    ) -> Result<(), DeviceInfoError>;

    /// Replace the raw record
    fn store(&self, storage: &mut dyn Storage, record: &[u8; RECORD_SIZE])
        -> Result<(), DeviceInfoError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Backend matching the storage medium
pub fn backend_for(kind: StorageKind) -> &'static dyn PersistenceBackend {
    match kind {
        StorageKind::Block => &aboot::AbootTail,
        StorageKind::RawFlash => &devinfo::DevinfoPage,
    }
}
