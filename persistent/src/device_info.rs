//! Device trust state record

use core::fmt;

use droidboot_core::{Storage, StorageError};

use crate::storage::{backend_for, PersistenceBackend};

/// Marks an initialized record
pub const DEVICE_MAGIC: &[u8; 13] = b"ANDROID-BOOT!";

/// magic + is_unlocked + is_tampered
pub const RECORD_SIZE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInfoError {
    Storage(StorageError),
    /// Partition cannot hold the record
    PartitionTooSmall,
}

impl From<StorageError> for DeviceInfoError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for DeviceInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "device info: {}", e),
            Self::PartitionTooSmall => write!(f, "device info: partition too small"),
        }
    }
}

/// Trust state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Owner allowed unsigned images
    pub is_unlocked: bool,
    /// An image failed (or skipped) verification
    pub is_tampered: bool,
}

impl DeviceInfo {
    /// `None` unless the record starts with [`DEVICE_MAGIC`]
    pub fn decode(raw: &[u8; RECORD_SIZE]) -> Option<Self> {
        if &raw[..DEVICE_MAGIC.len()] != DEVICE_MAGIC {
            return None;
        }
        Some(Self {
            is_unlocked: raw[13] != 0,
            is_tampered: raw[14] != 0,
        })
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut raw = [0u8; RECORD_SIZE];
        raw[..DEVICE_MAGIC.len()].copy_from_slice(DEVICE_MAGIC);
        raw[13] = self.is_unlocked as u8;
        raw[14] = self.is_tampered as u8;
        raw
    }
}

/// Loaded record plus the backend it came from
pub struct DeviceInfoStore {
    backend: &'static dyn PersistenceBackend,
    info: DeviceInfo,
}

impl DeviceInfoStore {
    /// Read the record for `storage`'s medium
    ///
    /// A record without the magic is reset to locked and untampered and
    /// written back, so the next load sees the same state.
    pub fn load(storage: &mut dyn Storage) -> Result<Self, DeviceInfoError> {
        let backend = backend_for(storage.kind());
        let mut raw = [0u8; RECORD_SIZE];
        backend.load(storage, &mut raw)?;

        let mut store = Self {
            backend,
            info: DeviceInfo::default(),
        };
        match DeviceInfo::decode(&raw) {
            Some(info) => store.info = info,
            None => {
                log::warn!("device info: no magic in {}, resetting", backend.name());
                store.persist(storage)?;
            }
        }
        log::info!(
            "device info: unlocked={} tampered={}",
            store.info.is_unlocked,
            store.info.is_tampered
        );
        Ok(store)
    }

    /// Store that never touched storage, for when the record can't be read
    pub fn detached(kind: droidboot_core::StorageKind) -> Self {
        Self {
            backend: backend_for(kind),
            info: DeviceInfo::default(),
        }
    }

    pub fn info(&self) -> DeviceInfo {
        self.info
    }

    pub fn is_unlocked(&self) -> bool {
        self.info.is_unlocked
    }

    pub fn is_tampered(&self) -> bool {
        self.info.is_tampered
    }

    /// In-memory only; call [`DeviceInfoStore::persist`] to keep it
    pub fn set_tampered(&mut self, tampered: bool) {
        self.info.is_tampered = tampered;
    }

    /// Set the unlock flag and persist it if it changed
    ///
    /// Returns whether anything was written.
    pub fn set_unlocked(
        &mut self,
        storage: &mut dyn Storage,
        unlocked: bool,
    ) -> Result<bool, DeviceInfoError> {
        if self.info.is_unlocked == unlocked {
            return Ok(false);
        }
        self.info.is_unlocked = unlocked;
        self.persist(storage)?;
        Ok(true)
    }

    /// Write the current state
    pub fn persist(&mut self, storage: &mut dyn Storage) -> Result<(), DeviceInfoError> {
        self.backend.store(storage, &self.info.encode())
    }
}

impl fmt::Debug for DeviceInfoStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceInfoStore")
            .field("backend", &self.backend.name())
            .field("info", &self.info)
            .finish()
    }
}
