//! Boot pipeline errors

use core::fmt;

use bootimg::fdt::FdtError;
use droidboot_persistent::DeviceInfoError;

use crate::boot::memory::MemoryError;

/// Why a boot attempt stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// `boot` or `recovery` is not in the partition registry
    PartitionNotFound,
    /// Bad magic, or a page size the backend can't use
    InvalidHeader,
    /// A required payload could not be read
    ImageReadError,
    /// Missing or invalid QCDT table, no matching entry, blob unreadable
    DeviceTreeError,
    /// The device tree at the tags address could not be patched
    DeviceTreeEncode,
    /// The signature page could not be read; boot goes on unauthenticated
    AuthenticationDegraded,
    /// Sparse image chunk sizes or block count don't add up
    SparseFormatError,
    /// Storage refused a write
    StorageWriteError,
    /// A payload would land outside RAM
    Memory,
    /// Image shorter than its header claims
    IncompleteImage,
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartitionNotFound => write!(f, "no boot partition found"),
            Self::InvalidHeader => write!(f, "invalid bootimage header"),
            Self::ImageReadError => write!(f, "cannot read boot image"),
            Self::DeviceTreeError => write!(f, "cannot validate device tree table"),
            Self::DeviceTreeEncode => write!(f, "updating device tree failed"),
            Self::AuthenticationDegraded => write!(f, "cannot read boot image signature"),
            Self::SparseFormatError => write!(f, "sparse image write failure"),
            Self::StorageWriteError => write!(f, "flash write failure"),
            Self::Memory => write!(f, "load address outside ram"),
            Self::IncompleteImage => write!(f, "incomplete bootimage"),
        }
    }
}

impl From<MemoryError> for BootError {
    fn from(_: MemoryError) -> Self {
        Self::Memory
    }
}

impl From<FdtError> for BootError {
    fn from(_: FdtError) -> Self {
        Self::DeviceTreeEncode
    }
}

impl From<DeviceInfoError> for BootError {
    fn from(_: DeviceInfoError) -> Self {
        Self::StorageWriteError
    }
}
