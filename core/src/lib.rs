//! droidboot Core Library
//!
//! Storage access for the boot loader: the partition registry, GPT scanning,
//! the block (eMMC) and raw NAND backends, misc partition regions and the
//! in-memory log ring. Designed to be no_std compatible.

#![no_std]
#![allow(clippy::new_without_default)]

extern crate alloc;

pub mod disk;
pub mod logger;
pub mod storage;

pub use disk::partition::{PartitionRegion, PartitionTable};
pub use storage::{Storage, StorageError, StorageKind};
