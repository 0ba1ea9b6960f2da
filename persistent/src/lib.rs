//! Persistent Device State
//!
//! The boot loader keeps one small record across boots: whether the owner
//! unlocked the device and whether an unverified kernel was ever booted.
//!
//! # Architecture
//!
//! The record format is medium-neutral; where it lives is not:
//!
//! - eMMC: the last 512 bytes of the `aboot` partition
//! - raw NAND: the first page of the `devinfo` partition
//!
//! A [`storage::PersistenceBackend`] hides that difference from
//! [`DeviceInfoStore`], which loads the record once, repairs it when the
//! magic is missing and writes it back on request.

#![no_std]

extern crate alloc;

pub mod device_info;
pub mod storage;

pub use device_info::{DeviceInfo, DeviceInfoError, DeviceInfoStore};
