//! droidboot Boot Loader
//!
//! Second-stage boot loader for Qualcomm-style Android devices. It finds a
//! boot image on eMMC or raw NAND, authenticates it when the device is
//! locked, hands the kernel its command line and memory map, and otherwise
//! offers fastboot for flashing.
//!
//! # Layout
//!
//! - [`boot`]: image loading, authentication, command line, ATAGS/device
//!   tree encoding and the jump into the kernel
//! - [`fastboot`]: command handlers behind the board's USB transport
//! - [`aboot`]: entry selection and the boot/fastboot flow
//! - [`platform`]: board services the pipeline calls out to
//!
//! Board code implements [`platform::Board`], [`boot::Cpu`],
//! [`boot::PhysicalMemory`] and [`aboot::Transport`] and calls
//! [`aboot::run`].

#![no_std]

extern crate alloc;

pub mod aboot;
pub mod boot;
pub mod error;
pub mod fastboot;
pub mod heap;
pub mod platform;

pub use error::BootError;
pub use platform::Platform;
