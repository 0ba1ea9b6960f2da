//! Board services the boot pipeline depends on
//!
//! Everything here is implemented by board support code: key scanning,
//! shared-memory lookups, secure-world calls and the reset controller.

use droidboot_core::Storage;

use crate::boot::auth::Verifier;
use crate::boot::cmdline::Baseband;
use crate::boot::memory::PhysicalMemory;

/// `check_reboot_mode` value asking for recovery
pub const RECOVERY_MODE: u32 = 0x7766_5502;
/// `check_reboot_mode` value asking for fastboot
pub const FASTBOOT_MODE: u32 = 0x7766_5500;

/// One bank of RAM handed to the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBank {
    pub start: u32,
    pub size: u32,
}

/// Why the device powered on, as reported by the charger code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOnEvent {
    Normal,
    /// Factory test mode cable
    Ftm,
    /// Plugged into a USB charger with the power key untouched
    UsbCharger,
}

/// Keys held down while the loader started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    /// HOME or VOLUME UP
    pub recovery: bool,
    /// BACK or VOLUME DOWN
    pub fastboot: bool,
}

pub trait Board {
    /// Board name published as the `product` variable
    fn product(&self) -> &str;

    fn serial_number(&self) -> &str;

    fn baseband(&self) -> Baseband;

    /// ARM machine type passed to the kernel in r1
    fn machine_type(&self) -> u32;

    fn platform_id(&self) -> u32;

    /// Hardware variant used to pick a device tree
    fn variant_id(&self) -> u32;

    fn memory_banks(&self) -> &[MemoryBank];

    fn keys(&mut self) -> KeyState;

    /// Reboot reason left by the previous boot, 0 when there is none
    fn reboot_mode(&mut self) -> u32;

    fn power_on_event(&mut self) -> PowerOnEvent;

    /// Blow the tamper fuse
    fn set_tamper_fuse(&mut self) {}

    /// Tell the modem about the tamper flag
    fn set_tamper_flag(&mut self, _tampered: bool) {}

    fn reboot(&mut self, reason: u32) -> !;
}

/// Collaborators a boot attempt runs against
pub struct Platform<'a> {
    pub storage: &'a mut dyn Storage,
    pub memory: &'a mut dyn PhysicalMemory,
    pub board: &'a mut dyn Board,
    pub verifier: &'a dyn Verifier,
}
