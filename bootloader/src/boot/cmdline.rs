//! Kernel command line assembly
//!
//! The final command line is the image's own string followed by fragments
//! the loader knows and the image can't: storage type, serial number,
//! authentication result, baseband and boot mode. Order is fixed.

use alloc::string::String;

use droidboot_core::disk::misc::BootModeMessage;

use crate::platform::PowerOnEvent;

/// Command line used when the image carries none
pub const DEFAULT_CMDLINE: &str = "mem=100M console=null";

const EMMC_CMDLINE: &str = " androidboot.emmc=true";
const SERIALNO_CMDLINE: &str = " androidboot.serialno=";
const AUTH_KERNEL_CMDLINE: &str = " androidboot.authorized_kernel=true";

/// Modem configuration of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseband {
    Apq,
    Msm,
    Csfb,
    Svlte2a,
    Mdm,
    Sglte,
}

impl Baseband {
    pub const fn fragment(self) -> &'static str {
        match self {
            Self::Apq => " androidboot.baseband=apq",
            Self::Msm => " androidboot.baseband=msm",
            Self::Csfb => " androidboot.baseband=csfb",
            Self::Svlte2a => " androidboot.baseband=svlte2a",
            Self::Mdm => " androidboot.baseband=mdm",
            Self::Sglte => " androidboot.baseband=sglte",
        }
    }
}

/// What userspace is asked to bring up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootMode {
    #[default]
    Normal,
    FastmmiPcba,
    FastmmiFull,
    Recovery,
    Ftm,
    UsbCharger,
    Bootloader,
}

impl BootMode {
    /// Decode the mode number stored in a misc boot-mode message
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Normal),
            1 => Some(Self::FastmmiPcba),
            2 => Some(Self::FastmmiFull),
            3 => Some(Self::Recovery),
            4 => Some(Self::Ftm),
            5 => Some(Self::UsbCharger),
            6 => Some(Self::Bootloader),
            _ => None,
        }
    }

    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::FastmmiPcba => 1,
            Self::FastmmiFull => 2,
            Self::Recovery => 3,
            Self::Ftm => 4,
            Self::UsbCharger => 5,
            Self::Bootloader => 6,
        }
    }

    /// `androidboot.mode` fragment; `Bootloader` has none
    pub const fn fragment(self) -> &'static str {
        match self {
            Self::Normal => " androidboot.mode=normal",
            Self::FastmmiPcba => " androidboot.mode=fastmmi_pcba",
            Self::FastmmiFull => " androidboot.mode=fastmmi_full",
            Self::Recovery => " androidboot.mode=recovery",
            Self::Ftm => " androidboot.mode=ftm",
            Self::UsbCharger => " androidboot.mode=charger",
            Self::Bootloader => "",
        }
    }

    /// Modes under which a signed image is actually verified
    pub const fn verifies_signature(self) -> bool {
        matches!(self, Self::Normal | Self::UsbCharger)
    }
}

/// Pick the boot mode from the misc message and the power-on state
///
/// A factory MMI request in misc wins over everything; then recovery, then
/// the charger's power-on event; otherwise whatever misc asked for.
pub fn resolve_boot_mode(
    misc: Option<BootModeMessage>,
    recovery: bool,
    power_on: PowerOnEvent,
) -> BootMode {
    let requested = misc
        .and_then(|msg| msg.requested())
        .and_then(BootMode::from_raw)
        .unwrap_or_default();

    match requested {
        BootMode::FastmmiPcba | BootMode::FastmmiFull => requested,
        _ if recovery => BootMode::Recovery,
        _ => match power_on {
            PowerOnEvent::Ftm => BootMode::Ftm,
            PowerOnEvent::UsbCharger => BootMode::UsbCharger,
            PowerOnEvent::Normal => requested,
        },
    }
}

/// Inputs to [`build_cmdline`] besides the base string
#[derive(Debug, Clone, Copy)]
pub struct CmdlineParams<'a> {
    /// Booting from eMMC rather than raw NAND
    pub emmc: bool,
    pub serial: &'a str,
    /// Signed-kernel policy is on and the image verified
    pub authorized_kernel: bool,
    pub baseband: Baseband,
    pub boot_mode: BootMode,
}

impl CmdlineParams<'_> {
    fn fragments(&self) -> [&str; 6] {
        [
            if self.emmc { EMMC_CMDLINE } else { "" },
            SERIALNO_CMDLINE,
            self.serial,
            if self.authorized_kernel { AUTH_KERNEL_CMDLINE } else { "" },
            self.baseband.fragment(),
            self.boot_mode.fragment(),
        ]
    }
}

/// Final kernel command line
///
/// The length is summed before anything is copied and the buffer allocated
/// once, rounded up to a word so the ATAG copy never reads past it.
pub fn build_cmdline(base: &str, params: &CmdlineParams<'_>) -> String {
    let fragments = params.fragments();
    let len = base.len() + fragments.iter().map(|f| f.len()).sum::<usize>();

    let mut out = String::with_capacity((len + 4) & !3);
    out.push_str(base);
    for fragment in fragments {
        out.push_str(fragment);
    }
    debug_assert_eq!(out.len(), len);
    out
}
