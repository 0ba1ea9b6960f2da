//! Fastboot command handlers
//!
//! The USB transport and the protocol framing live in board code. It hands
//! each command line (and the bytes of the last download) to [`dispatch`],
//! which answers through a [`Responder`] and tells the caller what to do
//! next.
//!
//! Commands, matched the way they were registered:
//!
//! ```text
//! getvar:<name>        published variable, empty when unknown
//! boot                 boot the downloaded image
//! flash:<partition>    write the download (raw, sparse or spare-byte)
//! erase:<partition>
//! continue             leave fastboot and run the normal boot
//! reboot
//! reboot-bootloader
//! oem unlock
//! oem device-info
//! oem log
//! oem cpr <enable|disable|status>
//! ```

mod flash;
mod oem;
mod vars;

pub use vars::Variables;

use alloc::string::ToString;
use core::fmt;

use bootimg::BootImageHeader;

use crate::boot::context::BootContext;
use crate::boot::loader::{adopt_page_size, LoadedImage};
use crate::error::BootError;
use crate::platform::{Platform, FASTBOOT_MODE};

/// Answers to the host
pub trait Responder {
    fn okay(&mut self, msg: &str);

    fn fail(&mut self, msg: &str);

    /// Intermediate text line
    fn info(&mut self, msg: &str);
}

/// What the loader does after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Wait for the next command
    Stay,
    /// Stop the transport and hand off to the staged image
    Boot(LoadedImage),
    /// Stop the transport and run the normal boot pipeline
    Continue,
    Reboot(u32),
}

/// Why a command was answered with `fail`; the text is the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    Boot(BootError),
    /// No partition registry, or no such partition on eMMC
    NoPartitionTable,
    UnknownPartition,
    SizeTooLarge,
    NotBootImage,
    /// `flash:partition` got something that is not a GPT
    PartitionImage,
    Erase,
    BogusChunkSize,
    UnknownChunkType,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boot(e) => e.fmt(f),
            Self::NoPartitionTable => write!(f, "partition table doesn't exist"),
            Self::UnknownPartition => write!(f, "unknown partition name"),
            Self::SizeTooLarge => write!(f, "size too large"),
            Self::NotBootImage => write!(f, "image is not a boot image"),
            Self::PartitionImage => write!(f, "failed to write partition"),
            Self::Erase => write!(f, "failed to erase partition"),
            Self::BogusChunkSize => write!(f, "Bogus chunk size"),
            Self::UnknownChunkType => write!(f, "Unknown chunk type"),
        }
    }
}

impl From<BootError> for CommandError {
    fn from(e: BootError) -> Self {
        Self::Boot(e)
    }
}

/// Run one command
pub fn dispatch(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    vars: &Variables,
    command: &str,
    data: &[u8],
    out: &mut dyn Responder,
) -> Next {
    log::debug!("fastboot: {}", command);

    if let Some(name) = command.strip_prefix("getvar:") {
        out.okay(vars.get(name).unwrap_or(""));
        return Next::Stay;
    }
    if let Some(name) = command.strip_prefix("flash:") {
        reply(flash::flash(ctx, platform, name, data), out);
        return Next::Stay;
    }
    if let Some(name) = command.strip_prefix("erase:") {
        reply(flash::erase(ctx, platform, name), out);
        return Next::Stay;
    }
    if let Some(arg) = command.strip_prefix("oem cpr") {
        oem::cpr(ctx, platform, arg, out);
        return Next::Stay;
    }

    match command {
        "boot" => match boot(ctx, platform, data) {
            Ok(image) => {
                out.okay("");
                Next::Boot(image)
            }
            Err(e) => {
                out.fail(&e.to_string());
                Next::Stay
            }
        },
        "continue" => {
            out.okay("");
            Next::Continue
        }
        "reboot-bootloader" => {
            log::info!("rebooting the device");
            out.okay("");
            Next::Reboot(FASTBOOT_MODE)
        }
        "reboot" => {
            log::info!("rebooting the device");
            out.okay("");
            Next::Reboot(0)
        }
        "oem unlock" => {
            reply(oem::unlock(ctx, platform), out);
            Next::Stay
        }
        "oem device-info" => {
            oem::device_info(ctx, out);
            Next::Stay
        }
        "oem log" => {
            oem::log(out);
            Next::Stay
        }
        _ => {
            out.fail("unknown command");
            Next::Stay
        }
    }
}

fn reply(result: Result<(), CommandError>, out: &mut dyn Responder) {
    match result {
        Ok(()) => out.okay(""),
        Err(e) => out.fail(&e.to_string()),
    }
}

/// Stage a downloaded image for booting
///
/// The payloads are copied straight from the download; nothing is read
/// from storage and nothing is verified.
fn boot(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    data: &[u8],
) -> Result<LoadedImage, CommandError> {
    let header = BootImageHeader::parse(data).map_err(|e| {
        log::error!("fastboot: {}", e);
        BootError::InvalidHeader
    })?;

    if ctx.is_emmc() {
        adopt_page_size(ctx, &header)?;
    }

    let page = ctx.page();
    let kernel_actual = page.round_up_u64(header.kernel_size as u64);
    let ramdisk_actual = page.round_up_u64(header.ramdisk_size as u64);
    // the download must hold at least the raw boot image
    if page.get() as u64 + kernel_actual + ramdisk_actual > data.len() as u64 {
        return Err(BootError::IncompleteImage.into());
    }

    let kernel_at = page.bytes();
    let ramdisk_at = kernel_at + kernel_actual as usize;
    let copies = [
        (header.kernel_addr, &data[kernel_at..kernel_at + header.kernel_size as usize]),
        (header.ramdisk_addr, &data[ramdisk_at..ramdisk_at + header.ramdisk_size as usize]),
    ];
    for (addr, payload) in copies {
        if payload.is_empty() {
            continue;
        }
        let dst = platform.memory.slice_mut(addr, payload.len()).map_err(|e| {
            log::error!("fastboot: {:?}", e);
            BootError::Memory
        })?;
        dst.copy_from_slice(payload);
    }

    // a downloaded image was never verified
    ctx.auth_kernel = false;

    Ok(LoadedImage {
        kernel_addr: header.kernel_addr,
        kernel_size: header.kernel_size,
        ramdisk_addr: header.ramdisk_addr,
        ramdisk_size: header.ramdisk_size,
        tags_addr: header.tags_addr,
        cmdline: header.cmdline_lossy().into_owned(),
    })
}
