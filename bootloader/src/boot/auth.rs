//! Boot image authentication
//!
//! A locked, untampered device with signed-kernel policy reads the whole
//! image into scratch memory and checks the signature page that follows it.
//! The device is marked tampered before anything is read and cleared only by
//! a successful verification, so every failure path ends up tampered. Only a
//! failed image read stops the boot; everything else boots the image anyway
//! and leaves the verdict in the trust state.

use bootimg::{BootImageHeader, ImageLayout};
use droidboot_core::PartitionRegion;

use super::context::BootContext;
use super::loader::{self, scratch_at};
use super::ParameterEncoder;
use crate::error::BootError;
use crate::platform::Platform;

/// Signature check backed by the crypto engine
pub trait Verifier {
    /// True when `signature` (one page) signs `image`
    fn verify(&self, image: &[u8], signature: &[u8]) -> bool;
}

/// For boards without a verifier: nothing is ever trusted
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl Verifier for RejectAll {
    fn verify(&self, _image: &[u8], _signature: &[u8]) -> bool {
        false
    }
}

/// Signed-kernel policy applies and the device has not opted out
pub fn required(ctx: &BootContext) -> bool {
    ctx.config.signed_kernel && !ctx.device.is_unlocked() && !ctx.device.is_tampered()
}

/// Stage the image through scratch, verify it and place the payloads
///
/// Returns whether the image verified.
pub fn authenticate(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    part: &PartitionRegion,
    header: &BootImageHeader,
    layout: &ImageLayout,
) -> Result<bool, BootError> {
    let page = layout.page.bytes();
    let image_len = usize::try_from(layout.image_size).map_err(|_| BootError::Memory)?;
    let scratch = ctx.config.scratch_addr;

    ctx.device.set_tampered(true);
    ctx.auth_kernel = false;

    let staged = platform.memory.slice_mut(scratch, image_len + page)?;
    let (image, signature) = staged.split_at_mut(image_len);
    platform.storage.read(part, 0, image).map_err(|e| {
        log::error!("ERROR: Cannot read boot image: {}", e);
        BootError::ImageReadError
    })?;

    match platform.storage.read(part, layout.signature_offset(), signature) {
        Err(e) => log::warn!("{}: {}", BootError::AuthenticationDegraded, e),
        Ok(()) if ctx.boot_mode.verifies_signature() => {
            ctx.auth_kernel = platform.verifier.verify(image, signature);
            if ctx.auth_kernel {
                ctx.device.set_tampered(false);
            }
            log::info!(
                "boot image signature {}",
                if ctx.auth_kernel { "verified" } else { "rejected" }
            );
        }
        Ok(()) => log::info!("signature not checked in {:?} mode", ctx.boot_mode),
    }

    // the verdict is final here, record it before any payload can fail
    if ctx.device.is_tampered() {
        if let Err(e) = ctx.device.persist(&mut *platform.storage) {
            log::error!("saving tamper state failed: {}", e);
        }
        if ctx.config.tamper_fuse {
            platform.board.set_tamper_fuse();
        }
    }
    if ctx.config.pcom_secboot {
        platform.board.set_tamper_flag(ctx.device.is_tampered());
    }

    let memory = &mut *platform.memory;
    memory.copy_within(
        scratch_at(scratch, layout.kernel_offset)?,
        header.kernel_addr,
        header.kernel_size as usize,
    )?;
    if header.ramdisk_size != 0 {
        memory.copy_within(
            scratch_at(scratch, layout.ramdisk_offset)?,
            header.ramdisk_addr,
            header.ramdisk_size as usize,
        )?;
    }

    if ctx.config.encoder == ParameterEncoder::DeviceTree && header.dt_size != 0 {
        let capacity = ctx.config.fdt_capacity;
        let table_at = scratch_at(scratch, layout.dt_offset)?;
        let table = ctx.staging.dt_table(page);
        table.copy_from_slice(memory.slice(table_at, page)?);
        let entry = loader::select_dt_entry(table, layout, &*platform.board, capacity)?;
        memory.copy_within(
            scratch_at(scratch, layout.dt_offset + entry.offset as u64)?,
            header.tags_addr,
            entry.size as usize,
        )?;
    }

    Ok(ctx.auth_kernel)
}
