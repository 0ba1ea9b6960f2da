// Boot image reader: find the image, check it and put its payloads where
// the header says they go

use alloc::string::String;

use bootimg::dt_table::DtTable;
use bootimg::header::{has_magic, HEADER_SIZE};
use bootimg::{BootImageHeader, DtEntry, ImageLayout, PageSize};
use droidboot_core::{PartitionRegion, StorageKind};

use super::auth;
use super::context::{BootContext, MAX_PAGE_SIZE};
use super::cpr;
use super::ParameterEncoder;
use crate::error::BootError;
use crate::platform::{Board, Platform};

/// Which image to boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootTarget {
    Primary,
    Recovery,
}

impl BootTarget {
    pub const fn partition(self) -> &'static str {
        match self {
            Self::Primary => "boot",
            Self::Recovery => "recovery",
        }
    }
}

/// Payloads in place, ready for [`super::handoff::transfer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub kernel_addr: u32,
    pub kernel_size: u32,
    pub ramdisk_addr: u32,
    pub ramdisk_size: u32,
    pub tags_addr: u32,
    /// The image's command line before loader fragments are added
    pub cmdline: String,
}

/// Physical address `offset` bytes into scratch
pub(crate) fn scratch_at(scratch: u32, offset: u64) -> Result<u32, BootError> {
    u32::try_from(scratch as u64 + offset).map_err(|_| BootError::Memory)
}

/// Load `target` from storage, or pick up an image an earlier stage staged
pub fn load_boot_image(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    target: BootTarget,
) -> Result<LoadedImage, BootError> {
    if let Some(header) = unified_header(ctx, platform) {
        log::info!("Unified boot method!");
        return Ok(finish(ctx, platform, &header));
    }

    let name = target.partition();
    let part = platform.storage.find(name).map_err(|_| {
        log::error!("ERROR: No {} partition found", name);
        BootError::PartitionNotFound
    })?;

    let header = read_header(ctx, platform, &part)?;
    adopt_page_size(ctx, &header)?;

    let layout = ImageLayout::new(&header, ctx.page());
    if !layout.fits(part.byte_len()) {
        log::error!(
            "ERROR: image needs {} bytes, {} holds {}",
            layout.image_size,
            name,
            part.byte_len()
        );
        return Err(BootError::InvalidHeader);
    }

    if auth::required(ctx) {
        auth::authenticate(ctx, platform, &part, &header, &layout)?;
    } else {
        read_payloads(ctx, platform, &part, &header, &layout)?;
    }

    Ok(finish(ctx, platform, &header))
}

fn unified_header(ctx: &BootContext, platform: &Platform<'_>) -> Option<BootImageHeader> {
    if !ctx.is_emmc() {
        return None;
    }
    let addr = ctx.config.unified_header_addr?;
    let staged = platform.memory.slice(addr, HEADER_SIZE).ok()?;
    if !has_magic(staged) {
        return None;
    }
    BootImageHeader::parse(staged).ok()
}

fn read_header(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    part: &PartitionRegion,
) -> Result<BootImageHeader, BootError> {
    let len = ctx.page().bytes();
    let page = ctx.staging.header(len);
    platform.storage.read(part, 0, page).map_err(|e| {
        log::error!("ERROR: Cannot read boot image header: {}", e);
        BootError::ImageReadError
    })?;
    BootImageHeader::parse(page).map_err(|e| {
        log::error!("ERROR: {}", e);
        BootError::InvalidHeader
    })
}

/// Apply the header's page size
///
/// eMMC images carry their own page size; on NAND it has to match the
/// flash geometry.
pub(crate) fn adopt_page_size(
    ctx: &mut BootContext,
    header: &BootImageHeader,
) -> Result<(), BootError> {
    let current = ctx.page().get();
    match ctx.storage_kind() {
        StorageKind::Block => {
            if header.page_size == 0 || header.page_size == current {
                return Ok(());
            }
            let page = PageSize::new(header.page_size)
                .filter(|p| p.bytes() <= MAX_PAGE_SIZE)
                .ok_or_else(|| {
                    log::error!("ERROR: unsupported image page size {}", header.page_size);
                    BootError::InvalidHeader
                })?;
            ctx.set_page(page);
            Ok(())
        }
        StorageKind::RawFlash => {
            if header.page_size != current {
                log::error!(
                    "ERROR: Invalid boot image pagesize. Device pagesize: {}, Image pagesize: {}",
                    current,
                    header.page_size
                );
                return Err(BootError::InvalidHeader);
            }
            Ok(())
        }
    }
}

/// Read payloads straight to their load addresses
fn read_payloads(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    part: &PartitionRegion,
    header: &BootImageHeader,
    layout: &ImageLayout,
) -> Result<(), BootError> {
    let kernel = platform
        .memory
        .slice_mut(header.kernel_addr, layout.kernel_actual as usize)?;
    platform
        .storage
        .read(part, layout.kernel_offset, kernel)
        .map_err(|e| {
            log::error!("ERROR: Cannot read kernel image: {}", e);
            BootError::ImageReadError
        })?;

    if layout.ramdisk_actual != 0 {
        let ramdisk = platform
            .memory
            .slice_mut(header.ramdisk_addr, layout.ramdisk_actual as usize)?;
        platform
            .storage
            .read(part, layout.ramdisk_offset, ramdisk)
            .map_err(|e| {
                log::error!("ERROR: Cannot read ramdisk image: {}", e);
                BootError::ImageReadError
            })?;
    }

    // second stage is never loaded, only skipped over
    if ctx.config.encoder == ParameterEncoder::DeviceTree && header.dt_size != 0 {
        read_device_tree(ctx, platform, part, header, layout)?;
    }
    Ok(())
}

fn read_device_tree(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    part: &PartitionRegion,
    header: &BootImageHeader,
    layout: &ImageLayout,
) -> Result<(), BootError> {
    let capacity = ctx.config.fdt_capacity;
    let table = ctx.staging.dt_table(layout.page.bytes());
    platform
        .storage
        .read(part, layout.dt_offset, table)
        .map_err(|e| {
            log::error!("ERROR: Cannot read the Device Tree Table: {}", e);
            BootError::DeviceTreeError
        })?;
    let entry = select_dt_entry(table, layout, &*platform.board, capacity)?;

    let blob = platform
        .memory
        .slice_mut(header.tags_addr, entry.size as usize)
        .map_err(|_| BootError::DeviceTreeError)?;
    platform
        .storage
        .read(part, layout.dt_offset + entry.offset as u64, blob)
        .map_err(|e| {
            log::error!("ERROR: Cannot read device tree: {}", e);
            BootError::DeviceTreeError
        })
}

/// Validate the QCDT page and pick this board's blob
pub(crate) fn select_dt_entry(
    table: &[u8],
    layout: &ImageLayout,
    board: &dyn Board,
    capacity: usize,
) -> Result<DtEntry, BootError> {
    let table = DtTable::parse(table, layout.page.bytes()).map_err(|e| {
        log::error!("ERROR: Cannot validate Device Tree Table: {}", e);
        BootError::DeviceTreeError
    })?;
    let entry = *table
        .select(board.platform_id(), board.variant_id())
        .ok_or_else(|| {
            log::error!(
                "ERROR: Device Tree Blob cannot be found for platform {} variant {}",
                board.platform_id(),
                board.variant_id()
            );
            BootError::DeviceTreeError
        })?;

    if entry.end() > layout.dt_actual || entry.size as usize > capacity {
        log::error!(
            "ERROR: device tree {}+{} outside dt payload",
            entry.offset,
            entry.size
        );
        return Err(BootError::DeviceTreeError);
    }
    Ok(entry)
}

fn finish(ctx: &mut BootContext, platform: &mut Platform<'_>, header: &BootImageHeader) -> LoadedImage {
    log::info!("kernel  @ {:#x} ({} bytes)", header.kernel_addr, header.kernel_size);
    log::info!("ramdisk @ {:#x} ({} bytes)", header.ramdisk_addr, header.ramdisk_size);

    let own = header.cmdline_lossy();
    if own.len() != header.cmdline_str().len() {
        log::warn!("image command line is not valid UTF-8, passing it on lossily");
    }
    let mut cmdline = String::from(match own.as_ref() {
        "" => ctx.config.default_cmdline,
        own => own,
    });

    if ctx.is_emmc() {
        match cpr::read_status(&mut *platform.storage, &mut ctx.staging) {
            Ok(status) => {
                log::info!("CPR status={}", status.status);
                if let Some(fragment) = cpr::cmdline_fragment(&status) {
                    cmdline.push_str(fragment);
                }
            }
            Err(e) => log::error!("ERROR: Get CPR status failed, continue anyway: {}", e),
        }
    }
    log::info!("cmdline = '{}'", cmdline);

    LoadedImage {
        kernel_addr: header.kernel_addr,
        kernel_size: header.kernel_size,
        ramdisk_addr: header.ramdisk_addr,
        ramdisk_size: header.ramdisk_size,
        tags_addr: header.tags_addr,
        cmdline,
    }
}
