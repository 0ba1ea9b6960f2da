// Kernel boot handoff

use core::convert::Infallible;

use super::boot_params::BootParams;
use super::cmdline::build_cmdline;
use super::context::BootContext;
use super::loader::LoadedImage;
use super::ParameterEncoder;
use crate::error::BootError;
use crate::platform::Platform;

/// CPU operations around the jump into the kernel
///
/// Called in declaration order; nothing touches RAM through the cache once
/// `disable_cache` has run.
pub trait Cpu {
    /// Quiesce board drivers (display, USB, timers)
    fn platform_uninit(&mut self);

    /// Clean and disable the data and instruction caches
    fn disable_cache(&mut self);

    /// Data synchronization barrier
    fn barrier(&mut self);

    fn disable_mmu(&mut self);

    /// Branch to `entry` with `r0`, `machine` and `tags` in r0..r2
    fn jump(&mut self, entry: u32, r0: u32, machine: u32, tags: u32) -> !;
}

/// Encode the boot parameters and jump into the kernel
///
/// Only returns when the parameters could not be written.
pub fn transfer(
    ctx: &BootContext,
    image: &LoadedImage,
    platform: &mut Platform<'_>,
    cpu: &mut dyn Cpu,
) -> Result<Infallible, BootError> {
    let cmdline = build_cmdline(&image.cmdline, &ctx.cmdline_params());

    let ptable = if ctx.is_emmc() {
        None
    } else {
        Some(platform.storage.partitions())
    };
    let params = BootParams {
        tags_addr: image.tags_addr,
        ramdisk_addr: image.ramdisk_addr,
        ramdisk_size: image.ramdisk_size,
        cmdline: &cmdline,
        banks: platform.board.memory_banks(),
        ptable,
    };
    let capacity = match ctx.config.encoder {
        ParameterEncoder::Atags => ctx.config.tags_capacity,
        ParameterEncoder::DeviceTree => ctx.config.fdt_capacity,
    };
    let used = ctx
        .config
        .encoder
        .encode(&mut *platform.memory, &params, capacity)?;

    log::info!(
        "booting linux @ {:#x}, ramdisk @ {:#x} ({}), tags/device tree @ {:#x} ({} bytes)",
        image.kernel_addr,
        image.ramdisk_addr,
        image.ramdisk_size,
        image.tags_addr,
        used
    );

    let machine = platform.board.machine_type();
    cpu.platform_uninit();
    cpu.disable_cache();
    cpu.barrier();
    cpu.disable_mmu();
    cpu.jump(image.kernel_addr, 0, machine, image.tags_addr)
}
