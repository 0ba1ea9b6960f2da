//! Boot flow
//!
//! ```text
//! keys / reboot reason ──► normal boot ──► handoff
//!          │                    │ (failure)
//!          ▼                    ▼
//!       fastboot ◄──────────────┘
//! ```
//!
//! The normal boot loads `boot` (or `recovery`), authenticates it when the
//! policy asks for it and jumps into the kernel. Anything that stops it
//! drops into fastboot, which serves commands until one of them boots or
//! reboots the device.

use alloc::string::String;
use alloc::vec::Vec;
use core::convert::Infallible;

use crate::boot::context::{BootConfig, BootContext};
use crate::boot::handoff::{transfer, Cpu};
use crate::boot::loader::load_boot_image;
use crate::error::BootError;
use crate::fastboot::{dispatch, Next, Responder, Variables};
use crate::platform::{Board, Platform, FASTBOOT_MODE, RECOVERY_MODE};

/// Fastboot transport provided by the board
pub trait Transport: Responder {
    /// Next command and the bytes downloaded for it
    ///
    /// `None` once the host is gone. Called again after [`Transport::stop`]
    /// when a boot attempt failed, in which case the transport restarts.
    fn next_command(&mut self) -> Option<(String, Vec<u8>)>;

    /// Shut the transport down before leaving fastboot
    fn stop(&mut self);
}

/// Lends a transport out as a plain responder
struct Replies<'a>(&'a mut dyn Transport);

impl Responder for Replies<'_> {
    fn okay(&mut self, msg: &str) {
        self.0.okay(msg);
    }

    fn fail(&mut self, msg: &str) {
        self.0.fail(msg);
    }

    fn info(&mut self, msg: &str) {
        self.0.info(msg);
    }
}

/// Where the loader starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartRequest {
    pub recovery: bool,
    pub fastboot: bool,
}

/// Decide from held keys and the reboot reason
///
/// A recovery key wins over the fastboot key; the reboot reason is only
/// consulted when no fastboot key is held.
pub fn select_entry(board: &mut dyn Board) -> StartRequest {
    let keys = board.keys();
    let mut start = StartRequest {
        recovery: keys.recovery,
        fastboot: false,
    };
    if !start.recovery && keys.fastboot {
        start.fastboot = true;
        return start;
    }

    match board.reboot_mode() {
        RECOVERY_MODE => start.recovery = true,
        FASTBOOT_MODE => start.fastboot = true,
        _ => {}
    }
    start
}

/// Report trust state that was already degraded before this boot
pub fn init_side_channels(ctx: &BootContext, board: &mut dyn Board) {
    if !ctx.config.signed_kernel {
        return;
    }
    if ctx.device.is_unlocked() || ctx.device.is_tampered() {
        if ctx.config.tamper_fuse {
            board.set_tamper_fuse();
        }
        if ctx.config.pcom_secboot {
            board.set_tamper_flag(ctx.device.is_tampered());
        }
    }
}

/// Load the selected image and jump into it
///
/// Returns only on failure.
pub fn normal_boot(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    cpu: &mut dyn Cpu,
) -> Result<Infallible, BootError> {
    let target = ctx.target();
    let image = load_boot_image(ctx, platform, target)?;
    transfer(ctx, &image, platform, cpu)
}

/// Serve commands until one of them leaves the command loop
///
/// A closed transport reads as a request to reboot back into fastboot.
pub fn serve(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    vars: &Variables,
    transport: &mut dyn Transport,
) -> Next {
    while let Some((command, data)) = transport.next_command() {
        match dispatch(ctx, platform, vars, &command, &data, &mut Replies(&mut *transport)) {
            Next::Stay => {}
            next => return next,
        }
    }
    log::warn!("fastboot: transport closed");
    Next::Reboot(FASTBOOT_MODE)
}

fn fastboot(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    cpu: &mut dyn Cpu,
    transport: &mut dyn Transport,
) -> ! {
    let vars = Variables::for_device(ctx, platform);
    for (name, value) in vars.iter() {
        log::debug!("fastboot: {} = {}", name, value);
    }
    for part in platform.storage.partitions().iter() {
        log::info!("ptn {:?}", part);
    }

    loop {
        match serve(ctx, platform, &vars, transport) {
            Next::Stay => {}
            Next::Boot(image) => {
                transport.stop();
                let Err(e) = transfer(ctx, &image, platform, cpu);
                log::error!("ERROR: boot failed: {}", e);
            }
            Next::Continue => {
                transport.stop();
                let Err(e) = normal_boot(ctx, platform, cpu);
                log::error!("ERROR: Could not do normal boot: {}", e);
            }
            Next::Reboot(reason) => platform.board.reboot(reason),
        }
    }
}

/// Loader entry once the board has brought up storage, RAM and the logger
pub fn run(
    config: BootConfig,
    platform: &mut Platform<'_>,
    cpu: &mut dyn Cpu,
    transport: &mut dyn Transport,
) -> ! {
    let start = select_entry(&mut *platform.board);
    let mut ctx = BootContext::new(config, platform, start.recovery);

    if !start.fastboot {
        init_side_channels(&ctx, &mut *platform.board);
        let Err(e) = normal_boot(&mut ctx, platform, cpu);
        log::error!("ERROR: Could not do normal boot. Reverting to fastboot mode. ({})", e);
    }
    fastboot(&mut ctx, platform, cpu, transport)
}
