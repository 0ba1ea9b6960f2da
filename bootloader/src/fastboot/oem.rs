// oem commands

use alloc::format;
use alloc::string::String;

use droidboot_core::logger::{self, LOGGER};

use super::{CommandError, Responder};
use crate::boot::context::BootContext;
use crate::boot::cpr;
use crate::error::BootError;
use crate::platform::Platform;

/// Longest line an INFO response carries
const INFO_LINE: usize = 64 - 4 - 1;

pub(super) fn unlock(ctx: &mut BootContext, platform: &mut Platform<'_>) -> Result<(), CommandError> {
    let changed = ctx
        .device
        .set_unlocked(&mut *platform.storage, true)
        .map_err(|e| {
            log::error!("oem unlock: {}", e);
            BootError::from(e)
        })?;
    if changed {
        log::info!("device unlocked");
    }
    Ok(())
}

pub(super) fn device_info(ctx: &BootContext, out: &mut dyn Responder) {
    out.info(&format!("\tDevice tampered: {}", ctx.device.is_tampered()));
    out.info(&format!("\tDevice unlocked: {}", ctx.device.is_unlocked()));
    out.okay("");
}

/// Stream the log ring as INFO lines
pub(super) fn log(out: &mut dyn Responder) {
    let contents = LOGGER.contents();
    out.info(&format!("\tlog: {} bytes", contents.len()));
    for line in logger::lines(&contents, INFO_LINE) {
        out.info(&String::from_utf8_lossy(line));
    }
    out.okay("");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CprCommand {
    Disable = 0,
    Enable = 1,
    Status = 2,
}

/// `oem cpr <enable|disable|status>`; always answers okay
pub(super) fn cpr(
    ctx: &mut BootContext,
    platform: &mut Platform<'_>,
    arg: &str,
    out: &mut dyn Responder,
) {
    out.info(&format!("processing cpr command:{}", arg));

    let cmd = if arg.contains("disable") {
        CprCommand::Disable
    } else if arg.contains("enable") {
        CprCommand::Enable
    } else if arg.contains("status") {
        CprCommand::Status
    } else {
        out.info("Please use the follow command");
        out.info("fastboot oem cpr disable: Disable CPR in kernel");
        out.info("fastboot oem cpr enable:  Enable CPR in kernel");
        out.info("fastboot oem cpr status:  Display current CPR setting");
        out.okay("");
        return;
    };
    log::info!("cpr: {:?}", cmd);

    if !ctx.is_emmc() {
        out.info("ERROR: Partition type not supported");
        out.okay("");
        return;
    }

    let storage = &mut *platform.storage;
    match cmd {
        CprCommand::Disable | CprCommand::Enable => {
            match cpr::write_status(storage, &mut ctx.staging, cmd == CprCommand::Enable) {
                Ok(()) => out.info(&format!("CPR cmd({}) write success!", cmd as u32)),
                Err(e) => {
                    log::error!("cpr: {}", e);
                    out.info("Set CPR config failed");
                }
            }
        }
        CprCommand::Status => match cpr::read_status(storage, &mut ctx.staging) {
            Ok(status) => match status.enabled() {
                Some(true) => out.info("CPR status: enabled"),
                Some(false) => out.info("CPR status: disabled"),
                None => out.info("bad CPR flag"),
            },
            Err(e) => {
                log::error!("cpr: {}", e);
                out.info("get cpr config failed");
            }
        },
    }
    out.okay("");
}
