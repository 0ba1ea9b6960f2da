// Boot context: configuration plus the state one boot attempt threads
// through every stage

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bootimg::PageSize;
use droidboot_core::disk::misc::{self, BootModeMessage, MiscRegion};
use droidboot_core::StorageKind;
use droidboot_persistent::DeviceInfoStore;

use super::boot_params::ParameterEncoder;
use super::cmdline::{resolve_boot_mode, Baseband, BootMode, CmdlineParams, DEFAULT_CMDLINE};
use super::loader::BootTarget;
use crate::platform::Platform;

/// Largest page size the staging buffers are sized for
pub const MAX_PAGE_SIZE: usize = 4096;

/// Where an earlier stage may have left a fully loaded image
pub const UNIFIED_HEADER_ADDR: u32 = 0x000F_F000;

/// Run time configuration, defaults follow the enabled features
#[derive(Debug, Clone)]
pub struct BootConfig {
    /// Staging area for authentication reads and fastboot downloads
    pub scratch_addr: u32,
    pub max_download_size: usize,
    pub default_cmdline: &'static str,
    /// Checked for a preloaded header before touching storage
    pub unified_header_addr: Option<u32>,
    /// Bytes reserved at the tags address for ATAGS
    pub tags_capacity: usize,
    /// Bytes reserved at the tags address for the packed device tree
    pub fdt_capacity: usize,
    pub encoder: ParameterEncoder,
    pub signed_kernel: bool,
    pub tamper_fuse: bool,
    pub pcom_secboot: bool,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            scratch_addr: 0x0800_0000,
            max_download_size: 0x0A00_0000,
            default_cmdline: DEFAULT_CMDLINE,
            unified_header_addr: Some(UNIFIED_HEADER_ADDR),
            tags_capacity: 16 * 1024,
            fdt_capacity: 256 * 1024,
            encoder: if cfg!(feature = "device-tree") {
                ParameterEncoder::DeviceTree
            } else {
                ParameterEncoder::Atags
            },
            signed_kernel: cfg!(feature = "signed-kernel"),
            tamper_fuse: cfg!(feature = "tamper-fuse"),
            pcom_secboot: cfg!(feature = "pcom-secboot"),
        }
    }
}

/// Page buffers lent to one stage at a time
///
/// Each accessor zeroes and hands out a prefix of its buffer; the borrow
/// checker keeps a stage from holding it across the next one.
#[derive(Debug)]
pub struct Staging {
    header: Vec<u8>,
    dt_table: Vec<u8>,
    misc: Vec<u8>,
}

fn lend(buf: &mut Vec<u8>, len: usize) -> &mut [u8] {
    if buf.len() < len {
        buf.resize(len, 0);
    }
    let out = &mut buf[..len];
    out.fill(0);
    out
}

impl Staging {
    pub fn new() -> Self {
        Self {
            header: vec![0; MAX_PAGE_SIZE],
            dt_table: vec![0; MAX_PAGE_SIZE],
            misc: vec![0; MAX_PAGE_SIZE],
        }
    }

    /// Boot image header page
    pub fn header(&mut self, len: usize) -> &mut [u8] {
        lend(&mut self.header, len)
    }

    /// QCDT table page
    pub fn dt_table(&mut self, len: usize) -> &mut [u8] {
        lend(&mut self.dt_table, len)
    }

    /// Misc partition I/O page
    pub fn misc(&mut self, len: usize) -> &mut [u8] {
        lend(&mut self.misc, len)
    }
}

impl Default for Staging {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a boot attempt knows about the device
#[derive(Debug)]
pub struct BootContext {
    pub config: BootConfig,
    page: PageSize,
    kind: StorageKind,
    pub device: DeviceInfoStore,
    /// Last authentication verified the image
    pub auth_kernel: bool,
    pub boot_into_recovery: bool,
    pub boot_mode: BootMode,
    pub serial: String,
    pub baseband: Baseband,
    pub staging: Staging,
}

impl BootContext {
    /// Probe page size, trust state and boot mode
    pub fn new(config: BootConfig, platform: &mut Platform<'_>, recovery: bool) -> Self {
        let kind = platform.storage.kind();
        // eMMC reports a fixed 2K, NAND its geometry
        let page = PageSize::new(platform.storage.page_size()).unwrap_or_default();

        let device = if config.signed_kernel {
            DeviceInfoStore::load(&mut *platform.storage).unwrap_or_else(|e| {
                log::error!("{}, assuming locked", e);
                DeviceInfoStore::detached(kind)
            })
        } else {
            DeviceInfoStore::detached(kind)
        };

        let board = &mut *platform.board;
        log::debug!("serial number: {}", board.serial_number());

        let mut ctx = Self {
            config,
            page,
            kind,
            device,
            auth_kernel: false,
            boot_into_recovery: recovery,
            boot_mode: BootMode::Normal,
            serial: String::from(board.serial_number()),
            baseband: board.baseband(),
            staging: Staging::new(),
        };

        let message = ctx.boot_mode_message(platform);
        ctx.boot_mode = resolve_boot_mode(message, recovery, platform.board.power_on_event());
        log::info!("boot mode {:?}", ctx.boot_mode);
        ctx
    }

    fn boot_mode_message(&mut self, platform: &mut Platform<'_>) -> Option<BootModeMessage> {
        let len = self.page.bytes();
        let page = self.staging.misc(len);
        match misc::read_region(&mut *platform.storage, MiscRegion::BootReason, 0, page) {
            Ok(()) => BootModeMessage::decode(page),
            Err(e) => {
                log::warn!("get boot mode message failed: {}", e);
                None
            }
        }
    }

    pub fn page(&self) -> PageSize {
        self.page
    }

    /// Switch to the page size an image was packed with
    pub fn set_page(&mut self, page: PageSize) {
        if page != self.page {
            log::debug!("page size {} -> {}", self.page.get(), page.get());
            self.page = page;
        }
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.kind
    }

    pub fn is_emmc(&self) -> bool {
        self.kind == StorageKind::Block
    }

    pub fn target(&self) -> BootTarget {
        if self.boot_into_recovery {
            BootTarget::Recovery
        } else {
            BootTarget::Primary
        }
    }

    /// Command line fragments as of now
    pub fn cmdline_params(&self) -> CmdlineParams<'_> {
        CmdlineParams {
            emmc: self.is_emmc(),
            serial: &self.serial,
            authorized_kernel: self.config.signed_kernel && self.auth_kernel,
            baseband: self.baseband,
            boot_mode: self.boot_mode,
        }
    }
}
