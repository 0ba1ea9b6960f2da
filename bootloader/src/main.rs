//! droidboot bare-metal entry
//!
//! The board's start code (clocks, MMU identity map, eMMC and USB drivers)
//! runs first and calls [`aboot_main`]. Everything the loader needs from it
//! comes through the `extern "C"` hooks below.

#![no_std]
#![no_main]

extern crate alloc;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::panic::PanicInfo;

use droidboot_bootloader::aboot::{self, Transport};
use droidboot_bootloader::boot::cmdline::Baseband;
use droidboot_bootloader::boot::{BootConfig, RamWindow, Verifier};
use droidboot_bootloader::fastboot::Responder;
use droidboot_bootloader::heap;
use droidboot_bootloader::platform::{Board, KeyState, MemoryBank, Platform, PowerOnEvent};
use droidboot_core::storage::BlockStorage;
use droidboot_core::logger;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

#[cfg(target_arch = "arm")]
use droidboot_bootloader::boot::arch::ArmV7;

/// Board hooks implemented by the start code
mod board {
    extern "C" {
        pub fn target_serialno(buf: *mut u8, len: usize) -> usize;
        pub fn target_product() -> *const u8;
        pub fn target_baseband() -> u32;
        pub fn board_machtype() -> u32;
        pub fn board_platform_id() -> u32;
        pub fn board_hardware_id() -> u32;
        pub fn board_ram_start() -> u32;
        pub fn board_ram_size() -> u32;
        /// 1 while HOME/VOLUME UP (recovery) or BACK/VOLUME DOWN (fastboot) is held
        pub fn keys_recovery() -> i32;
        pub fn keys_fastboot() -> i32;
        pub fn check_reboot_mode() -> u32;
        /// 0 normal, 1 factory test cable, 2 USB charger
        pub fn target_power_on_event() -> u32;
        pub fn set_tamper_fuse_cmd();
        pub fn set_tamper_flag(tampered: u32);
        pub fn reboot_device(reason: u32) -> !;
        pub fn target_uninit();

        pub fn mmc_block_count() -> u64;
        pub fn mmc_read(lba: u64, buf: *mut u8, len: usize) -> i32;
        pub fn mmc_write(lba: u64, buf: *const u8, len: usize) -> i32;

        pub fn image_verify(image: *const u8, len: usize, signature: *const u8, sig_len: usize) -> i32;

        pub fn uart_write(buf: *const u8, len: usize);

        /// Blocks until a command arrives; returns its length or -1 when USB
        /// went away. `data`/`data_len` describe the last download.
        pub fn fastboot_next(
            cmd: *mut u8,
            cap: usize,
            data: *mut *const u8,
            data_len: *mut usize,
        ) -> isize;
        pub fn fastboot_reply(kind: *const u8, msg: *const u8, len: usize);
        pub fn udc_stop();
    }
}

/// Bottom of RAM kept for the loader image, stack and heap
const RAM_RESERVED: u32 = 0x0020_0000;

fn uart_sink(bytes: &[u8]) {
    unsafe { board::uart_write(bytes.as_ptr(), bytes.len()) };
}

#[derive(Debug, Clone, Copy)]
struct MmcError(i32);

impl fmt::Display for MmcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mmc error {}", self.0)
    }
}

/// eMMC user area through the board driver
struct Mmc;

impl BlockIo for Mmc {
    type Error = MmcError;

    fn block_size(&self) -> BlockSize {
        BlockSize::BS_512
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok(unsafe { board::mmc_block_count() })
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        match unsafe { board::mmc_read(start_lba.0, dst.as_mut_ptr(), dst.len()) } {
            0 => Ok(()),
            e => Err(MmcError(e)),
        }
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        match unsafe { board::mmc_write(start_lba.0, src.as_ptr(), src.len()) } {
            0 => Ok(()),
            e => Err(MmcError(e)),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

struct TargetBoard {
    product: String,
    serial: String,
    banks: [MemoryBank; 1],
}

impl TargetBoard {
    fn probe() -> Self {
        let mut sn = [0u8; 32];
        let n = unsafe { board::target_serialno(sn.as_mut_ptr(), sn.len()) }.min(sn.len());
        Self {
            product: unsafe { c_str(board::target_product()) },
            serial: String::from_utf8_lossy(&sn[..n]).into_owned(),
            banks: [MemoryBank {
                start: unsafe { board::board_ram_start() },
                size: unsafe { board::board_ram_size() },
            }],
        }
    }
}

unsafe fn c_str(p: *const u8) -> String {
    if p.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *p.add(len) != 0 {
        len += 1;
    }
    String::from_utf8_lossy(core::slice::from_raw_parts(p, len)).into_owned()
}

impl Board for TargetBoard {
    fn product(&self) -> &str {
        &self.product
    }

    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn baseband(&self) -> Baseband {
        match unsafe { board::target_baseband() } {
            0 => Baseband::Apq,
            2 => Baseband::Csfb,
            3 => Baseband::Svlte2a,
            4 => Baseband::Mdm,
            5 => Baseband::Sglte,
            _ => Baseband::Msm,
        }
    }

    fn machine_type(&self) -> u32 {
        unsafe { board::board_machtype() }
    }

    fn platform_id(&self) -> u32 {
        unsafe { board::board_platform_id() }
    }

    fn variant_id(&self) -> u32 {
        unsafe { board::board_hardware_id() }
    }

    fn memory_banks(&self) -> &[MemoryBank] {
        &self.banks
    }

    fn keys(&mut self) -> KeyState {
        KeyState {
            recovery: unsafe { board::keys_recovery() } != 0,
            fastboot: unsafe { board::keys_fastboot() } != 0,
        }
    }

    fn reboot_mode(&mut self) -> u32 {
        unsafe { board::check_reboot_mode() }
    }

    fn power_on_event(&mut self) -> PowerOnEvent {
        match unsafe { board::target_power_on_event() } {
            1 => PowerOnEvent::Ftm,
            2 => PowerOnEvent::UsbCharger,
            _ => PowerOnEvent::Normal,
        }
    }

    fn set_tamper_fuse(&mut self) {
        unsafe { board::set_tamper_fuse_cmd() };
    }

    fn set_tamper_flag(&mut self, tampered: bool) {
        unsafe { board::set_tamper_flag(tampered as u32) };
    }

    fn reboot(&mut self, reason: u32) -> ! {
        unsafe { board::reboot_device(reason) }
    }
}

struct CryptoVerifier;

impl Verifier for CryptoVerifier {
    fn verify(&self, image: &[u8], signature: &[u8]) -> bool {
        unsafe {
            board::image_verify(image.as_ptr(), image.len(), signature.as_ptr(), signature.len()) == 1
        }
    }
}

struct Usb {
    cmd: Vec<u8>,
}

impl Usb {
    fn reply(&mut self, kind: &[u8; 4], msg: &str) {
        unsafe { board::fastboot_reply(kind.as_ptr(), msg.as_ptr(), msg.len()) };
    }
}

impl Responder for Usb {
    fn okay(&mut self, msg: &str) {
        self.reply(b"OKAY", msg);
    }

    fn fail(&mut self, msg: &str) {
        self.reply(b"FAIL", msg);
    }

    fn info(&mut self, msg: &str) {
        self.reply(b"INFO", msg);
    }
}

impl Transport for Usb {
    fn next_command(&mut self) -> Option<(String, Vec<u8>)> {
        let mut data: *const u8 = core::ptr::null();
        let mut data_len = 0usize;
        let n = unsafe {
            board::fastboot_next(self.cmd.as_mut_ptr(), self.cmd.len(), &mut data, &mut data_len)
        };
        let n = usize::try_from(n).ok()?.min(self.cmd.len());
        let command = String::from_utf8_lossy(&self.cmd[..n]).into_owned();
        let download = if data.is_null() {
            Vec::new()
        } else {
            unsafe { core::slice::from_raw_parts(data, data_len) }.to_vec()
        };
        Some((command, download))
    }

    fn stop(&mut self) {
        unsafe { board::udc_stop() };
    }
}

#[cfg(target_arch = "arm")]
fn uninit() {
    unsafe { board::target_uninit() };
}

#[no_mangle]
pub extern "C" fn aboot_main() -> ! {
    unsafe { heap::init_heap() };
    logger::LOGGER.set_sink(uart_sink);
    let _ = logger::init(log::LevelFilter::Info);
    log::info!("droidboot {}", env!("CARGO_PKG_VERSION"));

    let mut board = TargetBoard::probe();
    let config = BootConfig::default();

    let mut storage = match BlockStorage::new(Mmc) {
        Ok(storage) => storage,
        Err(e) => {
            log::error!("ERROR: no usable eMMC: {}", e);
            board.reboot(0)
        }
    };

    let bank = board.banks[0];
    let mut memory = unsafe {
        RamWindow::from_raw(bank.start + RAM_RESERVED, bank.size.saturating_sub(RAM_RESERVED) as usize)
    };
    let verifier = CryptoVerifier;
    let mut usb = Usb { cmd: vec![0u8; 64] };

    let mut platform = Platform {
        storage: &mut storage,
        memory: &mut memory,
        board: &mut board,
        verifier: &verifier,
    };

    #[cfg(target_arch = "arm")]
    {
        let mut cpu = ArmV7::new(uninit);
        aboot::run(config, &mut platform, &mut cpu, &mut usb)
    }

    #[cfg(not(target_arch = "arm"))]
    {
        let _ = (config, &mut usb);
        log::error!("no handoff for this architecture");
        platform.board.reboot(0)
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log::error!("panic: {}", info);
    unsafe { board::reboot_device(0) }
}
