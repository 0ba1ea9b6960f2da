//! Common test utilities: memory-backed storage, a mock board and a rig
//! that wires them into a [`Platform`]

#![allow(dead_code)]

#[path = "../../../core/tests/common/gpt.rs"]
pub mod gpt;
pub mod images;

pub use gpt::GptBuilder;
pub use images::{dt_payload, pattern, qcdt_page, FdtBuilder, ImageBuilder, SparseBuilder};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};

use droidboot_bootloader::aboot::Transport;
use droidboot_bootloader::boot::cmdline::Baseband;
use droidboot_bootloader::boot::{BootConfig, Cpu, ParameterEncoder, RamWindow, Verifier};
use droidboot_bootloader::fastboot::Responder;
use droidboot_bootloader::platform::{Board, KeyState, MemoryBank, Platform, PowerOnEvent};
use droidboot_core::storage::{BlockStorage, FlashStorage, NandFlash};
use droidboot_core::{PartitionRegion, PartitionTable, Storage};
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

pub const RAM_BASE: u32 = 0;
pub const RAM_SIZE: usize = 0x40_0000;
pub const TAGS_ADDR: u32 = 0x100;
pub const KERNEL_ADDR: u32 = 0x8000;
pub const RAMDISK_ADDR: u32 = 0x10_0000;
pub const SCRATCH_ADDR: u32 = 0x20_0000;
pub const TAGS_CAPACITY: usize = 0x4000;

pub const PLATFORM_ID: u32 = 109;
pub const VARIANT_ID: u32 = 8;
pub const MACHINE_TYPE: u32 = 3327;
pub const SERIAL: &str = "a1b2c3d4";
pub const PRODUCT: &str = "droidboot-test";

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    /// Zero-filled device of `blocks` 512-byte sectors
    pub fn new(blocks: usize) -> Self {
        Self {
            data: vec![0u8; blocks * 512],
            block_size: 512,
        }
    }

    fn range(&self, lba: Lba, len: usize) -> io::Result<std::ops::Range<usize>> {
        let start = lba.0 as usize * self.block_size;
        if len % self.block_size != 0 || start + len > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad block range"));
        }
        Ok(start..start + len)
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).unwrap()
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(start_lba, dst.len())?;
        dst.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(start_lba, src.len())?;
        self.data[range].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// In-memory NAND with per-page spare areas
#[derive(Debug, Clone)]
pub struct MemoryNand {
    pub page_size: u32,
    pub pages_per_block: u32,
    pub pages: Vec<Vec<u8>>,
    pub spare: Vec<Vec<u8>>,
    pub erased_blocks: Vec<u32>,
}

impl MemoryNand {
    pub fn new(page_size: u32, pages_per_block: u32, blocks: u32) -> Self {
        let count = (pages_per_block * blocks) as usize;
        Self {
            page_size,
            pages_per_block,
            pages: vec![vec![0xff; page_size as usize]; count],
            spare: vec![Vec::new(); count],
            erased_blocks: Vec::new(),
        }
    }

    pub fn block_bytes(&self) -> u32 {
        self.page_size * self.pages_per_block
    }
}

impl NandFlash for MemoryNand {
    type Error = &'static str;

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn pages_per_block(&self) -> u32 {
        self.pages_per_block
    }

    fn uses_bch_ecc(&self) -> bool {
        false
    }

    fn read_page(&mut self, page: u32, data: &mut [u8]) -> Result<(), Self::Error> {
        let src = self.pages.get(page as usize).ok_or("page out of range")?;
        data.copy_from_slice(src);
        Ok(())
    }

    fn write_page(&mut self, page: u32, data: &[u8], spare: &[u8]) -> Result<(), Self::Error> {
        let dst = self.pages.get_mut(page as usize).ok_or("page out of range")?;
        if dst.iter().any(|&b| b != 0xff) {
            return Err("programming a page that was not erased");
        }
        dst.copy_from_slice(data);
        self.spare[page as usize] = spare.to_vec();
        Ok(())
    }

    fn erase_block(&mut self, block: u32) -> Result<(), Self::Error> {
        let first = (block * self.pages_per_block) as usize;
        let last = first + self.pages_per_block as usize;
        if last > self.pages.len() {
            return Err("block out of range");
        }
        for page in first..last {
            self.pages[page].fill(0xff);
            self.spare[page].clear();
        }
        self.erased_blocks.push(block);
        Ok(())
    }
}

/// eMMC with the usual Android partitions
///
/// ```text
/// boot 256K  recovery 256K  aboot 8K  misc 1M  userdata 512K  cache 256K  system 1M
/// ```
pub fn emmc() -> BlockStorage<MemoryBlockDevice> {
    let device = GptBuilder::new(8192)
        .partition("boot", 64, 512)
        .partition("recovery", 576, 512)
        .partition("aboot", 1088, 16)
        .partition("misc", 1104, 2048)
        .partition("userdata", 3152, 1024)
        .partition("cache", 4176, 512)
        .partition("system", 4688, 2048)
        .build();
    BlockStorage::new(device).unwrap()
}

/// eMMC holding only the partitions named
pub fn emmc_with(names: &[&str]) -> BlockStorage<MemoryBlockDevice> {
    let mut gpt = GptBuilder::new(8192);
    for (i, name) in names.iter().enumerate() {
        gpt = gpt.partition(name, 64 + i as u64 * 1024, 1024);
    }
    BlockStorage::new(gpt.build()).unwrap()
}

/// 2K-page NAND, 8K erase blocks, 2M total
pub fn nand() -> FlashStorage<MemoryNand> {
    let nand = MemoryNand::new(2048, 4, 256);
    let unit = nand.block_bytes();
    let mut table = PartitionTable::new();
    for (name, start, len) in [
        ("boot", 0, 32),
        ("recovery", 32, 32),
        ("devinfo", 64, 1),
        ("system", 65, 32),
        ("userdata", 97, 32),
    ] {
        table
            .add_partition(PartitionRegion::new(name, start, len, unit, 0))
            .unwrap();
    }
    FlashStorage::new(nand, table)
}

/// Config sized for the rig's RAM
pub fn test_config() -> BootConfig {
    BootConfig {
        scratch_addr: SCRATCH_ADDR,
        max_download_size: 0x10_0000,
        tags_capacity: TAGS_CAPACITY,
        fdt_capacity: TAGS_CAPACITY,
        encoder: ParameterEncoder::Atags,
        signed_kernel: false,
        tamper_fuse: false,
        pcom_secboot: false,
        ..BootConfig::default()
    }
}

/// Raised by [`MockBoard::reboot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rebooted(pub u32);

pub struct MockBoard {
    pub baseband: Baseband,
    pub banks: Vec<MemoryBank>,
    pub keys: KeyState,
    pub reboot_mode: u32,
    pub power_on: PowerOnEvent,
    pub fuse_blown: bool,
    pub tamper_flag: Option<bool>,
}

impl Default for MockBoard {
    fn default() -> Self {
        Self {
            baseband: Baseband::Msm,
            banks: vec![MemoryBank {
                start: RAM_BASE,
                size: RAM_SIZE as u32,
            }],
            keys: KeyState::default(),
            reboot_mode: 0,
            power_on: PowerOnEvent::Normal,
            fuse_blown: false,
            tamper_flag: None,
        }
    }
}

impl Board for MockBoard {
    fn product(&self) -> &str {
        PRODUCT
    }

    fn serial_number(&self) -> &str {
        SERIAL
    }

    fn baseband(&self) -> Baseband {
        self.baseband
    }

    fn machine_type(&self) -> u32 {
        MACHINE_TYPE
    }

    fn platform_id(&self) -> u32 {
        PLATFORM_ID
    }

    fn variant_id(&self) -> u32 {
        VARIANT_ID
    }

    fn memory_banks(&self) -> &[MemoryBank] {
        &self.banks
    }

    fn keys(&mut self) -> KeyState {
        self.keys
    }

    fn reboot_mode(&mut self) -> u32 {
        self.reboot_mode
    }

    fn power_on_event(&mut self) -> PowerOnEvent {
        self.power_on
    }

    fn set_tamper_fuse(&mut self) {
        self.fuse_blown = true;
    }

    fn set_tamper_flag(&mut self, tampered: bool) {
        self.tamper_flag = Some(tampered);
    }

    fn reboot(&mut self, reason: u32) -> ! {
        panic::panic_any(Rebooted(reason))
    }
}

/// Verifier with a fixed verdict that remembers what it was shown
#[derive(Default)]
pub struct MockVerifier {
    pub accept: bool,
    pub calls: Cell<usize>,
    pub image_len: Cell<usize>,
    pub signature: RefCell<Vec<u8>>,
}

impl MockVerifier {
    pub fn new(accept: bool) -> Self {
        Self {
            accept,
            ..Self::default()
        }
    }
}

impl Verifier for MockVerifier {
    fn verify(&self, image: &[u8], signature: &[u8]) -> bool {
        self.calls.set(self.calls.get() + 1);
        self.image_len.set(image.len());
        *self.signature.borrow_mut() = signature.to_vec();
        self.accept
    }
}

/// Raised by [`MockCpu::jump`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jumped {
    pub entry: u32,
    pub r0: u32,
    pub machine: u32,
    pub tags: u32,
}

/// Records the handoff sequence
#[derive(Default)]
pub struct MockCpu {
    pub calls: Vec<&'static str>,
}

impl Cpu for MockCpu {
    fn platform_uninit(&mut self) {
        self.calls.push("platform_uninit");
    }

    fn disable_cache(&mut self) {
        self.calls.push("disable_cache");
    }

    fn barrier(&mut self) {
        self.calls.push("barrier");
    }

    fn disable_mmu(&mut self) {
        self.calls.push("disable_mmu");
    }

    fn jump(&mut self, entry: u32, r0: u32, machine: u32, tags: u32) -> ! {
        self.calls.push("jump");
        panic::panic_any(Jumped {
            entry,
            r0,
            machine,
            tags,
        })
    }
}

/// Run `f` and return the payload it diverged with
pub fn diverges<T: 'static>(f: impl FnOnce()) -> T {
    let payload = panic::catch_unwind(AssertUnwindSafe(f)).expect_err("call should not return");
    match payload.downcast::<T>() {
        Ok(value) => *value,
        Err(other) => match other.downcast::<String>() {
            Ok(msg) => panic!("unexpected panic: {}", msg),
            Err(_) => panic!("unexpected panic payload"),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Okay,
    Fail,
    Info,
}

/// Every answer the host would have seen
#[derive(Debug, Default)]
pub struct Replies {
    pub lines: Vec<(Kind, String)>,
}

impl Replies {
    /// The final OKAY or FAIL
    pub fn last(&self) -> Option<(Kind, &str)> {
        self.lines.last().map(|(k, m)| (*k, m.as_str()))
    }

    pub fn infos(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(k, _)| *k == Kind::Info)
            .map(|(_, m)| m.as_str())
            .collect()
    }
}

impl Responder for Replies {
    fn okay(&mut self, msg: &str) {
        self.lines.push((Kind::Okay, msg.to_string()));
    }

    fn fail(&mut self, msg: &str) {
        self.lines.push((Kind::Fail, msg.to_string()));
    }

    fn info(&mut self, msg: &str) {
        self.lines.push((Kind::Info, msg.to_string()));
    }
}

/// Transport that plays back a fixed command list
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub commands: VecDeque<(String, Vec<u8>)>,
    pub replies: Replies,
    pub stops: usize,
}

impl ScriptedTransport {
    pub fn new(commands: &[&str]) -> Self {
        Self {
            commands: commands.iter().map(|c| (c.to_string(), Vec::new())).collect(),
            ..Self::default()
        }
    }

    pub fn with_download(mut self, command: &str, data: Vec<u8>) -> Self {
        self.commands.push_back((command.to_string(), data));
        self
    }
}

impl Responder for ScriptedTransport {
    fn okay(&mut self, msg: &str) {
        self.replies.okay(msg);
    }

    fn fail(&mut self, msg: &str) {
        self.replies.fail(msg);
    }

    fn info(&mut self, msg: &str) {
        self.replies.info(msg);
    }
}

impl Transport for ScriptedTransport {
    fn next_command(&mut self) -> Option<(String, Vec<u8>)> {
        self.commands.pop_front()
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

/// Storage, RAM, board and verifier for one test
pub struct Rig<S: Storage> {
    pub storage: S,
    pub ram: RamWindow<'static>,
    pub board: MockBoard,
    pub verifier: MockVerifier,
}

impl<S: Storage> Rig<S> {
    pub fn new(storage: S) -> Self {
        let ram: &'static mut [u8] = Box::leak(vec![0u8; RAM_SIZE].into_boxed_slice());
        Self {
            storage,
            ram: RamWindow::new(RAM_BASE, ram),
            board: MockBoard::default(),
            verifier: MockVerifier::new(true),
        }
    }

    pub fn platform(&mut self) -> Platform<'_> {
        Platform {
            storage: &mut self.storage,
            memory: &mut self.ram,
            board: &mut self.board,
            verifier: &self.verifier,
        }
    }

    /// Write `data` at the start of partition `name`
    pub fn install(&mut self, name: &str, data: &[u8]) {
        let part = self.storage.find(name).unwrap();
        self.storage.write(&part, 0, data).unwrap();
    }

    pub fn read_back(&mut self, name: &str, offset: u64, len: usize) -> Vec<u8> {
        let part = self.storage.find(name).unwrap();
        let mut out = vec![0u8; len];
        self.storage.read(&part, offset, &mut out).unwrap();
        out
    }
}
