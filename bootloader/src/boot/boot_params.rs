// Kernel boot parameters: ATAGS or a patched device tree
//
// ATAG list layout (all words little endian):
//   [size in words incl. header][tag][payload...]  repeated
//   [0][0]                                          terminator

use alloc::vec::Vec;

use bootimg::fdt::{self, Fdt, FdtError};
use droidboot_core::PartitionTable;

use super::memory::PhysicalMemory;
use crate::error::BootError;
use crate::platform::MemoryBank;

pub const ATAG_NONE: u32 = 0x0000_0000;
pub const ATAG_CORE: u32 = 0x5441_0001;
pub const ATAG_MEM: u32 = 0x5441_0002;
pub const ATAG_INITRD2: u32 = 0x5442_0005;
pub const ATAG_CMDLINE: u32 = 0x5441_0009;
/// Qualcomm NAND partition table ("MSMp")
pub const ATAG_MSM_PTABLE: u32 = 0x4d53_4d70;

/// Bytes of partition name carried per PTABLE entry
const PTABLE_NAME_LEN: usize = 16;
/// name[16], offset, size, flags
const PTABLE_ENTRY_WORDS: usize = PTABLE_NAME_LEN / 4 + 3;

/// Append-only ATAG list
#[derive(Debug, Default, Clone)]
pub struct TagBuilder {
    words: Vec<u32>,
}

impl TagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(&mut self, tag: u32, payload: &[u32]) -> &mut Self {
        self.words.push(payload.len() as u32 + 2);
        self.words.push(tag);
        self.words.extend_from_slice(payload);
        self
    }

    /// CORE with no payload
    pub fn core(&mut self) -> &mut Self {
        self.tag(ATAG_CORE, &[])
    }

    /// INITRD2; skipped for an empty ramdisk
    pub fn initrd(&mut self, start: u32, size: u32) -> &mut Self {
        if size == 0 {
            return self;
        }
        self.tag(ATAG_INITRD2, &[start, size])
    }

    pub fn mem(&mut self, bank: &MemoryBank) -> &mut Self {
        self.tag(ATAG_MEM, &[bank.size, bank.start])
    }

    /// One PTABLE tag for the whole table; skipped when it is empty
    pub fn ptable(&mut self, table: &PartitionTable) -> &mut Self {
        if table.is_empty() {
            return self;
        }
        let mut payload = Vec::with_capacity(table.count() * PTABLE_ENTRY_WORDS);
        for part in table.iter() {
            let mut name = [0u8; PTABLE_NAME_LEN];
            name[..PTABLE_NAME_LEN - 1].copy_from_slice(&part.name_bytes()[..PTABLE_NAME_LEN - 1]);
            payload.extend(
                name.chunks_exact(4)
                    .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]])),
            );
            payload.push(part.start as u32);
            payload.push(part.length as u32);
            payload.push(part.flags);
        }
        self.tag(ATAG_MSM_PTABLE, &payload)
    }

    /// CMDLINE, NUL terminated and padded to a word
    pub fn cmdline(&mut self, cmdline: &str) -> &mut Self {
        let n = (cmdline.len() + 4) & !3;
        let mut bytes = Vec::with_capacity(n);
        bytes.extend_from_slice(cmdline.as_bytes());
        bytes.resize(n, 0);
        let payload: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        self.tag(ATAG_CMDLINE, &payload)
    }

    /// Terminate the list
    pub fn end(&mut self) -> &mut Self {
        self.words.push(0);
        self.words.push(ATAG_NONE);
        self
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// What the kernel needs to find its memory, ramdisk and command line
#[derive(Debug, Clone, Copy)]
pub struct BootParams<'a> {
    pub tags_addr: u32,
    pub ramdisk_addr: u32,
    pub ramdisk_size: u32,
    pub cmdline: &'a str,
    pub banks: &'a [MemoryBank],
    /// Raw NAND partition table, passed in ATAGS only
    pub ptable: Option<&'a PartitionTable>,
}

/// How boot parameters reach the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterEncoder {
    /// Build an ATAG list at the tags address
    Atags,
    /// Patch the device tree staged at the tags address
    DeviceTree,
}

impl ParameterEncoder {
    /// Write the parameters at `params.tags_addr`, returning bytes used
    ///
    /// `capacity` bounds what may be written there.
    pub fn encode(
        self,
        memory: &mut dyn PhysicalMemory,
        params: &BootParams<'_>,
        capacity: usize,
    ) -> Result<usize, BootError> {
        match self {
            Self::Atags => {
                let tags = generate_atags(params).to_bytes();
                if tags.len() > capacity {
                    log::error!("atags need {} bytes, {} reserved", tags.len(), capacity);
                    return Err(BootError::Memory);
                }
                memory
                    .slice_mut(params.tags_addr, tags.len())?
                    .copy_from_slice(&tags);
                Ok(tags.len())
            }
            Self::DeviceTree => {
                let blob = staged_fdt(&*memory, params.tags_addr, capacity)?;
                let patched = update_device_tree(blob, params).map_err(|e| {
                    log::error!("ERROR: Updating Device Tree Failed: {}", e);
                    BootError::DeviceTreeEncode
                })?;
                let dst = memory
                    .slice_mut(params.tags_addr, capacity)
                    .map_err(|_| BootError::DeviceTreeEncode)?;
                Ok(patched.pack_into(dst)?)
            }
        }
    }
}

/// The device tree blob at `addr`, header checked
fn staged_fdt(
    memory: &dyn PhysicalMemory,
    addr: u32,
    capacity: usize,
) -> Result<&[u8], BootError> {
    let head = memory
        .slice(addr, fdt::FDT_HEADER_SIZE)
        .map_err(|_| BootError::DeviceTreeEncode)?;
    let total = u32::from_be_bytes([head[4], head[5], head[6], head[7]]) as usize;
    let blob = memory
        .slice(addr, total.min(capacity))
        .map_err(|_| BootError::DeviceTreeEncode)?;
    fdt::check_header(blob).map_err(|e| {
        log::error!("Invalid device tree header: {}", e);
        BootError::DeviceTreeEncode
    })?;
    Ok(blob)
}

/// ATAG list for `params`
pub fn generate_atags(params: &BootParams<'_>) -> TagBuilder {
    let mut tags = TagBuilder::new();
    tags.core().initrd(params.ramdisk_addr, params.ramdisk_size);
    for bank in params.banks {
        tags.mem(bank);
    }
    if let Some(table) = params.ptable {
        tags.ptable(table);
    }
    tags.cmdline(params.cmdline).end();
    tags
}

/// Set `/memory` reg, bootargs and the initrd range on a copy of `blob`
pub fn update_device_tree(blob: &[u8], params: &BootParams<'_>) -> Result<Fdt, FdtError> {
    let mut tree = Fdt::parse(blob)?;

    let reg: Vec<u32> = params
        .banks
        .iter()
        .flat_map(|bank| [bank.start, bank.size])
        .collect();
    tree.set_cells("/memory", "reg", &reg)?;

    tree.set_string("/chosen", "bootargs", params.cmdline)?;
    tree.set_u32("/chosen", "linux,initrd-start", params.ramdisk_addr)?;
    tree.set_u32(
        "/chosen",
        "linux,initrd-end",
        params.ramdisk_addr.wrapping_add(params.ramdisk_size),
    )?;
    Ok(tree)
}
