//! Legacy boot image header (version 0, Qualcomm `dt_size` variant)

use alloc::borrow::Cow;
use alloc::string::String;

use crate::error::{BootImageError, Result};

/// Size of the boot magic
pub const BOOT_MAGIC_SIZE: usize = 8;

/// Boot image magic
pub const BOOT_MAGIC: &[u8; BOOT_MAGIC_SIZE] = b"ANDROID!";

/// Size of the product name field
pub const BOOT_NAME_SIZE: usize = 16;

/// Size of the embedded kernel command line
pub const BOOT_ARGS_SIZE: usize = 512;

/// Size of the supplemental command line
pub const BOOT_EXTRA_ARGS_SIZE: usize = 1024;

/// Bytes occupied by the header fields on storage
pub const HEADER_SIZE: usize = 1632;

const OFF_KERNEL_SIZE: usize = 8;
const OFF_KERNEL_ADDR: usize = 12;
const OFF_RAMDISK_SIZE: usize = 16;
const OFF_RAMDISK_ADDR: usize = 20;
const OFF_SECOND_SIZE: usize = 24;
const OFF_SECOND_ADDR: usize = 28;
const OFF_TAGS_ADDR: usize = 32;
const OFF_PAGE_SIZE: usize = 36;
const OFF_DT_SIZE: usize = 40;
const OFF_UNUSED: usize = 44;
const OFF_NAME: usize = 48;
const OFF_CMDLINE: usize = OFF_NAME + BOOT_NAME_SIZE;
const OFF_ID: usize = OFF_CMDLINE + BOOT_ARGS_SIZE;
const OFF_EXTRA_CMDLINE: usize = OFF_ID + 32;

/// Decoded boot image header
///
/// ```text
/// 0x000 magic[8]        0x020 tags_addr
/// 0x008 kernel_size     0x024 page_size
/// 0x00c kernel_addr     0x028 dt_size
/// 0x010 ramdisk_size    0x02c unused
/// 0x014 ramdisk_addr    0x030 name[16]
/// 0x018 second_size     0x040 cmdline[512]
/// 0x01c second_addr     0x240 id[8]
///                       0x260 extra_cmdline[1024]
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct BootImageHeader {
    /// Kernel size in bytes
    pub kernel_size: u32,
    /// Physical load address of the kernel
    pub kernel_addr: u32,
    /// Ramdisk size in bytes
    pub ramdisk_size: u32,
    /// Physical load address of the ramdisk
    pub ramdisk_addr: u32,
    /// Second stage size in bytes (legacy, usually 0)
    pub second_size: u32,
    /// Physical load address of the second stage
    pub second_addr: u32,
    /// Physical address of the ATAGS / device tree
    pub tags_addr: u32,
    /// Page size the image was packed with
    pub page_size: u32,
    /// Size of the QCDT payload in bytes
    pub dt_size: u32,
    /// Reserved word, expected to be 0
    pub unused: u32,
    /// Product name, NUL padded
    pub name: [u8; BOOT_NAME_SIZE],
    /// Kernel command line, NUL padded
    pub cmdline: [u8; BOOT_ARGS_SIZE],
    /// Image digest words
    pub id: [u32; 8],
    /// Supplemental command line, NUL padded
    pub extra_cmdline: [u8; BOOT_EXTRA_ARGS_SIZE],
}

impl BootImageHeader {
    /// An all-zero header carrying the boot magic
    pub fn empty() -> Self {
        Self {
            kernel_size: 0,
            kernel_addr: 0,
            ramdisk_size: 0,
            ramdisk_addr: 0,
            second_size: 0,
            second_addr: 0,
            tags_addr: 0,
            page_size: 0,
            dt_size: 0,
            unused: 0,
            name: [0; BOOT_NAME_SIZE],
            cmdline: [0; BOOT_ARGS_SIZE],
            id: [0; 8],
            extra_cmdline: [0; BOOT_EXTRA_ARGS_SIZE],
        }
    }

    /// Parse a header from the first bytes of a boot image
    ///
    /// The magic comparison is exact: every one of the eight bytes must match.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(BootImageError::BufferTooSmall);
        }
        if !has_magic(data) {
            return Err(BootImageError::BadMagic);
        }

        let mut header = Self::empty();
        header.kernel_size = le_u32(data, OFF_KERNEL_SIZE);
        header.kernel_addr = le_u32(data, OFF_KERNEL_ADDR);
        header.ramdisk_size = le_u32(data, OFF_RAMDISK_SIZE);
        header.ramdisk_addr = le_u32(data, OFF_RAMDISK_ADDR);
        header.second_size = le_u32(data, OFF_SECOND_SIZE);
        header.second_addr = le_u32(data, OFF_SECOND_ADDR);
        header.tags_addr = le_u32(data, OFF_TAGS_ADDR);
        header.page_size = le_u32(data, OFF_PAGE_SIZE);
        header.dt_size = le_u32(data, OFF_DT_SIZE);
        header.unused = le_u32(data, OFF_UNUSED);
        header
            .name
            .copy_from_slice(&data[OFF_NAME..OFF_NAME + BOOT_NAME_SIZE]);
        header
            .cmdline
            .copy_from_slice(&data[OFF_CMDLINE..OFF_CMDLINE + BOOT_ARGS_SIZE]);
        for (i, word) in header.id.iter_mut().enumerate() {
            *word = le_u32(data, OFF_ID + i * 4);
        }
        header.extra_cmdline.copy_from_slice(
            &data[OFF_EXTRA_CMDLINE..OFF_EXTRA_CMDLINE + BOOT_EXTRA_ARGS_SIZE],
        );

        // The loader hands cmdline to C-string consumers; keep it terminated.
        header.cmdline[BOOT_ARGS_SIZE - 1] = 0;

        Ok(header)
    }

    /// Serialize into the on-storage layout
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..BOOT_MAGIC_SIZE].copy_from_slice(BOOT_MAGIC);
        put_u32(&mut out, OFF_KERNEL_SIZE, self.kernel_size);
        put_u32(&mut out, OFF_KERNEL_ADDR, self.kernel_addr);
        put_u32(&mut out, OFF_RAMDISK_SIZE, self.ramdisk_size);
        put_u32(&mut out, OFF_RAMDISK_ADDR, self.ramdisk_addr);
        put_u32(&mut out, OFF_SECOND_SIZE, self.second_size);
        put_u32(&mut out, OFF_SECOND_ADDR, self.second_addr);
        put_u32(&mut out, OFF_TAGS_ADDR, self.tags_addr);
        put_u32(&mut out, OFF_PAGE_SIZE, self.page_size);
        put_u32(&mut out, OFF_DT_SIZE, self.dt_size);
        put_u32(&mut out, OFF_UNUSED, self.unused);
        out[OFF_NAME..OFF_NAME + BOOT_NAME_SIZE].copy_from_slice(&self.name);
        out[OFF_CMDLINE..OFF_CMDLINE + BOOT_ARGS_SIZE].copy_from_slice(&self.cmdline);
        for (i, word) in self.id.iter().enumerate() {
            put_u32(&mut out, OFF_ID + i * 4, *word);
        }
        out[OFF_EXTRA_CMDLINE..OFF_EXTRA_CMDLINE + BOOT_EXTRA_ARGS_SIZE]
            .copy_from_slice(&self.extra_cmdline);
        out
    }

    /// Embedded command line up to the first NUL
    ///
    /// Returns an empty string when the field is empty or not valid UTF-8.
    pub fn cmdline_str(&self) -> &str {
        c_str(&self.cmdline)
    }

    /// Embedded command line up to the first NUL, invalid UTF-8 replaced
    /// with U+FFFD instead of dropped
    pub fn cmdline_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(c_bytes(&self.cmdline))
    }

    /// Product name up to the first NUL
    pub fn name_str(&self) -> &str {
        c_str(&self.name)
    }

    /// Store `cmdline` into the embedded field, truncating to fit
    pub fn set_cmdline(&mut self, cmdline: &str) {
        self.cmdline = [0; BOOT_ARGS_SIZE];
        let len = cmdline.len().min(BOOT_ARGS_SIZE - 1);
        self.cmdline[..len].copy_from_slice(&cmdline.as_bytes()[..len]);
    }
}

impl core::fmt::Debug for BootImageHeader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootImageHeader")
            .field("kernel_size", &self.kernel_size)
            .field("kernel_addr", &format_args!("{:#x}", self.kernel_addr))
            .field("ramdisk_size", &self.ramdisk_size)
            .field("ramdisk_addr", &format_args!("{:#x}", self.ramdisk_addr))
            .field("second_size", &self.second_size)
            .field("tags_addr", &format_args!("{:#x}", self.tags_addr))
            .field("page_size", &self.page_size)
            .field("dt_size", &self.dt_size)
            .field("name", &self.name_str())
            .field("cmdline", &self.cmdline_str())
            .finish()
    }
}

/// Check the eight magic bytes at the start of `data`
pub fn has_magic(data: &[u8]) -> bool {
    data.len() >= BOOT_MAGIC_SIZE && &data[..BOOT_MAGIC_SIZE] == BOOT_MAGIC
}

pub(crate) fn le_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn put_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn c_bytes(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

fn c_str(field: &[u8]) -> &str {
    core::str::from_utf8(c_bytes(field)).unwrap_or("")
}
