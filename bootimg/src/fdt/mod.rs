//! Flattened device tree editing
//!
//! Just enough of libfdt for a boot loader: check a blob, change properties
//! on existing nodes, and pack the result back into the smallest blob.
//!
//! ```ignore
//! let mut fdt = Fdt::parse(blob)?;
//! fdt.set_string("/chosen", "bootargs", cmdline)?;
//! let packed = fdt.pack();
//! ```

mod header;
mod tree;

use alloc::vec::Vec;
use core::fmt;

pub use header::{FdtHeader, FDT_HEADER_SIZE, FDT_MAGIC};
pub use tree::{Node, Property};

use header::{be_u32, FDT_LAST_COMP_VERSION, FDT_VERSION};
use tree::Emitter;

const RSVMAP_ENTRY_SIZE: usize = 16;

/// Errors from device tree parsing and editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtError {
    /// Blob shorter than its header claims
    Truncated,
    /// Magic is not 0xd00dfeed
    BadMagic,
    /// Version outside 16..=17
    BadVersion,
    /// Block offsets or sizes lie outside the blob
    BadLayout,
    /// Structure block is malformed
    BadStructure,
    /// No node at the requested path
    NotFound,
    /// Packed blob exceeds the space available for it
    NoSpace,
}

impl fmt::Display for FdtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated device tree"),
            Self::BadMagic => write!(f, "bad device tree magic"),
            Self::BadVersion => write!(f, "unsupported device tree version"),
            Self::BadLayout => write!(f, "bad device tree layout"),
            Self::BadStructure => write!(f, "bad device tree structure"),
            Self::NotFound => write!(f, "device tree node not found"),
            Self::NoSpace => write!(f, "device tree does not fit"),
        }
    }
}

/// An editable device tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fdt {
    /// Memory reservation entries `(address, size)`
    pub reservations: Vec<(u64, u64)>,
    /// Boot CPU id carried through packing
    pub boot_cpuid_phys: u32,
    /// Root node
    pub root: Node,
}

/// Validate the header of `blob` without decoding the tree
pub fn check_header(blob: &[u8]) -> Result<FdtHeader, FdtError> {
    FdtHeader::parse(blob)
}

impl Fdt {
    /// Decode a blob
    pub fn parse(blob: &[u8]) -> Result<Self, FdtError> {
        let header = FdtHeader::parse(blob)?;

        let mut reservations = Vec::new();
        let mut pos = header.off_mem_rsvmap as usize;
        loop {
            if pos + RSVMAP_ENTRY_SIZE > header.totalsize as usize {
                return Err(FdtError::BadLayout);
            }
            let address = (be_u32(blob, pos) as u64) << 32 | be_u32(blob, pos + 4) as u64;
            let size = (be_u32(blob, pos + 8) as u64) << 32 | be_u32(blob, pos + 12) as u64;
            pos += RSVMAP_ENTRY_SIZE;
            if address == 0 && size == 0 {
                break;
            }
            reservations.push((address, size));
        }

        let structs_start = header.off_dt_struct as usize;
        let strings_start = header.off_dt_strings as usize;
        let structs = &blob[structs_start..structs_start + header.size_dt_struct as usize];
        let strings = &blob[strings_start..strings_start + header.size_dt_strings as usize];

        Ok(Self {
            reservations,
            boot_cpuid_phys: header.boot_cpuid_phys,
            root: tree::parse_structs(structs, strings)?,
        })
    }

    /// Node at `path`
    pub fn node(&self, path: &str) -> Option<&Node> {
        self.root.find(path)
    }

    /// Set a raw property on the existing node at `path`
    pub fn set_property(&mut self, path: &str, name: &str, value: Vec<u8>) -> Result<(), FdtError> {
        let node = self.root.find_mut(path).ok_or(FdtError::NotFound)?;
        node.set_property(name, value);
        Ok(())
    }

    /// Set a single big-endian cell
    pub fn set_u32(&mut self, path: &str, name: &str, value: u32) -> Result<(), FdtError> {
        self.set_cells(path, name, &[value])
    }

    /// Set a list of big-endian cells
    pub fn set_cells(&mut self, path: &str, name: &str, cells: &[u32]) -> Result<(), FdtError> {
        let value = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        self.set_property(path, name, value)
    }

    /// Set a NUL terminated string
    pub fn set_string(&mut self, path: &str, name: &str, value: &str) -> Result<(), FdtError> {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.set_property(path, name, bytes)
    }

    /// Serialize with no slack between blocks
    pub fn pack(&self) -> Vec<u8> {
        let mut emitter = Emitter::default();
        emitter.node(&self.root);
        emitter.finish();

        let rsvmap_len = (self.reservations.len() + 1) * RSVMAP_ENTRY_SIZE;
        let off_mem_rsvmap = FDT_HEADER_SIZE;
        let off_dt_struct = off_mem_rsvmap + rsvmap_len;
        let off_dt_strings = off_dt_struct + emitter.structs.len();
        let totalsize = off_dt_strings + emitter.strings.len();

        let header = FdtHeader {
            totalsize: totalsize as u32,
            off_dt_struct: off_dt_struct as u32,
            off_dt_strings: off_dt_strings as u32,
            off_mem_rsvmap: off_mem_rsvmap as u32,
            version: FDT_VERSION,
            last_comp_version: FDT_LAST_COMP_VERSION,
            boot_cpuid_phys: self.boot_cpuid_phys,
            size_dt_strings: emitter.strings.len() as u32,
            size_dt_struct: emitter.structs.len() as u32,
        };

        let mut out = alloc::vec![0u8; totalsize];
        header.write(&mut out[..FDT_HEADER_SIZE]);
        let mut pos = off_mem_rsvmap;
        for (address, size) in &self.reservations {
            out[pos..pos + 8].copy_from_slice(&address.to_be_bytes());
            out[pos + 8..pos + 16].copy_from_slice(&size.to_be_bytes());
            pos += RSVMAP_ENTRY_SIZE;
        }
        out[off_dt_struct..off_dt_strings].copy_from_slice(&emitter.structs);
        out[off_dt_strings..].copy_from_slice(&emitter.strings);
        out
    }

    /// Pack into `dst`, returning the packed length
    pub fn pack_into(&self, dst: &mut [u8]) -> Result<usize, FdtError> {
        let packed = self.pack();
        if packed.len() > dst.len() {
            return Err(FdtError::NoSpace);
        }
        dst[..packed.len()].copy_from_slice(&packed);
        Ok(packed.len())
    }
}
