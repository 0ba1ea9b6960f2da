// Physical memory the loader stages payloads into
//
// Load addresses come straight out of boot image headers, so every access is
// range checked against the RAM window before it is turned into a slice.

use core::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// `[addr, addr + len)` is not inside the window
    OutOfRange { addr: u32, len: usize },
}

/// Byte access to physical addresses
pub trait PhysicalMemory {
    fn slice(&self, addr: u32, len: usize) -> Result<&[u8], MemoryError>;

    fn slice_mut(&mut self, addr: u32, len: usize) -> Result<&mut [u8], MemoryError>;

    /// Copy `len` bytes from `src` to `dst`; the ranges may overlap
    ///
    /// A zero-length copy is a no-op whatever the addresses.
    fn copy_within(&mut self, src: u32, dst: u32, len: usize) -> Result<(), MemoryError>;
}

/// A contiguous run of RAM starting at physical address `base`
pub struct RamWindow<'a> {
    base: u32,
    ram: &'a mut [u8],
}

impl<'a> RamWindow<'a> {
    pub fn new(base: u32, ram: &'a mut [u8]) -> Self {
        Self { base, ram }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.ram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ram.is_empty()
    }

    fn range(&self, addr: u32, len: usize) -> Result<Range<usize>, MemoryError> {
        let err = MemoryError::OutOfRange { addr, len };
        let start = addr.checked_sub(self.base).ok_or(err)? as usize;
        let end = start.checked_add(len).ok_or(err)?;
        if end > self.ram.len() {
            return Err(err);
        }
        Ok(start..end)
    }
}

impl RamWindow<'static> {
    /// Window over the identity-mapped RAM at `[base, base + len)`
    ///
    /// # Safety
    /// The range must be RAM that nothing else references for as long as the
    /// window lives (loader code, stack and heap excluded).
    pub unsafe fn from_raw(base: u32, len: usize) -> Self {
        Self {
            base,
            ram: core::slice::from_raw_parts_mut(base as usize as *mut u8, len),
        }
    }
}

impl PhysicalMemory for RamWindow<'_> {
    fn slice(&self, addr: u32, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.range(addr, len)?;
        Ok(&self.ram[range])
    }

    fn slice_mut(&mut self, addr: u32, len: usize) -> Result<&mut [u8], MemoryError> {
        let range = self.range(addr, len)?;
        Ok(&mut self.ram[range])
    }

    fn copy_within(&mut self, src: u32, dst: u32, len: usize) -> Result<(), MemoryError> {
        if len == 0 {
            return Ok(());
        }
        let from = self.range(src, len)?;
        let to = self.range(dst, len)?;
        self.ram.copy_within(from, to.start);
        Ok(())
    }
}
