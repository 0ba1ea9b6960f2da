//! Page-size arithmetic and payload layout

use crate::header::BootImageHeader;

/// Storage page size used for boot image packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u32);

impl PageSize {
    /// 2 KiB, the page size boot images are packed with by default
    pub const DEFAULT: Self = Self(2048);

    /// Accepts any non-zero power of two
    pub const fn new(size: u32) -> Option<Self> {
        if size != 0 && size.is_power_of_two() {
            Some(Self(size))
        } else {
            None
        }
    }

    /// Page size in bytes
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Page size in bytes as `usize`
    pub const fn bytes(self) -> usize {
        self.0 as usize
    }

    /// `size - 1`
    pub const fn mask(self) -> u32 {
        self.0 - 1
    }

    /// Round `n` up to a whole number of pages
    ///
    /// Saturates at the last page boundary representable in `u32`.
    pub const fn round_up(self, n: u32) -> u32 {
        let mask = self.mask();
        match n.checked_add(mask) {
            Some(v) => v & !mask,
            None => u32::MAX & !mask,
        }
    }

    /// `round_up` widened to `u64` so sums never overflow
    pub const fn round_up_u64(self, n: u64) -> u64 {
        let mask = self.mask() as u64;
        (n + mask) & !mask
    }

    /// True when `n` is a whole number of pages
    pub const fn is_aligned(self, n: u64) -> bool {
        n & (self.mask() as u64) == 0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Byte offsets of each payload inside a boot image
///
/// All offsets are relative to the start of the image (the header page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Page size the layout was computed with
    pub page: PageSize,
    /// Kernel payload offset
    pub kernel_offset: u64,
    /// Kernel size rounded to pages
    pub kernel_actual: u64,
    /// Ramdisk payload offset
    pub ramdisk_offset: u64,
    /// Ramdisk size rounded to pages
    pub ramdisk_actual: u64,
    /// Second stage payload offset
    pub second_offset: u64,
    /// Second stage size rounded to pages
    pub second_actual: u64,
    /// QCDT table offset
    pub dt_offset: u64,
    /// Device tree payload rounded to pages
    pub dt_actual: u64,
    /// Header page plus every rounded payload; the signature page starts here
    pub image_size: u64,
}

impl ImageLayout {
    /// Compute the layout for `header` packed with `page`
    pub fn new(header: &BootImageHeader, page: PageSize) -> Self {
        let page_bytes = page.get() as u64;
        let kernel_actual = page.round_up_u64(header.kernel_size as u64);
        let ramdisk_actual = page.round_up_u64(header.ramdisk_size as u64);
        let second_actual = page.round_up_u64(header.second_size as u64);
        let dt_actual = page.round_up_u64(header.dt_size as u64);

        let kernel_offset = page_bytes;
        let ramdisk_offset = kernel_offset + kernel_actual;
        let second_offset = ramdisk_offset + ramdisk_actual;
        let dt_offset = second_offset + second_actual;
        let image_size = dt_offset + dt_actual;

        Self {
            page,
            kernel_offset,
            kernel_actual,
            ramdisk_offset,
            ramdisk_actual,
            second_offset,
            second_actual,
            dt_offset,
            dt_actual,
            image_size,
        }
    }

    /// Offset of the signature page that trails signed images
    pub fn signature_offset(&self) -> u64 {
        self.image_size
    }

    /// True when the image (without signature) fits in `capacity` bytes
    pub fn fits(&self, capacity: u64) -> bool {
        self.image_size <= capacity
    }
}
