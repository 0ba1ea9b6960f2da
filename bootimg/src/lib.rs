//! Android Boot Image Formats
//!
//! A `no_std` implementation of the on-storage formats an Android boot loader
//! has to understand before it can start a kernel.
//!
//! # Overview
//!
//! - Legacy (version 0) boot image header with the Qualcomm `dt_size` word
//! - Page-size arithmetic and the payload layout derived from a header
//! - The `QCDT` device-tree table appended to multi-board boot images
//! - The Android sparse image format used by `fastboot flash`
//! - A small flattened device tree editor (check, set property, pack)
//!
//! # Layout of a boot image
//!
//! ```text
//! +-----------------+
//! | boot header     | 1 page
//! +-----------------+
//! | kernel          | n pages
//! +-----------------+
//! | ramdisk         | m pages
//! +-----------------+
//! | second stage    | o pages
//! +-----------------+
//! | QCDT table+dtbs | p pages
//! +-----------------+
//! | signature       | 1 page (signed images only)
//! +-----------------+
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bootimg::{BootImageHeader, ImageLayout, PageSize};
//!
//! let header = BootImageHeader::parse(&page)?;
//! let page = PageSize::new(header.page_size).unwrap_or(PageSize::DEFAULT);
//! let layout = ImageLayout::new(&header, page);
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

pub mod dt_table;
pub mod error;
pub mod fdt;
pub mod header;
pub mod page;
pub mod sparse;

pub use dt_table::{DtEntry, DtTable};
pub use error::{BootImageError, Result};
pub use header::BootImageHeader;
pub use page::{ImageLayout, PageSize};
pub use sparse::{ChunkKind, SparseChunk, SparseHeader, SparseImage};
