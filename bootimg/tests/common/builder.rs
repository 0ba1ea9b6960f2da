//! Builders for boot, sparse and device tree images

use bootimg::header::BootImageHeader;

/// Assembles a legacy boot image in memory
pub struct BootImageBuilder {
    pub header: BootImageHeader,
    pub kernel: Vec<u8>,
    pub ramdisk: Vec<u8>,
    pub dt: Vec<u8>,
}

impl BootImageBuilder {
    pub fn new(page_size: u32) -> Self {
        let mut header = BootImageHeader::empty();
        header.page_size = page_size;
        header.kernel_addr = 0x8000;
        header.ramdisk_addr = 0x0100_0000;
        header.tags_addr = 0x100;
        Self {
            header,
            kernel: Vec::new(),
            ramdisk: Vec::new(),
            dt: Vec::new(),
        }
    }

    pub fn kernel(mut self, data: Vec<u8>) -> Self {
        self.header.kernel_size = data.len() as u32;
        self.kernel = data;
        self
    }

    pub fn ramdisk(mut self, data: Vec<u8>) -> Self {
        self.header.ramdisk_size = data.len() as u32;
        self.ramdisk = data;
        self
    }

    pub fn dt(mut self, data: Vec<u8>) -> Self {
        self.header.dt_size = data.len() as u32;
        self.dt = data;
        self
    }

    pub fn cmdline(mut self, cmdline: &str) -> Self {
        self.header.set_cmdline(cmdline);
        self
    }

    fn push_padded(out: &mut Vec<u8>, data: &[u8], page: usize) {
        out.extend_from_slice(data);
        let rem = out.len() % page;
        if rem != 0 {
            out.resize(out.len() + page - rem, 0);
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let page = self.header.page_size as usize;
        let mut out = Vec::new();
        Self::push_padded(&mut out, &self.header.to_bytes(), page);
        Self::push_padded(&mut out, &self.kernel, page);
        Self::push_padded(&mut out, &self.ramdisk, page);
        Self::push_padded(&mut out, &self.dt, page);
        out
    }
}

/// Assembles a sparse image chunk by chunk
pub struct SparseBuilder {
    blk_sz: u32,
    total_blks: u32,
    chunks: Vec<u8>,
    count: u32,
}

impl SparseBuilder {
    pub fn new(blk_sz: u32) -> Self {
        Self {
            blk_sz,
            total_blks: 0,
            chunks: Vec::new(),
            count: 0,
        }
    }

    fn chunk(&mut self, kind: u16, blocks: u32, payload: &[u8]) {
        self.chunks.extend_from_slice(&kind.to_le_bytes());
        self.chunks.extend_from_slice(&0u16.to_le_bytes());
        self.chunks.extend_from_slice(&blocks.to_le_bytes());
        self.chunks
            .extend_from_slice(&(12 + payload.len() as u32).to_le_bytes());
        self.chunks.extend_from_slice(payload);
        self.count += 1;
    }

    pub fn raw(mut self, data: &[u8]) -> Self {
        let blocks = data.len() as u32 / self.blk_sz;
        self.chunk(0xCAC1, blocks, data);
        self.total_blks += blocks;
        self
    }

    pub fn fill(mut self, blocks: u32, pattern: u32) -> Self {
        self.chunk(0xCAC2, blocks, &pattern.to_le_bytes());
        self.total_blks += blocks;
        self
    }

    pub fn dont_care(mut self, blocks: u32) -> Self {
        self.chunk(0xCAC3, blocks, &[]);
        self.total_blks += blocks;
        self
    }

    pub fn crc(mut self, value: u32) -> Self {
        self.chunk(0xCAC4, 0, &value.to_le_bytes());
        self
    }

    /// Append arbitrary bytes as a chunk without adjusting totals
    pub fn bogus(mut self, kind: u16, blocks: u32, total_sz: u32) -> Self {
        self.chunks.extend_from_slice(&kind.to_le_bytes());
        self.chunks.extend_from_slice(&0u16.to_le_bytes());
        self.chunks.extend_from_slice(&blocks.to_le_bytes());
        self.chunks.extend_from_slice(&total_sz.to_le_bytes());
        self.count += 1;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with(self.total_blks, 28)
    }

    /// Build with an overridden block total and file header size
    pub fn build_with(&self, total_blks: u32, file_hdr_sz: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xed26_ff3au32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&file_hdr_sz.to_le_bytes());
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&self.blk_sz.to_le_bytes());
        out.extend_from_slice(&total_blks.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        if file_hdr_sz as usize > out.len() {
            out.resize(file_hdr_sz as usize, 0xEE);
        }
        out.extend_from_slice(&self.chunks);
        out
    }
}

/// Hand-assembles a small flattened device tree:
///
/// ```text
/// / { model = "test"; memory@0 { device_type = "memory"; }; chosen { }; };
/// ```
pub struct FdtBuilder;

impl FdtBuilder {
    fn word(out: &mut Vec<u8>, w: u32) {
        out.extend_from_slice(&w.to_be_bytes());
    }

    fn name(out: &mut Vec<u8>, name: &str) {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    fn prop(out: &mut Vec<u8>, nameoff: u32, value: &[u8]) {
        Self::word(out, 3);
        Self::word(out, value.len() as u32);
        Self::word(out, nameoff);
        out.extend_from_slice(value);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    /// Blob with `slack` spare bytes appended after the strings block
    pub fn build(slack: usize) -> Vec<u8> {
        let strings = b"model\0device_type\0";
        let mut structs = Vec::new();
        Self::word(&mut structs, 1);
        Self::name(&mut structs, "");
        Self::prop(&mut structs, 0, b"test\0");
        Self::word(&mut structs, 1);
        Self::name(&mut structs, "memory@0");
        Self::prop(&mut structs, 6, b"memory\0");
        Self::word(&mut structs, 2);
        Self::word(&mut structs, 1);
        Self::name(&mut structs, "chosen");
        Self::word(&mut structs, 4);
        Self::word(&mut structs, 2);
        Self::word(&mut structs, 2);
        Self::word(&mut structs, 9);

        let off_rsvmap = 40u32;
        let off_struct = off_rsvmap + 16;
        let off_strings = off_struct + structs.len() as u32;
        let total = off_strings as usize + strings.len() + slack;

        let mut out = Vec::with_capacity(total);
        for w in [
            0xd00d_feedu32,
            total as u32,
            off_struct,
            off_strings,
            off_rsvmap,
            17,
            16,
            0,
            strings.len() as u32,
            structs.len() as u32,
        ] {
            Self::word(&mut out, w);
        }
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&structs);
        out.extend_from_slice(strings);
        out.resize(total, 0);
        out
    }
}
