// Partition registry shared by both storage backends

use core::fmt;

/// Longest partition name kept in the registry
pub const MAX_NAME_LEN: usize = 36;

/// Registry capacity
pub const MAX_PARTITIONS: usize = 64;

/// A named span of storage
///
/// `start` and `length` are counted in `unit`-byte units: LBAs on block
/// media, erase blocks on raw flash.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct PartitionRegion {
    name: [u8; MAX_NAME_LEN],
    name_len: u8,
    pub start: u64,
    pub length: u64,
    pub unit: u32,
    pub flags: u32,
}

impl PartitionRegion {
    /// Names longer than [`MAX_NAME_LEN`] bytes are truncated
    pub fn new(name: &str, start: u64, length: u64, unit: u32, flags: u32) -> Self {
        let mut buf = [0u8; MAX_NAME_LEN];
        let mut len = name.len().min(MAX_NAME_LEN);
        // never split a UTF-8 sequence
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self {
            name: buf,
            name_len: len as u8,
            start,
            length,
            unit,
            flags,
        }
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }

    /// Raw name field, NUL padded
    pub fn name_bytes(&self) -> &[u8; MAX_NAME_LEN] {
        &self.name
    }

    /// Absolute byte offset of the first byte
    pub fn byte_offset(&self) -> u64 {
        self.start * self.unit as u64
    }

    pub fn byte_len(&self) -> u64 {
        self.length * self.unit as u64
    }

    /// True when `len` bytes at `offset` stay inside the partition
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset
            .checked_add(len)
            .map_or(false, |end| end <= self.byte_len())
    }
}

impl fmt::Debug for PartitionRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionRegion")
            .field("name", &self.name())
            .field("start", &self.start)
            .field("length", &self.length)
            .field("unit", &self.unit)
            .field("flags", &format_args!("{:#x}", self.flags))
            .finish()
    }
}

/// Fixed-capacity partition registry
///
/// Populated once by a scan (GPT) or from a board table (raw flash), then only
/// read.
#[derive(Clone)]
pub struct PartitionTable {
    partitions: [Option<PartitionRegion>; MAX_PARTITIONS],
    count: usize,
}

impl PartitionTable {
    pub const fn new() -> Self {
        Self {
            partitions: [None; MAX_PARTITIONS],
            count: 0,
        }
    }

    pub fn clear(&mut self) {
        self.partitions = [None; MAX_PARTITIONS];
        self.count = 0;
    }

    pub fn add_partition(&mut self, region: PartitionRegion) -> Result<(), PartitionRegion> {
        if self.count >= MAX_PARTITIONS {
            return Err(region);
        }

        self.partitions[self.count] = Some(region);
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> Option<&PartitionRegion> {
        if index < self.count {
            self.partitions[index].as_ref()
        } else {
            None
        }
    }

    /// First partition called `name`
    pub fn find(&self, name: &str) -> Option<&PartitionRegion> {
        self.iter().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionRegion> {
        self.partitions[..self.count]
            .iter()
            .filter_map(|p| p.as_ref())
    }
}

impl fmt::Debug for PartitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names_truncate() {
        let name = "a_really_long_partition_name_that_overflows";
        let region = PartitionRegion::new(name, 0, 1, 512, 0);
        assert_eq!(region.name(), &name[..MAX_NAME_LEN]);
    }

    #[test]
    fn contains_checks_end() {
        let region = PartitionRegion::new("boot", 10, 4, 512, 0);
        assert_eq!(region.byte_offset(), 5120);
        assert!(region.contains(0, 2048));
        assert!(region.contains(2047, 1));
        assert!(!region.contains(2047, 2));
        assert!(!region.contains(u64::MAX, 1));
    }
}
