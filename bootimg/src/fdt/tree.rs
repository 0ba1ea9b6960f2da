//! In-memory node tree and the structure block codec

use alloc::string::String;
use alloc::vec::Vec;

use super::header::be_u32;
use super::FdtError;

pub(crate) const FDT_BEGIN_NODE: u32 = 0x1;
pub(crate) const FDT_END_NODE: u32 = 0x2;
pub(crate) const FDT_PROP: u32 = 0x3;
pub(crate) const FDT_NOP: u32 = 0x4;
pub(crate) const FDT_END: u32 = 0x9;

// Bounds the recursion on hostile blobs.
const MAX_DEPTH: usize = 32;

/// A property value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name
    pub name: String,
    /// Raw value bytes
    pub value: Vec<u8>,
}

/// A device tree node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    /// Node name including any `@unit` suffix, empty for the root
    pub name: String,
    /// Properties in blob order
    pub properties: Vec<Property>,
    /// Child nodes in blob order
    pub children: Vec<Node>,
}

impl Node {
    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Replace or append a property
    pub fn set_property(&mut self, name: &str, value: Vec<u8>) {
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(prop) => prop.value = value,
            None => self.properties.push(Property {
                name: String::from(name),
                value,
            }),
        }
    }

    fn matches(&self, component: &str) -> bool {
        if self.name == component {
            return true;
        }
        // "/memory" matches "memory@0" unless a unit address was given
        !component.contains('@')
            && self
                .name
                .split('@')
                .next()
                .map_or(false, |base| base == component)
    }

    /// Walk an absolute path such as `/chosen`
    pub fn find(&self, path: &str) -> Option<&Node> {
        let mut node = self;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            node = node.children.iter().find(|c| c.matches(component))?;
        }
        Some(node)
    }

    /// Mutable variant of [`Node::find`]
    pub fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = self;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            node = node.children.iter_mut().find(|c| c.matches(component))?;
        }
        Some(node)
    }
}

struct Cursor<'a> {
    structs: &'a [u8],
    strings: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn token(&mut self) -> Result<u32, FdtError> {
        if self.pos + 4 > self.structs.len() {
            return Err(FdtError::Truncated);
        }
        let tok = be_u32(self.structs, self.pos);
        self.pos += 4;
        Ok(tok)
    }

    fn align(&mut self) {
        self.pos = (self.pos + 3) & !3;
    }

    fn name(&mut self) -> Result<String, FdtError> {
        let rest = self.structs.get(self.pos..).ok_or(FdtError::Truncated)?;
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(FdtError::Truncated)?;
        let name = core::str::from_utf8(&rest[..len]).map_err(|_| FdtError::BadStructure)?;
        self.pos += len + 1;
        self.align();
        Ok(String::from(name))
    }

    fn string_at(&self, offset: usize) -> Result<String, FdtError> {
        let rest = self.strings.get(offset..).ok_or(FdtError::BadStructure)?;
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(FdtError::BadStructure)?;
        core::str::from_utf8(&rest[..len])
            .map(String::from)
            .map_err(|_| FdtError::BadStructure)
    }

    fn property(&mut self) -> Result<Property, FdtError> {
        let len = self.token()? as usize;
        let nameoff = self.token()? as usize;
        let end = self.pos.checked_add(len).ok_or(FdtError::Truncated)?;
        if end > self.structs.len() {
            return Err(FdtError::Truncated);
        }
        let value = self.structs[self.pos..end].to_vec();
        self.pos = end;
        self.align();
        Ok(Property {
            name: self.string_at(nameoff)?,
            value,
        })
    }

    /// Called right after a BEGIN_NODE token
    fn node(&mut self, depth: usize) -> Result<Node, FdtError> {
        if depth > MAX_DEPTH {
            return Err(FdtError::BadStructure);
        }
        let mut node = Node {
            name: self.name()?,
            ..Node::default()
        };
        loop {
            match self.token()? {
                FDT_PROP => {
                    if !node.children.is_empty() {
                        return Err(FdtError::BadStructure);
                    }
                    node.properties.push(self.property()?);
                }
                FDT_BEGIN_NODE => node.children.push(self.node(depth + 1)?),
                FDT_NOP => {}
                FDT_END_NODE => return Ok(node),
                _ => return Err(FdtError::BadStructure),
            }
        }
    }
}

pub(crate) fn parse_structs(structs: &[u8], strings: &[u8]) -> Result<Node, FdtError> {
    let mut cursor = Cursor {
        structs,
        strings,
        pos: 0,
    };
    let root = loop {
        match cursor.token()? {
            FDT_NOP => {}
            FDT_BEGIN_NODE => break cursor.node(0)?,
            _ => return Err(FdtError::BadStructure),
        }
    };
    loop {
        match cursor.token()? {
            FDT_NOP => {}
            FDT_END => return Ok(root),
            _ => return Err(FdtError::BadStructure),
        }
    }
}

/// Accumulates the structure and strings blocks while packing
#[derive(Default)]
pub(crate) struct Emitter {
    pub structs: Vec<u8>,
    pub strings: Vec<u8>,
}

impl Emitter {
    fn word(&mut self, w: u32) {
        self.structs.extend_from_slice(&w.to_be_bytes());
    }

    fn pad(&mut self) {
        while self.structs.len() % 4 != 0 {
            self.structs.push(0);
        }
    }

    fn string_offset(&mut self, name: &str) -> u32 {
        let needle = name.as_bytes();
        let mut start = 0;
        while start < self.strings.len() {
            let len = self.strings[start..]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(self.strings.len() - start);
            if &self.strings[start..start + len] == needle {
                return start as u32;
            }
            start += len + 1;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(needle);
        self.strings.push(0);
        offset
    }

    pub fn node(&mut self, node: &Node) {
        self.word(FDT_BEGIN_NODE);
        self.structs.extend_from_slice(node.name.as_bytes());
        self.structs.push(0);
        self.pad();
        for prop in &node.properties {
            let nameoff = self.string_offset(&prop.name);
            self.word(FDT_PROP);
            self.word(prop.value.len() as u32);
            self.word(nameoff);
            self.structs.extend_from_slice(&prop.value);
            self.pad();
        }
        for child in &node.children {
            self.node(child);
        }
        self.word(FDT_END_NODE);
    }

    pub fn finish(&mut self) {
        self.word(FDT_END);
    }
}
