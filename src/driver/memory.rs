//! RAM-backed `CardDriver` used by host tooling and tests.
//!
//! Directories are kept as raw 8.3 slot tables so deleted markers, hidden
//! attributes, early free markers and long-name side-channels behave the
//! way they do on a real card.

use alloc::{string::String, vec::Vec};

use crate::config::{LongName, SpiSpeed};

use super::{
    CardDriver, InitStage, OpenMode, RawDirEntry, DIR_ATT_ARCHIVE, DIR_ATT_DIRECTORY,
    DIR_ATT_HIDDEN, DIR_ENTRY_NAME_LEN, DIR_NAME_DELETED,
};

const ROOT_NODE: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryCardError {
    NoCard,
    VolumeInvalid,
    RootUnavailable,
    NotFound,
    NotDirectory,
    IsDirectory,
    InvalidShortName,
    WriteFault,
    StaleHandle,
}

#[derive(Clone, Debug)]
struct Slot {
    raw: RawDirEntry,
    long_name: Option<String>,
    node: Option<usize>,
}

#[derive(Clone, Debug)]
enum Node {
    Dir { slots: Vec<Slot> },
    File { data: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryDir {
    node: usize,
    cursor: usize,
}

#[derive(Debug)]
pub struct MemoryFile {
    node: usize,
    position: u32,
    mode: OpenMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CardTrace {
    OpenDir(String),
    OpenFile(String),
    Remove(String),
}

#[derive(Clone, Debug)]
pub struct MemoryCard {
    nodes: Vec<Node>,
    fail_stage: Option<InitStage>,
    dead_chip_select: Option<u8>,
    fail_writes: bool,
    dir_reads: usize,
    open_files: usize,
    trace: Vec<CardTrace>,
}

impl Default for MemoryCard {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCard {
    pub fn new() -> Self {
        Self {
            nodes: alloc::vec![Node::Dir { slots: Vec::new() }],
            fail_stage: None,
            dead_chip_select: None,
            fail_writes: false,
            dir_reads: 0,
            open_files: 0,
            trace: Vec::new(),
        }
    }

    /// Creates every missing directory along `path`.
    pub fn add_dir(&mut self, path: &str) -> Result<(), MemoryCardError> {
        let mut node = ROOT_NODE;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = match self.find_slot(node, segment) {
                Some(idx) => self.slot_node(node, idx)?,
                None => self.insert_entry(node, segment, None, DIR_ATT_DIRECTORY, Node::Dir {
                    slots: Vec::new(),
                })?,
            };
        }
        Ok(())
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) -> Result<(), MemoryCardError> {
        self.add_entry(path, None, DIR_ATT_ARCHIVE, data)
    }

    pub fn add_file_with_long_name(
        &mut self,
        path: &str,
        long_name: &str,
        data: &[u8],
    ) -> Result<(), MemoryCardError> {
        self.add_entry(path, Some(long_name), DIR_ATT_ARCHIVE, data)
    }

    pub fn add_dir_with_long_name(
        &mut self,
        path: &str,
        long_name: &str,
    ) -> Result<(), MemoryCardError> {
        let (parent, name) = split_parent(path);
        self.add_dir(parent)?;
        let parent_node = self.lookup_dir(parent)?;
        self.insert_entry(
            parent_node,
            name,
            Some(long_name),
            DIR_ATT_DIRECTORY,
            Node::Dir { slots: Vec::new() },
        )?;
        Ok(())
    }

    pub fn add_hidden_file(&mut self, path: &str, data: &[u8]) -> Result<(), MemoryCardError> {
        self.add_entry(path, None, DIR_ATT_ARCHIVE | DIR_ATT_HIDDEN, data)
    }

    /// Appends a record whose first byte carries the deleted marker.
    pub fn add_deleted(&mut self, path: &str) -> Result<(), MemoryCardError> {
        self.add_file(path, &[])?;
        let (parent, name) = split_parent(path);
        let parent_node = self.lookup_dir(parent)?;
        let idx = self
            .find_slot(parent_node, name)
            .ok_or(MemoryCardError::NotFound)?;
        self.slots_mut(parent_node)?[idx].raw.name[0] = DIR_NAME_DELETED;
        Ok(())
    }

    /// Appends a zeroed record; entries after it are unreachable by a scan.
    pub fn add_free_marker(&mut self, dir_path: &str) -> Result<(), MemoryCardError> {
        let node = self.lookup_dir(dir_path)?;
        self.slots_mut(node)?.push(Slot {
            raw: RawDirEntry::new([0; DIR_ENTRY_NAME_LEN], 0),
            long_name: None,
            node: None,
        });
        Ok(())
    }

    pub fn add_raw(
        &mut self,
        dir_path: &str,
        raw: RawDirEntry,
        long_name: Option<&str>,
    ) -> Result<(), MemoryCardError> {
        let node = self.lookup_dir(dir_path)?;
        self.slots_mut(node)?.push(Slot {
            raw,
            long_name: long_name.map(String::from),
            node: None,
        });
        Ok(())
    }

    pub fn fail_init_at(&mut self, stage: Option<InitStage>) {
        self.fail_stage = stage;
    }

    /// Card stays silent when selected through `chip_select`.
    pub fn fail_chip_select(&mut self, chip_select: Option<u8>) {
        self.dead_chip_select = chip_select;
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn file_data(&self, path: &str) -> Option<&[u8]> {
        let (parent, name) = split_parent(path);
        let parent_node = self.lookup_dir(parent).ok()?;
        let idx = self.find_slot(parent_node, name)?;
        let node = self.slot_node(parent_node, idx).ok()?;
        match &self.nodes[node] {
            Node::File { data } => Some(data.as_slice()),
            Node::Dir { .. } => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        let (parent, name) = split_parent(path);
        self.lookup_dir(parent)
            .ok()
            .and_then(|node| self.find_slot(node, name))
            .is_some()
    }

    /// Raw records handed out by `read_dir` since creation.
    pub fn dir_reads(&self) -> usize {
        self.dir_reads
    }

    pub fn open_file_count(&self) -> usize {
        self.open_files
    }

    pub fn take_trace(&mut self) -> Vec<CardTrace> {
        core::mem::take(&mut self.trace)
    }

    fn add_entry(
        &mut self,
        path: &str,
        long_name: Option<&str>,
        attributes: u8,
        data: &[u8],
    ) -> Result<(), MemoryCardError> {
        let (parent, name) = split_parent(path);
        self.add_dir(parent)?;
        let parent_node = self.lookup_dir(parent)?;
        self.insert_entry(
            parent_node,
            name,
            long_name,
            attributes,
            Node::File {
                data: data.to_vec(),
            },
        )?;
        Ok(())
    }

    fn insert_entry(
        &mut self,
        parent: usize,
        name: &str,
        long_name: Option<&str>,
        attributes: u8,
        node: Node,
    ) -> Result<usize, MemoryCardError> {
        let short = encode_short_name(name)?;
        let id = self.nodes.len();
        self.nodes.push(node);
        let slot = Slot {
            raw: RawDirEntry::new(short, attributes),
            long_name: long_name.map(String::from),
            node: Some(id),
        };
        let slots = self.slots_mut(parent)?;
        // New records reuse the first free slot, ahead of any early free marker.
        match slots.iter().position(|s| s.raw.is_free()) {
            Some(free) => slots.insert(free, slot),
            None => slots.push(slot),
        }
        Ok(id)
    }

    fn lookup_dir(&self, path: &str) -> Result<usize, MemoryCardError> {
        let mut node = ROOT_NODE;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let idx = self
                .find_slot(node, segment)
                .ok_or(MemoryCardError::NotFound)?;
            node = self.slot_node(node, idx)?;
            if !matches!(self.nodes[node], Node::Dir { .. }) {
                return Err(MemoryCardError::NotDirectory);
            }
        }
        Ok(node)
    }

    fn slots(&self, node: usize) -> Result<&[Slot], MemoryCardError> {
        match self.nodes.get(node) {
            Some(Node::Dir { slots }) => Ok(slots.as_slice()),
            Some(Node::File { .. }) => Err(MemoryCardError::NotDirectory),
            None => Err(MemoryCardError::StaleHandle),
        }
    }

    fn slots_mut(&mut self, node: usize) -> Result<&mut Vec<Slot>, MemoryCardError> {
        match self.nodes.get_mut(node) {
            Some(Node::Dir { slots }) => Ok(slots),
            Some(Node::File { .. }) => Err(MemoryCardError::NotDirectory),
            None => Err(MemoryCardError::StaleHandle),
        }
    }

    fn slot_node(&self, dir: usize, idx: usize) -> Result<usize, MemoryCardError> {
        self.slots(dir)?
            .get(idx)
            .and_then(|slot| slot.node)
            .ok_or(MemoryCardError::NotFound)
    }

    /// Live slot whose 8.3 name matches `name`, ignoring ASCII case.
    fn find_slot(&self, dir: usize, name: &str) -> Option<usize> {
        let target = encode_short_name(name).ok()?;
        let slots = self.slots(dir).ok()?;
        for (idx, slot) in slots.iter().enumerate() {
            if slot.raw.is_free() {
                return None;
            }
            if slot.raw.is_deleted() {
                continue;
            }
            if slot.raw.name.eq_ignore_ascii_case(&target) {
                return Some(idx);
            }
        }
        None
    }

    fn file_node_mut(&mut self, file: &MemoryFile) -> Result<&mut Vec<u8>, MemoryCardError> {
        match self.nodes.get_mut(file.node) {
            Some(Node::File { data }) => Ok(data),
            _ => Err(MemoryCardError::StaleHandle),
        }
    }

    fn file_len(&self, file: &MemoryFile) -> u32 {
        match self.nodes.get(file.node) {
            Some(Node::File { data }) => data.len() as u32,
            _ => 0,
        }
    }
}

impl CardDriver for MemoryCard {
    type Dir = MemoryDir;
    type File = MemoryFile;
    type Error = MemoryCardError;

    fn init_card(&mut self, _speed: SpiSpeed, chip_select: u8) -> Result<(), Self::Error> {
        if self.fail_stage == Some(InitStage::Card) || self.dead_chip_select == Some(chip_select) {
            return Err(MemoryCardError::NoCard);
        }
        Ok(())
    }

    fn init_volume(&mut self) -> Result<(), Self::Error> {
        if self.fail_stage == Some(InitStage::Volume) {
            return Err(MemoryCardError::VolumeInvalid);
        }
        Ok(())
    }

    fn open_root(&mut self) -> Result<Self::Dir, Self::Error> {
        if self.fail_stage == Some(InitStage::Root) {
            return Err(MemoryCardError::RootUnavailable);
        }
        Ok(MemoryDir {
            node: ROOT_NODE,
            cursor: 0,
        })
    }

    fn open_dir(&mut self, parent: &Self::Dir, name: &str) -> Result<Self::Dir, Self::Error> {
        self.trace.push(CardTrace::OpenDir(String::from(name)));
        let idx = self
            .find_slot(parent.node, name)
            .ok_or(MemoryCardError::NotFound)?;
        let node = self.slot_node(parent.node, idx)?;
        match self.nodes[node] {
            Node::Dir { .. } => Ok(MemoryDir { node, cursor: 0 }),
            Node::File { .. } => Err(MemoryCardError::NotDirectory),
        }
    }

    fn rewind(&mut self, dir: &mut Self::Dir) {
        dir.cursor = 0;
    }

    fn read_dir(
        &mut self,
        dir: &mut Self::Dir,
        long_name: &mut LongName,
    ) -> Result<Option<RawDirEntry>, Self::Error> {
        long_name.clear();
        let slots = self.slots(dir.node)?;
        let record = match slots.get(dir.cursor) {
            Some(slot) => {
                if let Some(long) = &slot.long_name {
                    for ch in long.chars() {
                        if long_name.push(ch).is_err() {
                            break;
                        }
                    }
                }
                Some(slot.raw)
            }
            // The zero-filled tail of the last cluster reads as one free marker.
            None if dir.cursor == slots.len() => {
                Some(RawDirEntry::new([0; DIR_ENTRY_NAME_LEN], 0))
            }
            None => None,
        };
        if record.is_some() {
            dir.cursor += 1;
            self.dir_reads += 1;
        }
        Ok(record)
    }

    fn open_file(
        &mut self,
        parent: &Self::Dir,
        name: &str,
        mode: OpenMode,
    ) -> Result<Self::File, Self::Error> {
        self.trace.push(CardTrace::OpenFile(String::from(name)));
        let node = match (self.find_slot(parent.node, name), mode) {
            (Some(idx), _) => self.slot_node(parent.node, idx)?,
            (None, OpenMode::Read) => return Err(MemoryCardError::NotFound),
            (None, OpenMode::Write) => self.insert_entry(
                parent.node,
                name,
                None,
                DIR_ATT_ARCHIVE,
                Node::File { data: Vec::new() },
            )?,
        };
        match &mut self.nodes[node] {
            Node::Dir { .. } => return Err(MemoryCardError::IsDirectory),
            Node::File { data } => {
                if mode == OpenMode::Write {
                    data.clear();
                }
            }
        }
        self.open_files += 1;
        Ok(MemoryFile {
            node,
            position: 0,
            mode,
        })
    }

    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let data = self.file_node_mut(file)?;
        let start = (file.position as usize).min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        file.position += count as u32;
        Ok(count)
    }

    fn write(&mut self, file: &mut Self::File, bytes: &[u8]) -> Result<usize, Self::Error> {
        if file.mode != OpenMode::Write || self.fail_writes {
            return Err(MemoryCardError::WriteFault);
        }
        let data = self.file_node_mut(file)?;
        data.extend_from_slice(bytes);
        file.position = data.len() as u32;
        Ok(bytes.len())
    }

    fn seek(&mut self, file: &mut Self::File, position: u32) -> Result<(), Self::Error> {
        file.position = position.min(self.file_len(file));
        Ok(())
    }

    fn position(&self, file: &Self::File) -> u32 {
        file.position
    }

    fn size(&self, file: &Self::File) -> u32 {
        self.file_len(file)
    }

    fn sync(&mut self, _file: &mut Self::File) -> Result<(), Self::Error> {
        Ok(())
    }

    fn close(&mut self, _file: Self::File) {
        self.open_files = self.open_files.saturating_sub(1);
    }

    fn remove(&mut self, parent: &Self::Dir, name: &str) -> Result<(), Self::Error> {
        self.trace.push(CardTrace::Remove(String::from(name)));
        let idx = self
            .find_slot(parent.node, name)
            .ok_or(MemoryCardError::NotFound)?;
        let node = self.slot_node(parent.node, idx)?;
        if matches!(self.nodes[node], Node::Dir { .. }) {
            return Err(MemoryCardError::IsDirectory);
        }
        self.slots_mut(parent.node)?[idx].raw.name[0] = DIR_NAME_DELETED;
        Ok(())
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    }
}

/// `name.ext` to the padded upper-case 11-byte directory form.
pub fn encode_short_name(segment: &str) -> Result<[u8; DIR_ENTRY_NAME_LEN], MemoryCardError> {
    let bytes = segment.as_bytes();
    let mut out = [b' '; DIR_ENTRY_NAME_LEN];
    let (name, ext) = match bytes.iter().position(|&b| b == b'.') {
        Some(dot) => {
            let after = &bytes[dot + 1..];
            if after.contains(&b'.') {
                return Err(MemoryCardError::InvalidShortName);
            }
            (&bytes[..dot], after)
        }
        None => (bytes, &[][..]),
    };
    if name.is_empty() || name.len() > 8 || ext.len() > 3 {
        return Err(MemoryCardError::InvalidShortName);
    }
    for (i, b) in name.iter().enumerate() {
        out[i] = normalize_short_char(*b)?;
    }
    for (i, b) in ext.iter().enumerate() {
        out[8 + i] = normalize_short_char(*b)?;
    }
    Ok(out)
}

fn normalize_short_char(byte: u8) -> Result<u8, MemoryCardError> {
    let up = byte.to_ascii_uppercase();
    if up.is_ascii_alphanumeric() || matches!(up, b'_' | b'-' | b'$' | b'~' | b'!' | b'#') {
        Ok(up)
    } else {
        Err(MemoryCardError::InvalidShortName)
    }
}
