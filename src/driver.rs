use core::fmt;

use crate::config::{LongName, SpiSpeed};

pub mod memory;

pub const DIR_ENTRY_NAME_LEN: usize = 11;
pub const DIR_NAME_FREE: u8 = 0x00;
pub const DIR_NAME_DELETED: u8 = 0xE5;

pub const DIR_ATT_READ_ONLY: u8 = 0x01;
pub const DIR_ATT_HIDDEN: u8 = 0x02;
pub const DIR_ATT_SYSTEM: u8 = 0x04;
pub const DIR_ATT_VOLUME_ID: u8 = 0x08;
pub const DIR_ATT_DIRECTORY: u8 = 0x10;
pub const DIR_ATT_ARCHIVE: u8 = 0x20;
pub const DIR_ATT_LONG_NAME: u8 = 0x0F;
const DIR_ATT_FILE_TYPE_MASK: u8 = DIR_ATT_VOLUME_ID | DIR_ATT_DIRECTORY;

/// One 8.3 record exactly as the driver read it from the directory table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawDirEntry {
    pub name: [u8; DIR_ENTRY_NAME_LEN],
    pub attributes: u8,
    pub size: u32,
}

impl RawDirEntry {
    pub const fn new(name: [u8; DIR_ENTRY_NAME_LEN], attributes: u8) -> Self {
        Self {
            name,
            attributes,
            size: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == DIR_NAME_FREE
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == DIR_NAME_DELETED
    }

    pub fn is_dot(&self) -> bool {
        self.name[0] == b'.'
    }

    pub fn is_long_name_slot(&self) -> bool {
        self.attributes & DIR_ATT_LONG_NAME == DIR_ATT_LONG_NAME
    }

    pub fn is_subdir(&self) -> bool {
        !self.is_long_name_slot() && self.attributes & DIR_ATT_FILE_TYPE_MASK == DIR_ATT_DIRECTORY
    }

    pub fn is_file_or_subdir(&self) -> bool {
        !self.is_long_name_slot() && self.attributes & DIR_ATT_VOLUME_ID == 0
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes & DIR_ATT_HIDDEN != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create, truncate and append; shared by writing and logging sessions.
    Write,
}

/// Stage of card bring-up that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStage {
    Card,
    Volume,
    Root,
}

/// Block-storage and FAT primitives the session sits on.
///
/// Directory handles carry their own read cursor; `rewind` resets it and
/// `read_dir` advances it by one raw record. Handles are cheap to clone and
/// cloning an open directory does not reopen it on the card.
pub trait CardDriver {
    type Dir: Clone;
    type File;
    type Error: fmt::Debug;

    fn init_card(&mut self, speed: SpiSpeed, chip_select: u8) -> Result<(), Self::Error>;
    fn init_volume(&mut self) -> Result<(), Self::Error>;
    fn open_root(&mut self) -> Result<Self::Dir, Self::Error>;

    fn open_dir(&mut self, parent: &Self::Dir, name: &str) -> Result<Self::Dir, Self::Error>;
    fn rewind(&mut self, dir: &mut Self::Dir);
    /// Next raw record, or `None` once the directory's storage is exhausted.
    ///
    /// `long_name` is cleared and refilled for every record; it only
    /// describes the record returned by the same call.
    fn read_dir(
        &mut self,
        dir: &mut Self::Dir,
        long_name: &mut LongName,
    ) -> Result<Option<RawDirEntry>, Self::Error>;

    fn open_file(
        &mut self,
        parent: &Self::Dir,
        name: &str,
        mode: OpenMode,
    ) -> Result<Self::File, Self::Error>;
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, Self::Error>;
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, Self::Error>;
    fn seek(&mut self, file: &mut Self::File, position: u32) -> Result<(), Self::Error>;
    fn position(&self, file: &Self::File) -> u32;
    fn size(&self, file: &Self::File) -> u32;
    fn sync(&mut self, file: &mut Self::File) -> Result<(), Self::Error>;
    fn close(&mut self, file: Self::File);
    fn remove(&mut self, parent: &Self::Dir, name: &str) -> Result<(), Self::Error>;
}
