use crate::{
    config::{LongName, ShortName, DISABLED_EXT_MARKER, INSTRUCTION_EXT_MARKER},
    driver::{RawDirEntry, DIR_ENTRY_NAME_LEN},
};

/// A live directory record after decoding, borrowed by one traversal step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub short_name: ShortName,
    pub long_name: LongName,
    pub is_dir: bool,
    pub is_hidden: bool,
}

impl DirEntry {
    pub fn from_raw(raw: &RawDirEntry, long_name: &LongName) -> Self {
        Self {
            short_name: create_filename(&raw.name),
            long_name: long_name.clone(),
            is_dir: raw.is_subdir(),
            is_hidden: raw.is_hidden(),
        }
    }

    /// Long name when the card supplied one, otherwise the 8.3 name.
    pub fn longest_name(&self) -> &str {
        if self.long_name.is_empty() {
            self.short_name.as_str()
        } else {
            self.long_name.as_str()
        }
    }
}

/// Padded 11-byte directory name to `NAME.EXT`.
///
/// Padding spaces are dropped and the dot is only emitted when the
/// extension has a first character. Bytes outside printable ASCII are shown
/// as `?`.
pub fn create_filename(raw: &[u8; DIR_ENTRY_NAME_LEN]) -> ShortName {
    let mut out = ShortName::new();
    for (i, &byte) in raw.iter().enumerate() {
        if byte == b' ' {
            continue;
        }
        if i == 8 {
            let _ = out.push('.');
        }
        let ch = if byte.is_ascii_graphic() {
            byte as char
        } else {
            '?'
        };
        let _ = out.push(ch);
    }
    out
}

/// Runnable instruction files carry `G` as the first extension byte and
/// anything but `~` as the second.
pub fn is_instruction_file(raw: &[u8; DIR_ENTRY_NAME_LEN]) -> bool {
    raw[8] == INSTRUCTION_EXT_MARKER && raw[9] != DISABLED_EXT_MARKER
}

pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
