//! Power-up scan for `auto0.g`, `auto1.g`, ... in the volume root.

use core::fmt::Write as _;

use crate::{
    config::{ShortName, AUTOSTART_PREFIX, AUTOSTART_SUFFIX},
    driver::CardDriver,
    traverse::{self, Target},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Autostart {
    /// Next file number to look for; `None` once a number was missing.
    index: Option<u16>,
    pending: bool,
    due_ms: u64,
}

impl Autostart {
    pub fn new(boot_ms: u64, delay_ms: u64) -> Self {
        Self {
            index: Some(0),
            pending: true,
            due_ms: boot_ms.saturating_add(delay_ms),
        }
    }

    pub fn index(&self) -> Option<u16> {
        self.index
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// `true` when a scan should run now. Consumes the pending power-up scan.
    pub fn take_due(&mut self, force: bool, now_ms: u64) -> bool {
        if !force && !(self.pending && now_ms >= self.due_ms) {
            return false;
        }
        self.pending = false;
        true
    }

    /// Records the scan result and advances to the next number.
    pub fn record(&mut self, found: bool) {
        self.index = match (found, self.index) {
            (true, Some(index)) => Some(index.saturating_add(1)),
            _ => None,
        };
    }
}

pub fn file_name(index: u16) -> ShortName {
    let mut name = ShortName::new();
    let _ = write!(name, "{}{}{}", AUTOSTART_PREFIX, index, AUTOSTART_SUFFIX);
    name
}

/// Name of the runnable `auto<index>.g` in `root`, if present.
pub fn scan<D: CardDriver>(driver: &mut D, root: &D::Dir, index: u16) -> Option<ShortName> {
    let wanted = file_name(index);
    let found = traverse::find(driver, root, Target::Name(&wanted))?;
    if found.entry.is_dir {
        return None;
    }
    log::info!(
        "sdcard: autostart found index={} name={}",
        index,
        found.entry.short_name
    );
    Some(wanted)
}
