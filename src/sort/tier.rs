use alloc::vec::Vec;

use crate::{
    codec::DirEntry,
    config::{FolderSorting, LongName, ShortName},
};

use super::{out_of_order, DirBits, EntrySource, SortStrategy};

fn longest_name(entry: &DirEntry) -> LongName {
    let mut name = LongName::new();
    // Short names always fit; long names are already bounded by the driver.
    let _ = name.push_str(entry.longest_name());
    name
}

/// Tier 0: nothing is buffered, both entries are re-read per comparison.
#[derive(Clone, Copy, Debug, Default)]
pub struct StorageSort;

impl SortStrategy for StorageSort {
    fn load(&mut self, _source: &mut dyn EntrySource, _count: u16) {}

    fn out_of_order(
        &mut self,
        source: &mut dyn EntrySource,
        a: u16,
        b: u16,
        folders: FolderSorting,
    ) -> bool {
        let Some(first) = source.entry(a) else {
            return false;
        };
        let first_name = longest_name(&first);
        let Some(second) = source.entry(b) else {
            return false;
        };
        out_of_order(
            &first_name,
            first.is_dir,
            second.longest_name(),
            second.is_dir,
            folders,
        )
    }

    fn finish(&mut self) {}

    fn flush(&mut self) {}

    fn cached(&self, _raw_index: u16) -> Option<DirEntry> {
        None
    }
}

/// Tier 1: names and folder bits live in RAM only while sorting.
#[derive(Clone, Debug, Default)]
pub struct TransientSort {
    names: Vec<LongName>,
    dirs: DirBits,
}

impl SortStrategy for TransientSort {
    fn load(&mut self, source: &mut dyn EntrySource, count: u16) {
        self.names = Vec::with_capacity(count as usize);
        for raw in 0..count {
            let entry = source.entry(raw);
            self.dirs.set(raw, entry.as_ref().is_some_and(|e| e.is_dir));
            self.names
                .push(entry.as_ref().map(longest_name).unwrap_or_default());
        }
    }

    fn out_of_order(
        &mut self,
        _source: &mut dyn EntrySource,
        a: u16,
        b: u16,
        folders: FolderSorting,
    ) -> bool {
        let (Some(a_name), Some(b_name)) = (self.names.get(a as usize), self.names.get(b as usize))
        else {
            return false;
        };
        out_of_order(a_name, self.dirs.get(a), b_name, self.dirs.get(b), folders)
    }

    fn finish(&mut self) {
        self.flush();
    }

    fn flush(&mut self) {
        self.names = Vec::new();
        self.dirs = DirBits::default();
    }

    fn cached(&self, _raw_index: u16) -> Option<DirEntry> {
        None
    }
}

/// Tier 2: short names, long names and folder bits stay on the heap until
/// the next rebuild so listings never go back to the card.
#[derive(Clone, Debug, Default)]
pub struct CachedSort {
    short_names: Vec<ShortName>,
    long_names: Vec<LongName>,
    dirs: DirBits,
}

impl CachedSort {
    fn sort_name(&self, raw: u16) -> Option<&str> {
        let long = self.long_names.get(raw as usize)?;
        if long.is_empty() {
            self.short_names.get(raw as usize).map(|s| s.as_str())
        } else {
            Some(long.as_str())
        }
    }
}

impl SortStrategy for CachedSort {
    fn load(&mut self, source: &mut dyn EntrySource, count: u16) {
        self.short_names = Vec::with_capacity(count as usize);
        self.long_names = Vec::with_capacity(count as usize);
        for raw in 0..count {
            match source.entry(raw) {
                Some(entry) => {
                    self.dirs.set(raw, entry.is_dir);
                    self.short_names.push(entry.short_name);
                    self.long_names.push(entry.long_name);
                }
                None => {
                    self.dirs.set(raw, false);
                    self.short_names.push(ShortName::new());
                    self.long_names.push(LongName::new());
                }
            }
        }
    }

    fn out_of_order(
        &mut self,
        _source: &mut dyn EntrySource,
        a: u16,
        b: u16,
        folders: FolderSorting,
    ) -> bool {
        let (Some(a_name), Some(b_name)) = (self.sort_name(a), self.sort_name(b)) else {
            return false;
        };
        out_of_order(a_name, self.dirs.get(a), b_name, self.dirs.get(b), folders)
    }

    fn finish(&mut self) {}

    fn flush(&mut self) {
        self.short_names = Vec::new();
        self.long_names = Vec::new();
        self.dirs = DirBits::default();
    }

    fn cached(&self, raw_index: u16) -> Option<DirEntry> {
        let short_name = self.short_names.get(raw_index as usize)?.clone();
        let long_name = self.long_names.get(raw_index as usize)?.clone();
        Some(DirEntry {
            short_name,
            long_name,
            is_dir: self.dirs.get(raw_index),
            is_hidden: false,
        })
    }
}
