//! Display ordering for the working directory.
//!
//! The table is a permutation of the first `SORT_LIMIT` eligible entries,
//! case-insensitive by name with folders optionally grouped. How much of
//! the directory is buffered while sorting depends on the `SortTier` picked
//! at startup; every tier produces the same order.

use core::cmp::Ordering;

use crate::{
    codec::DirEntry,
    config::{FolderSorting, SortTier, SORT_LIMIT},
};

mod tier;

#[cfg(test)]
mod tests;

pub use tier::{CachedSort, StorageSort, TransientSort};

pub type SortOrder = heapless::Vec<u16, SORT_LIMIT>;

/// Eligible entries of the directory being sorted, addressed by raw index.
pub trait EntrySource {
    fn entry_count(&mut self) -> u16;
    fn entry(&mut self, raw_index: u16) -> Option<DirEntry>;
}

/// One memory tier of the sort engine.
pub trait SortStrategy {
    /// Reads whatever the tier buffers for the upcoming sort.
    fn load(&mut self, source: &mut dyn EntrySource, count: u16);
    /// `true` when the entry at raw index `a` must come after `b`.
    fn out_of_order(
        &mut self,
        source: &mut dyn EntrySource,
        a: u16,
        b: u16,
        folders: FolderSorting,
    ) -> bool;
    /// Called once the order is final.
    fn finish(&mut self);
    fn flush(&mut self);
    /// Entry served from RAM, without touching the card.
    fn cached(&self, raw_index: u16) -> Option<DirEntry>;
}

/// Bit per raw index, set for directories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirBits([u8; (SORT_LIMIT + 7) / 8]);

impl DirBits {
    pub fn set(&mut self, index: u16, is_dir: bool) {
        let (byte, mask) = Self::slot(index);
        if is_dir {
            self.0[byte] |= mask;
        } else {
            self.0[byte] &= !mask;
        }
    }

    pub fn get(&self, index: u16) -> bool {
        let (byte, mask) = Self::slot(index);
        self.0.get(byte).is_some_and(|b| b & mask != 0)
    }

    fn slot(index: u16) -> (usize, u8) {
        ((index >> 3) as usize, 1 << (index & 0x07))
    }
}

/// ASCII case-insensitive ordering, byte by byte.
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let a = a.bytes().map(|c| c.to_ascii_lowercase());
    let b = b.bytes().map(|c| c.to_ascii_lowercase());
    a.cmp(b)
}

/// Sort comparator shared by every tier.
pub fn out_of_order(
    a_name: &str,
    a_dir: bool,
    b_name: &str,
    b_dir: bool,
    folders: FolderSorting,
) -> bool {
    if a_dir != b_dir {
        match folders {
            FolderSorting::Above => return b_dir,
            FolderSorting::Below => return a_dir,
            FolderSorting::Off => {}
        }
    }
    cmp_ignore_case(a_name, b_name) == Ordering::Greater
}

#[derive(Debug)]
enum Strategy {
    Storage(StorageSort),
    Transient(TransientSort),
    Cached(CachedSort),
}

impl Strategy {
    fn as_dyn(&mut self) -> &mut dyn SortStrategy {
        match self {
            Self::Storage(s) => s,
            Self::Transient(s) => s,
            Self::Cached(s) => s,
        }
    }

    fn as_dyn_ref(&self) -> &dyn SortStrategy {
        match self {
            Self::Storage(s) => s,
            Self::Transient(s) => s,
            Self::Cached(s) => s,
        }
    }
}

#[derive(Debug)]
pub struct SortTable {
    strategy: Strategy,
    order: SortOrder,
    generation: u32,
}

impl SortTable {
    pub fn new(tier: SortTier) -> Self {
        let strategy = match tier {
            SortTier::Storage => Strategy::Storage(StorageSort),
            SortTier::Transient => Strategy::Transient(TransientSort::default()),
            SortTier::Cached => Strategy::Cached(CachedSort::default()),
        };
        Self {
            strategy,
            order: SortOrder::new(),
            generation: 0,
        }
    }

    pub fn tier(&self) -> SortTier {
        match self.strategy {
            Strategy::Storage(_) => SortTier::Storage,
            Strategy::Transient(_) => SortTier::Transient,
            Strategy::Cached(_) => SortTier::Cached,
        }
    }

    /// Drops the previous table and sorts the source from scratch.
    pub fn rebuild(&mut self, source: &mut dyn EntrySource, folders: FolderSorting) {
        self.flush();
        self.generation = self.generation.wrapping_add(1);

        let count = source.entry_count().min(SORT_LIMIT as u16);
        if count == 0 {
            return;
        }
        for raw in 0..count {
            // Capacity equals SORT_LIMIT and count is clamped to it.
            let _ = self.order.push(raw);
        }

        let strategy = self.strategy.as_dyn();
        strategy.load(source, count);

        // Bubble sort with early exit keeps equal names in directory order.
        let len = self.order.len();
        for pass_end in (1..len).rev() {
            let mut swapped = false;
            for j in 0..pass_end {
                let (o1, o2) = (self.order[j], self.order[j + 1]);
                if strategy.out_of_order(source, o1, o2, folders) {
                    self.order.swap(j, j + 1);
                    swapped = true;
                }
            }
            if !swapped {
                break;
            }
        }

        strategy.finish();
        log::debug!(
            "sdcard: presort count={} tier={:?} generation={}",
            count,
            self.tier(),
            self.generation
        );
    }

    /// Releases the order and any buffered names.
    pub fn flush(&mut self) {
        self.order.clear();
        self.strategy.as_dyn().flush();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[u16] {
        &self.order
    }

    /// Rebuild counter, bumped on every `rebuild`.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Raw index at display position `position`; positions past the table
    /// fall through unsorted.
    pub fn raw_index(&self, position: u16) -> u16 {
        self.order
            .get(position as usize)
            .copied()
            .unwrap_or(position)
    }

    pub fn cached(&self, raw_index: u16) -> Option<DirEntry> {
        if raw_index as usize >= self.order.len() {
            return None;
        }
        self.strategy.as_dyn_ref().cached(raw_index)
    }

    /// Raw index of the first cached entry at or after `from` whose short
    /// name matches.
    pub fn find_cached(&self, name: &str, from: u16) -> Option<u16> {
        (from..self.order.len() as u16).find(|&raw| {
            self.cached(raw)
                .is_some_and(|entry| entry.short_name.eq_ignore_ascii_case(name))
        })
    }
}
