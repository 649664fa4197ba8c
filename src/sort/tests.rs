use alloc::{string::String, vec::Vec};

use super::*;
use crate::config::{LongName, ShortName};

struct VecSource {
    entries: Vec<DirEntry>,
    reads: usize,
}

impl VecSource {
    fn new(rows: &[(&str, &str, bool)]) -> Self {
        let entries = rows
            .iter()
            .map(|(short, long, is_dir)| DirEntry {
                short_name: ShortName::try_from(*short).unwrap(),
                long_name: LongName::try_from(*long).unwrap(),
                is_dir: *is_dir,
                is_hidden: false,
            })
            .collect();
        Self { entries, reads: 0 }
    }
}

impl EntrySource for VecSource {
    fn entry_count(&mut self) -> u16 {
        self.entries.len() as u16
    }

    fn entry(&mut self, raw_index: u16) -> Option<DirEntry> {
        self.reads += 1;
        self.entries.get(raw_index as usize).cloned()
    }
}

const TIERS: [SortTier; 3] = [SortTier::Storage, SortTier::Transient, SortTier::Cached];

fn mixed_source() -> VecSource {
    VecSource::new(&[
        ("ZEBRA.GCO", "", false),
        ("PARTS", "", true),
        ("apple.g", "", false),
        ("BRACKE~1.GCO", "bracket.gcode", false),
        ("ARCHIVE", "", true),
        ("Mango.g", "", false),
        ("APPLE2.G", "", false),
    ])
}

fn sorted_names(table: &SortTable, source: &mut VecSource) -> Vec<String> {
    (0..table.len() as u16)
        .map(|pos| {
            let entry = source.entry(table.raw_index(pos)).unwrap();
            String::from(entry.longest_name())
        })
        .collect()
}

fn assert_permutation(order: &[u16], len: usize) {
    let mut seen = alloc::vec![false; len];
    assert_eq!(order.len(), len);
    for &raw in order {
        assert!(!seen[raw as usize], "duplicate raw index {raw}");
        seen[raw as usize] = true;
    }
}

#[test]
fn comparator_honors_folder_polarity() {
    assert!(out_of_order("b", false, "a", false, FolderSorting::Off));
    assert!(!out_of_order("A", false, "b", false, FolderSorting::Off));
    assert!(out_of_order("a", false, "z", true, FolderSorting::Above));
    assert!(!out_of_order("a", false, "z", true, FolderSorting::Below));
    assert!(out_of_order("a", true, "z", false, FolderSorting::Below));
    assert!(!out_of_order("a", true, "z", false, FolderSorting::Off));
}

#[test]
fn cmp_ignore_case_is_strcasecmp_like() {
    assert_eq!(cmp_ignore_case("apple", "APPLE"), Ordering::Equal);
    assert_eq!(cmp_ignore_case("apple", "APPLE2"), Ordering::Less);
    assert_eq!(cmp_ignore_case("Mango", "bracket"), Ordering::Greater);
}

#[test]
fn every_tier_produces_the_same_folder_first_order() {
    for tier in TIERS {
        let mut source = mixed_source();
        let mut table = SortTable::new(tier);
        table.rebuild(&mut source, FolderSorting::Above);
        assert_permutation(table.order(), 7);
        assert_eq!(
            sorted_names(&table, &mut source),
            [
                "ARCHIVE",
                "PARTS",
                "apple.g",
                "APPLE2.G",
                "bracket.gcode",
                "Mango.g",
                "ZEBRA.GCO",
            ],
            "tier {tier:?}"
        );
    }
}

#[test]
fn folders_below_and_unsorted_folders() {
    let mut source = mixed_source();
    let mut table = SortTable::new(SortTier::Transient);
    table.rebuild(&mut source, FolderSorting::Below);
    let names = sorted_names(&table, &mut source);
    assert_eq!(&names[5..], ["ARCHIVE", "PARTS"]);

    table.rebuild(&mut source, FolderSorting::Off);
    let names = sorted_names(&table, &mut source);
    assert_eq!(names[0], "apple.g");
    assert_eq!(names[2], "ARCHIVE");
}

#[test]
fn names_are_non_decreasing_within_each_group() {
    for tier in TIERS {
        let mut source = mixed_source();
        let mut table = SortTable::new(tier);
        table.rebuild(&mut source, FolderSorting::Off);
        let names = sorted_names(&table, &mut source);
        for pair in names.windows(2) {
            assert_ne!(cmp_ignore_case(&pair[0], &pair[1]), Ordering::Greater);
        }
    }
}

#[test]
fn equal_names_keep_directory_order() {
    let mut source = VecSource::new(&[("B.G", "", false), ("A.G", "same", false), ("C.G", "SAME", false)]);
    let mut table = SortTable::new(SortTier::Cached);
    table.rebuild(&mut source, FolderSorting::Off);
    assert_eq!(table.order(), [0, 1, 2]);
}

#[test]
fn rebuild_is_idempotent_and_counts_generations() {
    let mut source = mixed_source();
    let mut table = SortTable::new(SortTier::Storage);
    table.rebuild(&mut source, FolderSorting::Above);
    let first: Vec<u16> = table.order().to_vec();
    table.rebuild(&mut source, FolderSorting::Above);
    assert_eq!(table.order(), first.as_slice());
    assert_eq!(table.generation(), 2);
}

#[test]
fn entry_count_is_capped_and_positions_fall_through() {
    let rows: Vec<(String, bool)> = (0..SORT_LIMIT + 5)
        .rev()
        .map(|i| (alloc::format!("F{i:03}.G"), false))
        .collect();
    let row_refs: Vec<(&str, &str, bool)> =
        rows.iter().map(|(n, d)| (n.as_str(), "", *d)).collect();
    let mut source = VecSource::new(&row_refs);
    let mut table = SortTable::new(SortTier::Transient);
    table.rebuild(&mut source, FolderSorting::Above);
    assert_eq!(table.len(), SORT_LIMIT);
    assert_permutation(table.order(), SORT_LIMIT);
    assert_eq!(table.raw_index(0), (SORT_LIMIT - 1) as u16);
    let past = SORT_LIMIT as u16 + 2;
    assert_eq!(table.raw_index(past), past);
}

#[test]
fn storage_tier_rereads_while_cached_tier_serves_from_ram() {
    let mut storage_source = mixed_source();
    let mut storage = SortTable::new(SortTier::Storage);
    storage.rebuild(&mut storage_source, FolderSorting::Above);
    assert!(storage_source.reads > 7);
    assert!(storage.cached(0).is_none());

    let mut cached_source = mixed_source();
    let mut cached = SortTable::new(SortTier::Cached);
    cached.rebuild(&mut cached_source, FolderSorting::Above);
    assert_eq!(cached_source.reads, 7);
    let entry = cached.cached(3).unwrap();
    assert_eq!(entry.short_name.as_str(), "BRACKE~1.GCO");
    assert_eq!(entry.long_name.as_str(), "bracket.gcode");
    assert_eq!(cached.find_cached("parts", 0), Some(1));
    assert_eq!(cached.find_cached("parts", 2), None);
    assert_eq!(cached_source.reads, 7);
}

#[test]
fn transient_tier_releases_names_after_sorting() {
    let mut source = mixed_source();
    let mut table = SortTable::new(SortTier::Transient);
    table.rebuild(&mut source, FolderSorting::Above);
    assert_eq!(source.reads, 7);
    assert!(table.cached(0).is_none());
}

#[test]
fn flush_and_empty_directory() {
    let mut source = mixed_source();
    let mut table = SortTable::new(SortTier::Cached);
    table.rebuild(&mut source, FolderSorting::Above);
    table.flush();
    assert!(table.is_empty());
    assert!(table.cached(0).is_none());
    assert_eq!(table.raw_index(4), 4);

    let mut empty = VecSource::new(&[]);
    table.rebuild(&mut empty, FolderSorting::Above);
    assert!(table.is_empty());
}

#[test]
fn dir_bits_round_trip() {
    let mut bits = DirBits::default();
    bits.set(0, true);
    bits.set(9, true);
    bits.set(9, false);
    bits.set(SORT_LIMIT as u16 - 1, true);
    assert!(bits.get(0));
    assert!(!bits.get(9));
    assert!(bits.get(SORT_LIMIT as u16 - 1));
    assert!(!bits.get(SORT_LIMIT as u16 + 100));
}
