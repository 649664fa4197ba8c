use alloc::{string::String, vec::Vec};

use super::*;
use crate::driver::{memory::MemoryCard, RawDirEntry, DIR_ATT_VOLUME_ID};

fn sample_card() -> MemoryCard {
    let mut card = MemoryCard::new();
    card.add_file("/BENCHY.GCO", b"G28\n").unwrap();
    card.add_file("/README.TXT", b"not runnable").unwrap();
    card.add_file("/OLD.G~", b"disabled").unwrap();
    card.add_dir("/PARTS").unwrap();
    card.add_file("/PARTS/GEAR.G", b"G1 X1\n").unwrap();
    card.add_file("/PARTS/NOTES.TXT", b"").unwrap();
    card.add_dir("/PARTS/SMALL").unwrap();
    card.add_file("/PARTS/SMALL/PIN.GCO", b"").unwrap();
    card.add_hidden_file("/SECRET.G", b"").unwrap();
    card.add_file_with_long_name("/CALIBR~1.GCO", "calibration cube.gcode", b"")
        .unwrap();
    card.add_file_with_long_name("/_TRASH~1.GCO", ".trashed.gcode", b"")
        .unwrap();
    card.add_deleted("/GONE.G").unwrap();
    card
}

fn names<D: CardDriver>(driver: &mut D, dir: &D::Dir) -> Vec<String> {
    let total = count(driver, dir);
    (0..total)
        .map(|i| {
            let found = find(driver, dir, Target::Index(i)).unwrap();
            String::from(found.entry.short_name.as_str())
        })
        .collect()
}

#[test]
fn count_skips_hidden_deleted_dot_named_and_non_runnable() {
    let mut card = sample_card();
    let root = card.open_root().unwrap();
    assert_eq!(count(&mut card, &root), 3);
    assert_eq!(
        names(&mut card, &root),
        ["BENCHY.GCO", "PARTS", "CALIBR~1.GCO"]
    );
}

#[test]
fn count_matches_enumeration_in_every_directory() {
    let mut card = sample_card();
    let root = card.open_root().unwrap();
    let parts = card.open_dir(&root, "PARTS").unwrap();
    let small = card.open_dir(&parts, "SMALL").unwrap();
    for dir in [&root, &parts, &small] {
        let total = count(&mut card, dir);
        assert_eq!(names(&mut card, dir).len(), total as usize);
        assert!(find(&mut card, dir, Target::Index(total)).is_none());
    }
}

#[test]
fn find_by_name_round_trips_index() {
    let mut card = sample_card();
    let root = card.open_root().unwrap();
    let total = count(&mut card, &root);
    for i in 0..total {
        let name = find(&mut card, &root, Target::Index(i)).unwrap().entry.short_name;
        let found = find(&mut card, &root, Target::Name(&name)).unwrap();
        assert_eq!(found.index, i);
    }
}

#[test]
fn find_by_name_ignores_case_and_accepts_long_names() {
    let mut card = sample_card();
    let root = card.open_root().unwrap();
    let found = find(&mut card, &root, Target::Name("benchy.gco")).unwrap();
    assert_eq!(found.index, 0);
    let found = find(&mut card, &root, Target::Name("Calibration Cube.gcode")).unwrap();
    assert_eq!(found.entry.short_name.as_str(), "CALIBR~1.GCO");
    assert_eq!(found.entry.long_name.as_str(), "calibration cube.gcode");
    assert!(find(&mut card, &root, Target::Name("missing.g")).is_none());
}

#[test]
fn find_stops_at_first_match() {
    let mut card = MemoryCard::new();
    for i in 0..20 {
        card.add_file(&alloc::format!("/F{i}.G"), b"").unwrap();
    }
    let root = card.open_root().unwrap();
    let before = card.dir_reads();
    let found = find(&mut card, &root, Target::Index(2)).unwrap();
    assert_eq!(found.entry.short_name.as_str(), "F2.G");
    assert_eq!(card.dir_reads() - before, 3);
}

#[test]
fn scan_stops_at_free_marker() {
    let mut card = MemoryCard::new();
    card.add_file("/A.G", b"").unwrap();
    card.add_free_marker("/").unwrap();
    card.add_raw("/", RawDirEntry::new(*b"B       G  ", 0x20), None)
        .unwrap();
    let root = card.open_root().unwrap();
    assert_eq!(count(&mut card, &root), 1);
}

#[test]
fn volume_labels_are_not_entries() {
    let mut card = MemoryCard::new();
    card.add_raw("/", RawDirEntry::new(*b"PRINTER G  ", DIR_ATT_VOLUME_ID), None)
        .unwrap();
    card.add_file("/A.G", b"").unwrap();
    let root = card.open_root().unwrap();
    assert_eq!(names(&mut card, &root), ["A.G"]);
}

#[test]
fn print_tree_recurses_with_full_paths() {
    let mut card = sample_card();
    let root = card.open_root().unwrap();
    let mut out = String::new();
    print_tree(&mut card, &root, "", &mut out);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        [
            "BENCHY.GCO",
            "/PARTS/GEAR.G",
            "/PARTS/SMALL/PIN.GCO",
            "CALIBR~1.GCO",
        ]
    );
}

#[test]
fn print_tree_below_root_keeps_paths_absolute() {
    let mut card = sample_card();
    let root = card.open_root().unwrap();
    let parts = card.open_dir(&root, "PARTS").unwrap();
    let mut out = String::new();
    print_tree(&mut card, &parts, "/PARTS/", &mut out);
    assert_eq!(out, "/PARTS/GEAR.G\n/PARTS/SMALL/PIN.GCO\n");
}

#[test]
fn print_tree_stops_descending_at_depth_limit() {
    let mut card = MemoryCard::new();
    let mut dir = String::new();
    for level in 1..=MAX_DIR_DEPTH + 1 {
        dir.push_str(&format!("/D{level}"));
    }
    card.add_file(&format!("{dir}/DEEP.G"), b"").unwrap();
    let (last_listed, _) = dir.rsplit_once('/').unwrap();
    card.add_file(&format!("{last_listed}/A.G"), b"").unwrap();

    let root = card.open_root().unwrap();
    let mut out = String::new();
    print_tree(&mut card, &root, "", &mut out);
    assert_eq!(
        out,
        format!(
            "Cannot open subdir D{}\n{}/A.G\n",
            MAX_DIR_DEPTH + 1,
            last_listed
        )
    );
}

#[test]
fn print_long_path_uses_long_names() {
    let mut card = MemoryCard::new();
    card.add_dir_with_long_name("/MYPROJ~1", "My Project").unwrap();
    card.add_file_with_long_name("/MYPROJ~1/BRACKE~1.GCO", "Bracket v2.gcode", b"")
        .unwrap();
    let root = card.open_root().unwrap();
    let mut out = String::new();
    print_long_path(&mut card, &root, "/MYPROJ~1/BRACKE~1.GCO", &mut out);
    assert_eq!(out, "/My Project/Bracket v2.gcode\n");
}

#[test]
fn print_long_path_marks_missing_long_names() {
    let mut card = sample_card();
    let root = card.open_root().unwrap();
    let mut out = String::new();
    print_long_path(&mut card, &root, "/PARTS/GEAR.G", &mut out);
    assert_eq!(out, "/???/???\n");
}
