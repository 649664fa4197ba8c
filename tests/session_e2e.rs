use sdreader::{
    driver::memory::CardTrace, CardReader, FolderSorting, MemoryCard, RecordingHost,
    SessionConfig, SessionError, SessionMode, SortTier,
};

type Reader = CardReader<MemoryCard, RecordingHost>;

fn job_card() -> MemoryCard {
    let mut card = MemoryCard::new();
    card.add_file("/MAIN.G", b"G28\nM32 /LIB/SUB.G\nG1 X5\n")
        .unwrap();
    card.add_file("/LIB/SUB.G", b"G1 X1\nG1 X2\n").unwrap();
    card.add_file("/SUBDIR/PART.GCO", b"G1 Z2\n").unwrap();
    card.add_file("/SUBDIR/OTHER.G", b"").unwrap();
    card.add_file_with_long_name("/BRACKE~1.GCO", "Bracket v2.gcode", b"")
        .unwrap();
    card.add_file("/apple.g", b"").unwrap();
    card.add_file("/README.TXT", b"").unwrap();
    card
}

fn mount(card: MemoryCard, config: SessionConfig) -> Reader {
    let mut reader = CardReader::new(card, RecordingHost::new(), config);
    reader.init_card().expect("card mounts");
    reader.host_mut().take_output();
    reader.driver_mut().take_trace();
    reader
}

fn drain(reader: &mut Reader) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = reader.read_line() {
        lines.push(String::from(line.as_str()));
    }
    lines
}

#[test]
fn absolute_path_opens_subdir_then_file() {
    let mut reader = mount(job_card(), SessionConfig::default());
    reader.open_file("/SUBDIR/PART.GCO", true, false).unwrap();
    assert_eq!(
        reader.driver_mut().take_trace(),
        [
            CardTrace::OpenDir(String::from("SUBDIR")),
            CardTrace::OpenFile(String::from("PART.GCO")),
        ]
    );
    assert_eq!(reader.depth(), 0);
    assert_eq!(reader.file_size(), 6);
    assert_eq!(reader.absolute_filename(), Some("/SUBDIR/PART.GCO"));
}

#[test]
fn count_matches_enumeration_and_lookup() {
    let mut reader = mount(job_card(), SessionConfig::default());
    let total = reader.file_count();
    assert_eq!(total, 5);
    for index in 0..total {
        let entry = reader.get_filename(index).expect("entry in range");
        let found = reader
            .find_filename(&entry.short_name)
            .expect("name resolves");
        assert_eq!(found.index, index);
    }
    assert!(reader.get_filename(total).is_none());
}

#[test]
fn deleting_a_file_shifts_count_and_resorts() {
    let mut reader = mount(job_card(), SessionConfig::default());
    let before = reader.file_count();
    let generation = reader.sort_generation();
    reader.remove_file("/apple.g").unwrap();
    assert_eq!(reader.host().output, "File deleted:apple.g\n");
    assert_eq!(reader.file_count(), before - 1);
    assert_eq!(reader.sort_generation(), generation + 1);
    assert!(!reader.driver().exists("/APPLE.G"));
}

#[test]
fn sort_order_is_a_stable_case_insensitive_permutation() {
    for tier in [SortTier::Storage, SortTier::Transient, SortTier::Cached] {
        let config = SessionConfig {
            sort_tier: tier,
            folder_sorting: FolderSorting::Above,
            ..SessionConfig::default()
        };
        let mut reader = mount(job_card(), config);
        let count = reader.file_count() as usize;
        let mut order = reader.sort_table().order().to_vec();
        assert_eq!(order.len(), count);

        let names: Vec<(bool, String)> = order
            .iter()
            .map(|&raw| {
                let entry = reader.get_filename(raw).unwrap();
                (entry.is_dir, entry.longest_name().to_ascii_lowercase())
            })
            .collect();
        for pair in names.windows(2) {
            let (a_dir, a_name) = &pair[0];
            let (b_dir, b_name) = &pair[1];
            assert!(*a_dir || !*b_dir, "folder after file in tier {tier:?}");
            if a_dir == b_dir {
                assert!(a_name <= b_name, "{a_name} > {b_name} in tier {tier:?}");
            }
        }

        let first = order.clone();
        reader.presort();
        assert_eq!(reader.sort_table().order(), first.as_slice());

        order.sort_unstable();
        assert_eq!(order, (0..count as u16).collect::<Vec<_>>());
    }
}

#[test]
fn sort_table_is_capped() {
    let mut card = MemoryCard::new();
    for i in 0..45 {
        card.add_file(&format!("/F{i:02}.G"), b"").unwrap();
    }
    let mut reader = mount(card, SessionConfig::default());
    assert_eq!(reader.file_count(), 45);
    assert_eq!(reader.sort_table().len(), 40);
    let past = reader.get_filename_sorted(42).unwrap();
    assert_eq!(past.short_name.as_str(), "F42.G");
}

#[test]
fn nested_call_resumes_caller_at_saved_offset() {
    let mut reader = mount(job_card(), SessionConfig::default());
    reader.open_file("/MAIN.G", true, false).unwrap();
    reader.start_print();
    assert_eq!(reader.read_line().unwrap().as_str(), "G28");
    assert_eq!(reader.read_line().unwrap().as_str(), "M32 /LIB/SUB.G");
    let offset = reader.position();

    reader.open_file("/LIB/SUB.G", true, true).unwrap();
    reader.start_print();
    assert_eq!(reader.procedure_depth(), 1);
    assert!(reader
        .host()
        .output
        .contains("SUBROUTINE CALL target:\"/LIB/SUB.G\" parent:\"/MAIN.G\" pos19\n"));
    assert_eq!(drain(&mut reader), ["G1 X1", "G1 X2"]);

    let generation = reader.sort_generation();
    reader.finish().unwrap();
    assert_eq!(reader.mode(), SessionMode::Reading);
    assert!(reader.is_printing());
    assert_eq!(reader.absolute_filename(), Some("/MAIN.G"));
    assert_eq!(reader.position(), offset);
    assert_eq!(reader.procedure_depth(), 0);
    assert_eq!(reader.sort_generation(), generation);
    assert!(reader.host().commands.is_empty());
    assert_eq!(drain(&mut reader), ["G1 X5"]);
}

#[test]
fn calling_past_procedure_depth_is_fatal() {
    let mut reader = mount(job_card(), SessionConfig::default());
    reader.open_file("/MAIN.G", true, false).unwrap();
    reader.open_file("/LIB/SUB.G", true, true).unwrap();
    let err = reader.open_file("/SUBDIR/PART.GCO", true, true).unwrap_err();
    assert_eq!(err, SessionError::ProcedureDepthExceeded);
    assert!(err.is_fatal());
    assert!(reader.host().halted.is_some());
    assert_eq!(reader.procedure_depth(), 1);
    assert_eq!(reader.absolute_filename(), Some("/LIB/SUB.G"));
}

#[test]
fn failed_call_does_not_leave_a_frame_behind() {
    let mut reader = mount(job_card(), SessionConfig::default());
    reader.open_file("/MAIN.G", true, false).unwrap();
    assert!(matches!(
        reader.open_file("/LIB/NOPE.G", true, true),
        Err(SessionError::PathNotFound { .. })
    ));
    assert_eq!(reader.procedure_depth(), 0);
    assert!(!reader.is_file_open());
}

#[test]
fn finishing_outermost_file_goes_idle_and_resorts_once() {
    let mut reader = mount(job_card(), SessionConfig::default());
    reader.host_mut().job_seconds = 61;
    reader.open_file("/SUBDIR/PART.GCO", true, false).unwrap();
    reader.start_print();
    drain(&mut reader);
    let generation = reader.sort_generation();

    reader.finish().unwrap();
    assert_eq!(reader.mode(), SessionMode::Idle);
    assert!(!reader.is_printing());
    assert!(!reader.is_file_open());
    assert_eq!(reader.sort_generation(), generation + 1);
    assert_eq!(reader.host().commands, ["M84", "M31"]);
    assert_eq!(reader.host().timer_stops, 1);
}

#[test]
fn short_jobs_skip_time_report_and_release_is_configurable() {
    let config = SessionConfig {
        release_on_finish: false,
        ..SessionConfig::default()
    };
    let mut reader = mount(job_card(), config);
    reader.host_mut().job_seconds = 60;
    reader.open_file("/MAIN.G", true, false).unwrap();
    reader.finish().unwrap();
    assert!(reader.host().commands.is_empty());
}

#[test]
fn percent_done_rounds_size_up_to_whole_percent_steps() {
    let mut card = MemoryCard::new();
    card.add_file("/BIG.G", &[b'G'; 250]).unwrap();
    let mut reader = mount(card, SessionConfig::default());
    reader.open_file("/BIG.G", true, false).unwrap();
    reader.set_index(100).unwrap();
    assert_eq!(reader.percent_done(), 33);
}

#[test]
fn reinit_resets_the_session() {
    let mut reader = mount(job_card(), SessionConfig::default());
    reader.chdir("SUBDIR").unwrap();
    reader.open_file("PART.GCO", true, false).unwrap();
    reader.init_card().unwrap();
    assert_eq!(reader.depth(), 0);
    assert!(!reader.is_file_open());
    assert_eq!(reader.driver().open_file_count(), 0);
}
