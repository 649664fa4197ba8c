/// Deepest working directory below the root.
pub const MAX_DIR_DEPTH: usize = 10;
/// Nested instruction-file calls kept on the procedure stack.
pub const PROC_DEPTH: usize = 1;
/// Entries considered by the sort engine; the rest stay in on-disk order.
pub const SORT_LIMIT: usize = 40;
/// `NAME.EXT` plus terminator slack.
pub const FILENAME_LENGTH: usize = 13;
pub const MAX_VFAT_ENTRIES: usize = 5;
pub const LONG_FILENAME_LENGTH: usize = FILENAME_LENGTH * MAX_VFAT_ENTRIES;
pub const MAX_PATH_LENGTH: usize = FILENAME_LENGTH * MAX_DIR_DEPTH + MAX_DIR_DEPTH + 1;
/// Capacity of a line returned by `CardReader::read_line`; longer lines are cut.
pub const WRITE_LINE_MAX: usize = 96;

pub const PATH_SEPARATOR: char = '/';
/// First extension byte of a runnable instruction file (`*.G*`).
pub const INSTRUCTION_EXT_MARKER: u8 = b'G';
/// Second extension byte marking an instruction file as disabled (`*.G~*`).
pub const DISABLED_EXT_MARKER: u8 = b'~';

pub const AUTOSTART_DELAY_MS: u64 = 5_000;
pub const AUTOSTART_PREFIX: &str = "auto";
pub const AUTOSTART_SUFFIX: &str = ".g";

pub const SD_FINISHED_RELEASE_COMMAND: &str = "M84";
pub const JOB_TIME_REPORT_COMMAND: &str = "M31";
pub const JOB_TIME_REPORT_MIN_SECONDS: u32 = 60;

pub type ShortName = heapless::String<FILENAME_LENGTH>;
pub type LongName = heapless::String<LONG_FILENAME_LENGTH>;
pub type PathBuf = heapless::String<MAX_PATH_LENGTH>;

/// Memory budget for the sort engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SortTier {
    /// Re-read both entries from the card on every comparison.
    #[default]
    Storage,
    /// Buffer names for the duration of one sort.
    Transient,
    /// Keep names and directory flags on the heap until the next rebuild.
    Cached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FolderSorting {
    Off,
    #[default]
    Above,
    Below,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SpiSpeed {
    #[default]
    Full,
    Half,
    Quarter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    pub sort_tier: SortTier,
    pub sort_alpha: bool,
    pub folder_sorting: FolderSorting,
    pub spi_speed: SpiSpeed,
    pub chip_select: u8,
    /// Second chip select tried when the primary does not answer (LCD slot).
    pub fallback_chip_select: Option<u8>,
    pub release_on_finish: bool,
    pub autostart_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sort_tier: SortTier::default(),
            sort_alpha: true,
            folder_sorting: FolderSorting::default(),
            spi_speed: SpiSpeed::default(),
            chip_select: 53,
            fallback_chip_select: None,
            release_on_finish: true,
            autostart_delay_ms: AUTOSTART_DELAY_MS,
        }
    }
}
