#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod autostart;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod logging;
pub mod path;
pub mod session;
pub mod sort;
pub mod traverse;
pub mod workdir;

pub use codec::DirEntry;
pub use config::{FolderSorting, SessionConfig, SortTier, SpiSpeed};
pub use driver::{memory::MemoryCard, CardDriver, InitStage, OpenMode, RawDirEntry};
pub use error::SessionError;
pub use host::{RecordingHost, SessionHost};
pub use session::{CardReader, SessionMode};
pub use sort::SortTable;
