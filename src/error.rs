use core::fmt;

use crate::{config::ShortName, driver::InitStage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Card, volume or root directory could not be brought up.
    DeviceInit(InitStage),
    /// Card is not initialized; call `init_card` first.
    CardUnavailable,
    /// A directory segment or the final file could not be opened.
    PathNotFound { segment: ShortName },
    /// Path does not fit the absolute-path buffer.
    PathTooLong,
    /// Nested file call past the procedure stack bound. Fatal.
    ProcedureDepthExceeded,
    DirectoryDepthExceeded,
    WriteFailure,
    DeleteFailure { name: ShortName },
    NoFileOpen,
    ReadFailure,
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProcedureDepthExceeded)
    }

    pub(crate) fn path_not_found(segment: &str) -> Self {
        Self::PathNotFound {
            segment: truncated(segment),
        }
    }

    pub(crate) fn delete_failure(name: &str) -> Self {
        Self::DeleteFailure {
            name: truncated(name),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceInit(InitStage::Card) => f.write_str("SD init fail"),
            Self::DeviceInit(InitStage::Volume) => f.write_str("volume.init failed"),
            Self::DeviceInit(InitStage::Root) => f.write_str("openRoot failed"),
            Self::CardUnavailable => f.write_str("SD card not initialized"),
            Self::PathNotFound { segment } => write!(f, "open failed, File: {segment}."),
            Self::PathTooLong => f.write_str("path too long"),
            Self::ProcedureDepthExceeded => f.write_str(
                "trying to call sub-gcode files with too many levels",
            ),
            Self::DirectoryDepthExceeded => f.write_str("directory depth limit reached"),
            Self::WriteFailure => f.write_str("error writing to file"),
            Self::DeleteFailure { name } => write!(f, "Deletion failed, File: {name}."),
            Self::NoFileOpen => f.write_str("no file open"),
            Self::ReadFailure => f.write_str("error reading file"),
        }
    }
}

impl core::error::Error for SessionError {}

fn truncated(text: &str) -> ShortName {
    let mut out = ShortName::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
