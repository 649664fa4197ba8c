#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SessionMode {
    #[default]
    Idle,
    Reading,
    Writing,
    /// Writing, tagged as the log sink.
    Logging,
}

impl SessionMode {
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn is_writing(self) -> bool {
        matches!(self, Self::Writing | Self::Logging)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionApplyStatus {
    Applied,
    Unchanged,
    InvalidTransition,
}
