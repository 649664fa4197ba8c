#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionEvent {
    OpenedForRead,
    OpenedForWrite,
    OpenedForLog,
    Closed,
}
