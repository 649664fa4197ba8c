use crate::{
    config::{PathBuf, PROC_DEPTH},
    error::SessionError,
};

/// Caller saved by a nested file call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcedureFrame {
    pub path: PathBuf,
    pub offset: u32,
}

/// Bounded stack of suspended callers. Overflow is reported, never dropped.
#[derive(Clone, Debug, Default)]
pub struct ProcedureStack<const N: usize = PROC_DEPTH> {
    frames: heapless::Vec<ProcedureFrame, N>,
}

impl<const N: usize> ProcedureStack<N> {
    pub const fn new() -> Self {
        Self {
            frames: heapless::Vec::new(),
        }
    }

    pub fn push(&mut self, frame: ProcedureFrame) -> Result<(), SessionError> {
        self.frames
            .push(frame)
            .map_err(|_| SessionError::ProcedureDepthExceeded)
    }

    pub fn pop(&mut self) -> Option<ProcedureFrame> {
        self.frames.pop()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_full(&self) -> bool {
        self.frames.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(path: &str, offset: u32) -> ProcedureFrame {
        ProcedureFrame {
            path: PathBuf::try_from(path).unwrap(),
            offset,
        }
    }

    #[test]
    fn overflow_keeps_existing_frames() {
        let mut stack: ProcedureStack<2> = ProcedureStack::new();
        stack.push(frame("/A.G", 10)).unwrap();
        stack.push(frame("/B.G", 20)).unwrap();
        assert_eq!(
            stack.push(frame("/C.G", 30)),
            Err(SessionError::ProcedureDepthExceeded)
        );
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop(), Some(frame("/B.G", 20)));
        assert_eq!(stack.pop(), Some(frame("/A.G", 10)));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn default_depth_is_one_level() {
        let mut stack = ProcedureStack::<PROC_DEPTH>::new();
        assert_eq!(stack.capacity(), 1);
        stack.push(frame("/MAIN.G", 5)).unwrap();
        assert!(stack.is_full());
        stack.clear();
        assert_eq!(stack.depth(), 0);
    }
}
