use crate::{
    config::{PathBuf, ShortName, MAX_DIR_DEPTH, PATH_SEPARATOR},
    driver::CardDriver,
    error::SessionError,
    traverse::{self, Target},
};

#[derive(Clone, Debug)]
struct WorkDirFrame<Dir> {
    dir: Dir,
    name: ShortName,
}

/// Volume root plus the chain of directories entered below it.
///
/// Depth 0 is the root; the last frame is the working directory.
#[derive(Clone, Debug)]
pub struct WorkDirStack<Dir> {
    root: Option<Dir>,
    frames: heapless::Vec<WorkDirFrame<Dir>, MAX_DIR_DEPTH>,
}

impl<Dir: Clone> Default for WorkDirStack<Dir> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Dir: Clone> WorkDirStack<Dir> {
    pub const fn new() -> Self {
        Self {
            root: None,
            frames: heapless::Vec::new(),
        }
    }

    /// Starts over at a freshly opened root.
    pub fn reset(&mut self, root: Dir) {
        self.root = Some(root);
        self.frames.clear();
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.frames.clear();
    }

    pub fn set_root(&mut self) {
        self.frames.clear();
    }

    pub fn is_mounted(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Dir> {
        self.root.as_ref()
    }

    pub fn current(&self) -> Option<&Dir> {
        match self.frames.last() {
            Some(frame) => Some(&frame.dir),
            None => self.root.as_ref(),
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens `name` inside the working directory and makes it current.
    pub fn descend<D>(&mut self, driver: &mut D, name: &str) -> Result<(), SessionError>
    where
        D: CardDriver<Dir = Dir>,
    {
        let parent = self.current().cloned().ok_or(SessionError::CardUnavailable)?;
        if self.frames.is_full() {
            log::warn!("sdcard: chdir depth_limit name={} depth={}", name, self.depth());
            return Err(SessionError::DirectoryDepthExceeded);
        }
        let dir = match driver.open_dir(&parent, name) {
            Ok(dir) => dir,
            Err(err) => {
                log::warn!("sdcard: chdir open_error name={} err={:?}", name, err);
                return Err(SessionError::path_not_found(name));
            }
        };
        let name = canonical_name(driver, &parent, name);
        self.frames
            .push(WorkDirFrame { dir, name })
            .map_err(|_| SessionError::DirectoryDepthExceeded)
    }

    /// Steps back to the parent; `false` when already at the root.
    pub fn ascend(&mut self) -> bool {
        self.frames.pop().is_some()
    }

    /// Name of the working directory, `/` at the root.
    pub fn work_dir_name(&self) -> &str {
        match self.frames.last() {
            Some(frame) => frame.name.as_str(),
            None => "/",
        }
    }

    /// Absolute path of the working directory with a trailing separator.
    pub fn path(&self) -> Result<PathBuf, SessionError> {
        let mut path = PathBuf::new();
        path.push(PATH_SEPARATOR)
            .map_err(|_| SessionError::PathTooLong)?;
        for frame in &self.frames {
            path.push_str(&frame.name)
                .map_err(|_| SessionError::PathTooLong)?;
            path.push(PATH_SEPARATOR)
                .map_err(|_| SessionError::PathTooLong)?;
        }
        Ok(path)
    }
}

fn canonical_name<D: CardDriver>(driver: &mut D, parent: &D::Dir, name: &str) -> ShortName {
    if let Some(found) = traverse::find(driver, parent, Target::Name(name)) {
        return found.entry.short_name;
    }
    let mut short = ShortName::new();
    for ch in name.chars() {
        if short.push(ch.to_ascii_uppercase()).is_err() {
            break;
        }
    }
    short
}
