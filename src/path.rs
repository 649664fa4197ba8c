use crate::{
    config::{PathBuf, PATH_SEPARATOR},
    driver::CardDriver,
    error::SessionError,
    workdir::WorkDirStack,
};

/// Directory that holds the target plus the target's bare name.
#[derive(Clone, Debug)]
pub struct Resolved<'p, Dir> {
    pub dir: Dir,
    pub file_name: &'p str,
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with(PATH_SEPARATOR)
}

/// Walks every directory segment of `path` without touching the working
/// directory stack.
///
/// Absolute paths start at the root, relative ones at the working
/// directory. Repeated separators are ignored. The final segment is handed
/// back verbatim for the caller to open or delete.
pub fn resolve<'p, D: CardDriver>(
    driver: &mut D,
    stack: &WorkDirStack<D::Dir>,
    path: &'p str,
) -> Result<Resolved<'p, D::Dir>, SessionError> {
    let start = if is_absolute(path) {
        stack.root()
    } else {
        stack.current()
    };
    let mut dir = start.cloned().ok_or(SessionError::CardUnavailable)?;

    let (dirs, file_name) = match path.rfind(PATH_SEPARATOR) {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    };
    if file_name.is_empty() {
        log::warn!("sdcard: resolve empty_file_name path={}", path);
        return Err(SessionError::path_not_found(path));
    }

    for segment in dirs.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        dir = match driver.open_dir(&dir, segment) {
            Ok(next) => next,
            Err(err) => {
                log::warn!(
                    "sdcard: resolve segment_error path={} segment={} err={:?}",
                    path,
                    segment,
                    err
                );
                return Err(SessionError::path_not_found(segment));
            }
        };
    }

    Ok(Resolved { dir, file_name })
}

/// Absolute form of `path` as seen from the working directory.
pub fn absolute<Dir: Clone>(stack: &WorkDirStack<Dir>, path: &str) -> Result<PathBuf, SessionError> {
    let mut out = if is_absolute(path) {
        PathBuf::new()
    } else {
        stack.path()?
    };
    for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        if !out.ends_with(PATH_SEPARATOR) {
            out.push(PATH_SEPARATOR)
                .map_err(|_| SessionError::PathTooLong)?;
        }
        out.push_str(segment)
            .map_err(|_| SessionError::PathTooLong)?;
    }
    Ok(out)
}
