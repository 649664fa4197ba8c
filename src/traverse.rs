//! Depth-first directory walks.
//!
//! One engine serves every listing need: counting runnable entries,
//! fetching the n-th one, locating one by name and printing a whole tree.
//! The action is threaded explicitly through the walk and subdirectories
//! are pushed on a work stack instead of recursing on the call stack.

use core::fmt::{self, Write as _};

use crate::{
    codec::{eq_ignore_case, is_instruction_file, DirEntry},
    config::{LongName, PathBuf, MAX_DIR_DEPTH, PATH_SEPARATOR},
    driver::CardDriver,
};

#[cfg(test)]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    Index(u16),
    Name(&'a str),
}

/// Entry picked out by `find`, with its position among eligible entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Found {
    pub index: u16,
    pub entry: DirEntry,
}

enum LsAction<'a> {
    Count(u16),
    SerialPrint(&'a mut dyn fmt::Write),
    GetFilename {
        target: Target<'a>,
        seen: u16,
        found: Option<Found>,
    },
}

impl LsAction<'_> {
    fn recurses(&self) -> bool {
        matches!(self, Self::SerialPrint(_))
    }

    /// Feeds one eligible entry; `true` once the walk can stop.
    fn visit(&mut self, prefix: &str, entry: DirEntry) -> bool {
        match self {
            Self::Count(count) => {
                *count = count.saturating_add(1);
                false
            }
            Self::SerialPrint(sink) => {
                let _ = writeln!(sink, "{}{}", prefix, entry.short_name);
                false
            }
            Self::GetFilename {
                target,
                seen,
                found,
            } => {
                let hit = match target {
                    Target::Index(index) => *seen == *index,
                    Target::Name(name) => {
                        eq_ignore_case(name, &entry.short_name)
                            || (!entry.long_name.is_empty()
                                && eq_ignore_case(name, &entry.long_name))
                    }
                };
                if hit {
                    *found = Some(Found {
                        index: *seen,
                        entry,
                    });
                    return true;
                }
                *seen = seen.saturating_add(1);
                false
            }
        }
    }

    fn report_unopened(&mut self, name: &str) {
        if let Self::SerialPrint(sink) = self {
            let _ = writeln!(sink, "Cannot open subdir {}", name);
        }
    }
}

struct Frame<Dir> {
    dir: Dir,
    prefix: PathBuf,
}

/// Number of runnable files and subdirectories directly inside `dir`.
pub fn count<D: CardDriver>(driver: &mut D, dir: &D::Dir) -> u16 {
    let mut action = LsAction::Count(0);
    dive(driver, dir, "", &mut action);
    match action {
        LsAction::Count(count) => count,
        _ => 0,
    }
}

/// Eligible entry at `target`, stopping the scan as soon as it is seen.
pub fn find<D: CardDriver>(driver: &mut D, dir: &D::Dir, target: Target<'_>) -> Option<Found> {
    let mut action = LsAction::GetFilename {
        target,
        seen: 0,
        found: None,
    };
    dive(driver, dir, "", &mut action);
    match action {
        LsAction::GetFilename { found, .. } => found,
        _ => None,
    }
}

/// Every runnable file below `dir`, one line each. `prefix` is the path of
/// `dir` itself: empty at the root, `/PARTS/` inside `PARTS`.
pub fn print_tree<D: CardDriver>(
    driver: &mut D,
    dir: &D::Dir,
    prefix: &str,
    sink: &mut dyn fmt::Write,
) {
    let mut action = LsAction::SerialPrint(sink);
    dive(driver, dir, prefix, &mut action);
}

/// Renders an 8.3 path with long names, segment by segment, as
/// `/Long One/Long Two`. Unknown long names show as `???`.
pub fn print_long_path<D: CardDriver>(
    driver: &mut D,
    root: &D::Dir,
    path: &str,
    sink: &mut dyn fmt::Write,
) {
    let mut dive_dir = root.clone();
    for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        let Some(found) = find(driver, &dive_dir, Target::Name(segment)) else {
            let _ = sink.write_str("/???");
            break;
        };
        let label = if found.entry.long_name.is_empty() {
            "???"
        } else {
            found.entry.long_name.as_str()
        };
        let _ = write!(sink, "/{}", label);
        if !found.entry.is_dir {
            break;
        }
        match driver.open_dir(&dive_dir, segment) {
            Ok(dir) => dive_dir = dir,
            Err(err) => {
                log::warn!("sdcard: long_path open_error segment={} err={:?}", segment, err);
                let _ = write!(sink, "\nCannot open subdir {}", segment);
                break;
            }
        }
    }
    let _ = sink.write_char('\n');
}

fn dive<D: CardDriver>(driver: &mut D, dir: &D::Dir, prefix: &str, action: &mut LsAction<'_>) {
    let mut seed = PathBuf::new();
    if seed.push_str(prefix).is_err() {
        log::warn!("sdcard: ls path_too_long prefix={}", prefix);
        return;
    }
    let mut start = dir.clone();
    driver.rewind(&mut start);
    // The walk's own directory plus one frame per nesting level.
    let mut stack: heapless::Vec<Frame<D::Dir>, { MAX_DIR_DEPTH + 1 }> = heapless::Vec::new();
    let _ = stack.push(Frame {
        dir: start,
        prefix: seed,
    });
    let mut long_name = LongName::new();

    loop {
        let full = stack.is_full();
        let Some(frame) = stack.last_mut() else {
            break;
        };
        let raw = match driver.read_dir(&mut frame.dir, &mut long_name) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                stack.pop();
                continue;
            }
            Err(err) => {
                log::warn!("sdcard: read_dir_error prefix={} err={:?}", frame.prefix, err);
                stack.pop();
                continue;
            }
        };

        if raw.is_free() {
            stack.pop();
            continue;
        }
        if raw.is_deleted() || raw.is_dot() || long_name.starts_with('.') {
            continue;
        }
        if !raw.is_file_or_subdir() || raw.is_hidden() {
            continue;
        }

        let entry = DirEntry::from_raw(&raw, &long_name);
        if entry.is_dir && action.recurses() {
            if full {
                log::warn!("sdcard: ls depth_exceeded name={}", entry.short_name);
                action.report_unopened(&entry.short_name);
                continue;
            }
            let Some(prefix) = child_prefix(&frame.prefix, &entry.short_name) else {
                log::warn!(
                    "sdcard: ls path_too_long prefix={} name={}",
                    frame.prefix,
                    entry.short_name
                );
                continue;
            };
            match driver.open_dir(&frame.dir, &entry.short_name) {
                Ok(mut sub) => {
                    driver.rewind(&mut sub);
                    // Room was checked above.
                    let _ = stack.push(Frame { dir: sub, prefix });
                }
                Err(err) => {
                    log::warn!(
                        "sdcard: ls subdir_open_error name={} err={:?}",
                        entry.short_name,
                        err
                    );
                    action.report_unopened(&entry.short_name);
                }
            }
            continue;
        }

        if !entry.is_dir && !is_instruction_file(&raw.name) {
            continue;
        }
        if action.visit(&frame.prefix, entry) {
            return;
        }
    }
}

fn child_prefix(parent: &str, name: &str) -> Option<PathBuf> {
    let mut prefix = PathBuf::new();
    if parent.is_empty() {
        prefix.push(PATH_SEPARATOR).ok()?;
    } else {
        prefix.push_str(parent).ok()?;
    }
    prefix.push_str(name).ok()?;
    prefix.push(PATH_SEPARATOR).ok()?;
    Some(prefix)
}
