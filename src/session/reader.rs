use alloc::string::String;

use crate::{
    autostart::{self, Autostart},
    codec::{eq_ignore_case, DirEntry},
    config::{
        FolderSorting, PathBuf, SessionConfig, ShortName, JOB_TIME_REPORT_COMMAND,
        JOB_TIME_REPORT_MIN_SECONDS, PROC_DEPTH, SD_FINISHED_RELEASE_COMMAND, WRITE_LINE_MAX,
    },
    driver::{CardDriver, InitStage, OpenMode},
    error::SessionError,
    host::SessionHost,
    path,
    sort::{EntrySource, SortTable},
    traverse::{self, Found, Target},
    workdir::WorkDirStack,
};

use super::{
    engine::SessionEngine,
    events::SessionEvent,
    procedure::{ProcedureFrame, ProcedureStack},
    types::{SessionApplyStatus, SessionMode},
};

pub type Line = heapless::String<WRITE_LINE_MAX>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpenKind {
    Read,
    Write,
    Log,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Nesting {
    /// Close whatever is open and start over.
    Replace,
    /// Suspend the open file on the procedure stack.
    Call,
    /// Reopen a caller popped off the procedure stack.
    Resume,
}

/// Eligible entries of one directory, read through the traversal engine.
struct DirSource<'a, D: CardDriver> {
    driver: &'a mut D,
    dir: &'a D::Dir,
}

impl<D: CardDriver> EntrySource for DirSource<'_, D> {
    fn entry_count(&mut self) -> u16 {
        traverse::count(self.driver, self.dir)
    }

    fn entry(&mut self, raw_index: u16) -> Option<DirEntry> {
        traverse::find(self.driver, self.dir, Target::Index(raw_index)).map(|found| found.entry)
    }
}

/// The card session: mount state, working directory, display order and the
/// single open file.
pub struct CardReader<D: CardDriver, H: SessionHost> {
    driver: D,
    host: H,
    config: SessionConfig,
    card_ok: bool,
    workdir: WorkDirStack<D::Dir>,
    sort: SortTable,
    session: SessionEngine,
    file: Option<D::File>,
    file_path: PathBuf,
    sdpos: u32,
    filesize: u32,
    printing: bool,
    procedures: ProcedureStack,
    autostart: Autostart,
}

impl<D: CardDriver, H: SessionHost> CardReader<D, H> {
    pub fn new(driver: D, host: H, config: SessionConfig) -> Self {
        Self {
            driver,
            host,
            sort: SortTable::new(config.sort_tier),
            autostart: Autostart::new(0, config.autostart_delay_ms),
            config,
            card_ok: false,
            workdir: WorkDirStack::new(),
            session: SessionEngine::new(),
            file: None,
            file_path: PathBuf::new(),
            sdpos: 0,
            filesize: 0,
            printing: false,
            procedures: ProcedureStack::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_parts(self) -> (D, H) {
        (self.driver, self.host)
    }

    /// Brings up card, volume and root, trying the fallback chip select
    /// when the primary one does not answer.
    pub fn init_card(&mut self) -> Result<(), SessionError> {
        self.reset_session();
        self.card_ok = false;
        self.workdir.clear();
        self.sort.flush();

        let result = self.mount();
        match &result {
            Ok(()) => {
                self.card_ok = true;
                let _ = writeln!(self.host, "SD card ok");
                log::info!("sdcard: init ok cs={}", self.config.chip_select);
                self.resort();
            }
            Err(err) => {
                let _ = writeln!(self.host, "{}", err);
            }
        }
        result
    }

    fn mount(&mut self) -> Result<(), SessionError> {
        let speed = self.config.spi_speed;
        if let Err(err) = self.driver.init_card(speed, self.config.chip_select) {
            log::warn!(
                "sdcard: init card_error cs={} err={:?}",
                self.config.chip_select,
                err
            );
            let fallback = self
                .config
                .fallback_chip_select
                .filter(|&cs| cs != self.config.chip_select);
            let Some(cs) = fallback else {
                return Err(SessionError::DeviceInit(InitStage::Card));
            };
            if let Err(err) = self.driver.init_card(speed, cs) {
                log::warn!("sdcard: init card_error cs={} err={:?}", cs, err);
                return Err(SessionError::DeviceInit(InitStage::Card));
            }
        }
        if let Err(err) = self.driver.init_volume() {
            log::error!("sdcard: init volume_error err={:?}", err);
            return Err(SessionError::DeviceInit(InitStage::Volume));
        }
        match self.driver.open_root() {
            Ok(root) => {
                self.workdir.reset(root);
                Ok(())
            }
            Err(err) => {
                log::error!("sdcard: init root_error err={:?}", err);
                Err(SessionError::DeviceInit(InitStage::Root))
            }
        }
    }

    /// Marks the card unavailable and empties the session.
    pub fn release(&mut self) {
        self.reset_session();
        self.card_ok = false;
        self.workdir.clear();
        self.sort.flush();
        log::info!("sdcard: released");
    }

    fn reset_session(&mut self) {
        self.printing = false;
        self.close_file(false);
        self.procedures.clear();
        self.sdpos = 0;
        self.filesize = 0;
    }

    fn ensure_card(&self) -> Result<(), SessionError> {
        if self.card_ok {
            Ok(())
        } else {
            Err(SessionError::CardUnavailable)
        }
    }

    fn current_dir(&self) -> Result<D::Dir, SessionError> {
        self.ensure_card()?;
        self.workdir
            .current()
            .cloned()
            .ok_or(SessionError::CardUnavailable)
    }

    pub fn is_card_ok(&self) -> bool {
        self.card_ok
    }

    pub fn is_printing(&self) -> bool {
        self.printing
    }

    pub fn is_file_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn mode(&self) -> SessionMode {
        self.session.mode()
    }

    pub fn procedure_depth(&self) -> usize {
        self.procedures.depth()
    }

    // Directory listing

    /// Prints every runnable file below the working directory. Nested
    /// entries carry their absolute path.
    pub fn ls(&mut self) -> Result<(), SessionError> {
        let dir = self.current_dir()?;
        let prefix = if self.workdir.depth() == 0 {
            PathBuf::new()
        } else {
            self.workdir.path()?
        };
        traverse::print_tree(&mut self.driver, &dir, &prefix, &mut self.host);
        Ok(())
    }

    pub fn file_count(&mut self) -> u16 {
        match self.current_dir() {
            Ok(dir) => traverse::count(&mut self.driver, &dir),
            Err(_) => 0,
        }
    }

    /// Entry at raw position `index` among the eligible entries.
    pub fn get_filename(&mut self, index: u16) -> Option<DirEntry> {
        if let Some(entry) = self.sort.cached(index) {
            return Some(entry);
        }
        let dir = self.current_dir().ok()?;
        traverse::find(&mut self.driver, &dir, Target::Index(index)).map(|found| found.entry)
    }

    /// Entry at display position `position`.
    pub fn get_filename_sorted(&mut self, position: u16) -> Option<DirEntry> {
        let raw = if self.config.sort_alpha {
            self.sort.raw_index(position)
        } else {
            position
        };
        self.get_filename(raw)
    }

    /// Locates `name` among the working directory's eligible entries.
    pub fn find_filename(&mut self, name: &str) -> Option<Found> {
        if let Some(index) = self.sort.find_cached(name, 0) {
            let entry = self.sort.cached(index)?;
            return Some(Found { index, entry });
        }
        let dir = self.current_dir().ok()?;
        traverse::find(&mut self.driver, &dir, Target::Name(name))
    }

    pub fn print_long_path(&mut self, path: &str) -> Result<(), SessionError> {
        self.ensure_card()?;
        let root = self
            .workdir
            .root()
            .cloned()
            .ok_or(SessionError::CardUnavailable)?;
        traverse::print_long_path(&mut self.driver, &root, path, &mut self.host);
        Ok(())
    }

    // Working directory

    pub fn chdir(&mut self, name: &str) -> Result<(), SessionError> {
        self.ensure_card()?;
        if let Err(err) = self.workdir.descend(&mut self.driver, name) {
            let _ = writeln!(self.host, "Cannot enter subdir: {}", name);
            return Err(err);
        }
        log::info!("sdcard: chdir name={} depth={}", name, self.workdir.depth());
        self.resort();
        Ok(())
    }

    /// Back to the parent directory; `false` at the root.
    pub fn updir(&mut self) -> bool {
        if !self.workdir.ascend() {
            return false;
        }
        self.resort();
        true
    }

    pub fn setroot(&mut self) {
        self.workdir.set_root();
        self.resort();
    }

    pub fn work_dir_name(&self) -> &str {
        self.workdir.work_dir_name()
    }

    pub fn depth(&self) -> usize {
        self.workdir.depth()
    }

    /// Absolute path of the open file.
    pub fn absolute_filename(&self) -> Option<&str> {
        self.file.as_ref().map(|_| self.file_path.as_str())
    }

    // Sorting

    /// Rebuilds the display order of the working directory.
    pub fn presort(&mut self) {
        let Ok(dir) = self.current_dir() else {
            self.sort.flush();
            return;
        };
        let mut source = DirSource {
            driver: &mut self.driver,
            dir: &dir,
        };
        self.sort.rebuild(&mut source, self.config.folder_sorting);
    }

    pub fn flush_presort(&mut self) {
        self.sort.flush();
    }

    fn resort(&mut self) {
        if self.config.sort_alpha {
            self.presort();
        } else {
            self.sort.flush();
        }
    }

    pub fn set_sort_alpha(&mut self, enabled: bool) {
        self.config.sort_alpha = enabled;
        self.resort();
    }

    pub fn set_folder_sorting(&mut self, folders: FolderSorting) {
        self.config.folder_sorting = folders;
        self.resort();
    }

    pub fn sort_table(&self) -> &SortTable {
        &self.sort
    }

    pub fn sort_generation(&self) -> u32 {
        self.sort.generation()
    }

    // File session

    pub fn open_file(
        &mut self,
        path: &str,
        read: bool,
        push_current: bool,
    ) -> Result<(), SessionError> {
        let kind = if read { OpenKind::Read } else { OpenKind::Write };
        let nesting = if push_current {
            Nesting::Call
        } else {
            Nesting::Replace
        };
        self.open(path, kind, nesting)
    }

    pub fn open_log_file(&mut self, path: &str) -> Result<(), SessionError> {
        self.open(path, OpenKind::Log, Nesting::Replace)
    }

    fn open(&mut self, path: &str, kind: OpenKind, nesting: Nesting) -> Result<(), SessionError> {
        self.ensure_card()?;

        let mut pushed = false;
        match (self.file.is_some(), nesting) {
            (true, Nesting::Call) => {
                let frame = ProcedureFrame {
                    path: self.file_path.clone(),
                    offset: self.sdpos,
                };
                if let Err(err) = self.procedures.push(frame) {
                    log::error!(
                        "sdcard: call depth_exceeded target={} depth={}",
                        path,
                        self.procedures.depth()
                    );
                    let _ = writeln!(
                        self.host,
                        "trying to call sub-gcode files with too many levels. MAX level is:{}",
                        PROC_DEPTH
                    );
                    self.host.halt("procedure depth exceeded");
                    return Err(err);
                }
                pushed = true;
                let _ = writeln!(
                    self.host,
                    "SUBROUTINE CALL target:\"{}\" parent:\"{}\" pos{}",
                    path, self.file_path, self.sdpos
                );
            }
            (true, Nesting::Replace) => {
                let _ = writeln!(self.host, "Now doing file: {}", path);
                self.procedures.clear();
            }
            (_, Nesting::Resume) => {}
            (false, _) => {
                let _ = writeln!(self.host, "Now fresh file: {}", path);
                self.procedures.clear();
            }
        }

        self.stop_print();

        let result = self.open_resolved(path, kind);
        if result.is_err() && pushed {
            self.procedures.pop();
        }
        result
    }

    fn open_resolved(&mut self, path: &str, kind: OpenKind) -> Result<(), SessionError> {
        let absolute = match path::absolute(&self.workdir, path) {
            Ok(absolute) => absolute,
            Err(err) => {
                let _ = writeln!(self.host, "{}", err);
                return Err(err);
            }
        };
        let resolved = match path::resolve(&mut self.driver, &self.workdir, path) {
            Ok(resolved) => resolved,
            Err(err) => {
                let _ = writeln!(self.host, "{}", err);
                return Err(err);
            }
        };
        let mode = match kind {
            OpenKind::Read => OpenMode::Read,
            OpenKind::Write | OpenKind::Log => OpenMode::Write,
        };
        let file = match self.driver.open_file(&resolved.dir, resolved.file_name, mode) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("sdcard: open file_error path={} err={:?}", path, err);
                let err = SessionError::path_not_found(resolved.file_name);
                let _ = writeln!(self.host, "{}", err);
                return Err(err);
            }
        };

        let event = match kind {
            OpenKind::Read => {
                self.filesize = self.driver.size(&file);
                let _ = writeln!(
                    self.host,
                    "File opened: {} Size: {}",
                    resolved.file_name, self.filesize
                );
                let _ = writeln!(self.host, "File selected");
                let selected =
                    traverse::find(&mut self.driver, &resolved.dir, Target::Name(resolved.file_name));
                match selected.filter(|found| !found.entry.long_name.is_empty()) {
                    Some(found) => self.host.set_status(&found.entry.long_name),
                    None => self.host.set_status(resolved.file_name),
                }
                SessionEvent::OpenedForRead
            }
            OpenKind::Write | OpenKind::Log => {
                self.filesize = 0;
                let _ = writeln!(self.host, "Writing to file: {}", path);
                self.host.set_status(resolved.file_name);
                if kind == OpenKind::Log {
                    SessionEvent::OpenedForLog
                } else {
                    SessionEvent::OpenedForWrite
                }
            }
        };

        self.sdpos = 0;
        self.file = Some(file);
        self.file_path = absolute;
        self.apply(event);
        log::info!(
            "sdcard: open path={} mode={:?} size={}",
            self.file_path,
            self.mode(),
            self.filesize
        );
        if kind != OpenKind::Read {
            // Creating the file may have added a directory entry.
            self.resort();
        }
        Ok(())
    }

    fn apply(&mut self, event: SessionEvent) {
        let result = self.session.apply(event);
        if result.status == SessionApplyStatus::InvalidTransition {
            log::warn!(
                "sdcard: session invalid_transition mode={:?} event={:?}",
                result.before,
                event
            );
        }
    }

    /// Syncs and closes the open file. `store_location` is reserved for
    /// resumable jobs and has no effect yet.
    pub fn close_file(&mut self, store_location: bool) {
        let _ = store_location;
        if let Some(mut file) = self.file.take() {
            if let Err(err) = self.driver.sync(&mut file) {
                log::warn!("sdcard: close sync_error path={} err={:?}", self.file_path, err);
            }
            self.driver.close(file);
        }
        self.apply(SessionEvent::Closed);
    }

    /// Closes the finished file and either resumes the caller or wraps up
    /// the job.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        self.host.synchronize();
        self.close_file(false);

        if let Some(frame) = self.procedures.pop() {
            log::info!("sdcard: resume path={} pos={}", frame.path, frame.offset);
            self.open(frame.path.as_str(), OpenKind::Read, Nesting::Resume)?;
            self.set_index(frame.offset)?;
            self.start_print();
            return Ok(());
        }

        self.printing = false;
        if self.config.release_on_finish {
            self.host.enqueue_command(SD_FINISHED_RELEASE_COMMAND);
        }
        let seconds = self.host.stop_job_timer();
        if seconds > JOB_TIME_REPORT_MIN_SECONDS {
            self.host.enqueue_command(JOB_TIME_REPORT_COMMAND);
        }
        log::info!("sdcard: job finished seconds={}", seconds);
        self.resort();
        Ok(())
    }

    /// Deletes `path`. The open file is closed only when it is the one
    /// being deleted; any failure leaves the session as it was.
    pub fn remove_file(&mut self, path: &str) -> Result<(), SessionError> {
        self.ensure_card()?;

        let resolved = match path::resolve(&mut self.driver, &self.workdir, path) {
            Ok(resolved) => resolved,
            Err(err) => {
                let _ = writeln!(self.host, "{}", err);
                return Err(err);
            }
        };
        let deletes_open_file = self.file.is_some()
            && path::absolute(&self.workdir, path)
                .map(|target| eq_ignore_case(&target, &self.file_path))
                .unwrap_or(false);
        if deletes_open_file {
            self.stop_print();
            self.sdpos = 0;
        }
        if let Err(err) = self.driver.remove(&resolved.dir, resolved.file_name) {
            log::warn!("sdcard: remove error path={} err={:?}", path, err);
            let err = SessionError::delete_failure(resolved.file_name);
            let _ = writeln!(self.host, "{}", err);
            return Err(err);
        }
        let _ = writeln!(self.host, "File deleted:{}", resolved.file_name);
        self.resort();
        Ok(())
    }

    /// Writes one command line, dropping an `N<num> ` line number and a
    /// `*<checksum>` suffix.
    pub fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        if !self.mode().is_writing() {
            return Err(SessionError::NoFileOpen);
        }
        let Some(file) = self.file.as_mut() else {
            return Err(SessionError::NoFileOpen);
        };
        let body = strip_line_number(line);
        let written = match self.driver.write(file, body.as_bytes()) {
            Ok(n) if n == body.len() => self.driver.write(file, b"\r\n").map(|n| n == 2),
            Ok(_) => Ok(false),
            Err(err) => Err(err),
        };
        self.sdpos = self.driver.position(file);
        if !matches!(written, Ok(true)) {
            log::error!(
                "sdcard: write error path={} result={:?}",
                self.file_path,
                written
            );
            let _ = writeln!(self.host, "{}", SessionError::WriteFailure);
            return Err(SessionError::WriteFailure);
        }
        Ok(())
    }

    pub fn get_status(&mut self) {
        if self.card_ok && self.file.is_some() {
            let _ = writeln!(self.host, "SD printing byte {}/{}", self.sdpos, self.filesize);
        } else {
            let _ = writeln!(self.host, "Not SD printing");
        }
    }

    /// Whole-number percentage of the open file consumed so far.
    pub fn percent_done(&self) -> u8 {
        if self.file.is_none() {
            return 0;
        }
        let step = (self.filesize.saturating_add(99) / 100).max(1);
        (self.sdpos / step).min(100) as u8
    }

    // Print control

    pub fn start_print(&mut self) {
        if self.card_ok {
            self.printing = true;
            self.sort.flush();
        }
    }

    pub fn pause_print(&mut self) {
        self.printing = false;
    }

    pub fn stop_print(&mut self) {
        self.printing = false;
        if self.file.is_some() {
            self.close_file(false);
        }
    }

    /// Queues `M23 <name>` and `M24` for the interpreter.
    pub fn open_and_print(&mut self, name: &str) {
        let mut select = String::from("M23 ");
        select.push_str(&name.to_ascii_lowercase());
        self.host.enqueue_command(&select);
        self.host.enqueue_command("M24");
    }

    // Reading

    pub fn eof(&self) -> bool {
        self.file.is_none() || self.sdpos >= self.filesize
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let file = self.file.as_mut()?;
        let mut byte = [0u8; 1];
        let read = self.driver.read(file, &mut byte);
        self.sdpos = self.driver.position(file);
        match read {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(err) => {
                log::warn!("sdcard: read error path={} err={:?}", self.file_path, err);
                None
            }
        }
    }

    /// Next line without its terminator. Overlong lines are cut to the
    /// buffer and the rest is skipped.
    pub fn read_line(&mut self) -> Option<Line> {
        if self.eof() {
            return None;
        }
        let mut line = Line::new();
        while let Some(byte) = self.read_byte() {
            match byte {
                b'\n' => break,
                b'\r' => {}
                other => {
                    let _ = line.push(other as char);
                }
            }
        }
        Some(line)
    }

    pub fn set_index(&mut self, position: u32) -> Result<(), SessionError> {
        let Some(file) = self.file.as_mut() else {
            return Err(SessionError::NoFileOpen);
        };
        if let Err(err) = self.driver.seek(file, position) {
            log::warn!("sdcard: seek error pos={} err={:?}", position, err);
            return Err(SessionError::ReadFailure);
        }
        self.sdpos = position;
        Ok(())
    }

    pub fn position(&self) -> u32 {
        self.sdpos
    }

    pub fn file_size(&self) -> u32 {
        self.filesize
    }

    // Autostart

    pub fn autostart(&self) -> &Autostart {
        &self.autostart
    }

    /// Starts the power-up autostart clock at `boot_ms`.
    pub fn arm_autostart(&mut self, boot_ms: u64) {
        self.autostart = Autostart::new(boot_ms, self.config.autostart_delay_ms);
    }

    /// Runs the `auto<N>.g` scan once the power-up delay has passed, or
    /// right away with `force`. Returns the file handed to the interpreter.
    pub fn check_autostart(&mut self, force: bool, now_ms: u64) -> Option<ShortName> {
        if !self.autostart.take_due(force, now_ms) {
            return None;
        }
        let index = self.autostart.index()?;
        if !self.card_ok && self.init_card().is_err() {
            return None;
        }
        let root = self.workdir.root().cloned()?;
        let found = autostart::scan(&mut self.driver, &root, index);
        self.autostart.record(found.is_some());
        if let Some(name) = &found {
            self.open_and_print(name);
        }
        found
    }
}

fn strip_line_number(line: &str) -> &str {
    let mut body = line.trim_end_matches(['\r', '\n']);
    let trimmed = body.trim_start();
    if trimmed.starts_with('N') {
        body = trimmed;
        if let Some(space) = body.find(' ') {
            body = &body[space + 1..];
        }
        if let Some(star) = body.find('*') {
            body = &body[..star];
        }
    }
    body
}
