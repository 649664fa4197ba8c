use core::fmt;

use alloc::{string::String, vec::Vec};

/// Everything above the session: serial protocol sink, command queue,
/// status line, job timer and the halt path.
pub trait SessionHost: fmt::Write {
    /// Queue a command line for the interpreter.
    fn enqueue_command(&mut self, command: &str);
    fn set_status(&mut self, text: &str);
    /// Stop the job timer and return the elapsed job time in seconds.
    fn stop_job_timer(&mut self) -> u32;
    /// Unrecoverable fault; device firmware does not return from here.
    fn halt(&mut self, reason: &str);
    /// Wait for queued motion to drain before a file is switched.
    fn synchronize(&mut self) {}
}

/// Host that keeps everything it is told, for tooling and tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingHost {
    pub output: String,
    pub commands: Vec<String>,
    pub status: String,
    pub halted: Option<String>,
    pub job_seconds: u32,
    pub timer_stops: usize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_output(&mut self) -> String {
        core::mem::take(&mut self.output)
    }
}

impl fmt::Write for RecordingHost {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl SessionHost for RecordingHost {
    fn enqueue_command(&mut self, command: &str) {
        self.commands.push(String::from(command));
    }

    fn set_status(&mut self, text: &str) {
        self.status.clear();
        self.status.push_str(text);
    }

    fn stop_job_timer(&mut self) -> u32 {
        self.timer_stops += 1;
        self.job_seconds
    }

    fn halt(&mut self, reason: &str) {
        self.halted = Some(String::from(reason));
    }
}
