//! Append-only mutation log.
//!
//! Lines have the form `File: <dir>/<name> --- <KIND>`. The file is opened
//! lazily in append mode and reopened after a failed write. A failure is
//! reported once and then suppressed until a write succeeds again.

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::WatchError;
use super::kind::MutationKind;

/// Format one log line (without the trailing newline).
pub fn format_line(dir: &Path, name: &OsStr, kind: MutationKind) -> String {
    format!(
        "File: {}/{} --- {}",
        dir.display(),
        name.to_string_lossy(),
        kind.log_name()
    )
}

/// Writer for the durable mutation log.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Option<File>,
    echo_stdout: bool,
    failing: bool,
    lines_written: u64,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            echo_stdout: false,
            failing: false,
            lines_written: 0,
        }
    }

    /// Also print each line to standard output.
    pub fn with_echo(mut self, echo_stdout: bool) -> Self {
        self.echo_stdout = echo_stdout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Append one line for a mutation of `dir/name`.
    ///
    /// Returns whether the line reached the log file.
    pub fn record(&mut self, dir: &Path, name: &OsStr, kind: MutationKind) -> bool {
        let line = format_line(dir, name, kind);
        if self.echo_stdout {
            println!("{line}");
        }

        match self.append(&line) {
            Ok(()) => {
                if self.failing {
                    crate::log_event!("sink", "recovered", "{}", self.path.display());
                    self.failing = false;
                }
                self.lines_written += 1;
                true
            }
            Err(e) => {
                self.file = None;
                if !self.failing {
                    tracing::error!("[sink] {e}");
                    self.failing = true;
                }
                false
            }
        }
    }

    fn append(&mut self, line: &str) -> Result<(), WatchError> {
        let to_err = |source| WatchError::LogSinkUnavailable {
            path: self.path.clone(),
            source,
        };

        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(to_err)?;
            self.file = Some(file);
        }

        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{line}").map_err(to_err)?;
        }
        Ok(())
    }
}
