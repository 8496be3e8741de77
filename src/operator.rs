//! The person at the console, as seen by the pipelines
//!
//! Pipelines never read stdin themselves. Everything they need from the
//! operator (progress output and the optional-deletion question) goes through
//! [`Operator`], so a test or a non-interactive run can substitute a fixed
//! answer.

use crate::error::{ErrorCategory, ErrorKind, GpgFolderError, Result};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

pub trait Operator {
    /// Show a progress or status line.
    fn notify(&mut self, message: &str);

    /// Ask whether `path` should be deleted. Anything but an explicit yes
    /// must be treated as "keep".
    fn approve_deletion(&mut self, path: &Path) -> bool;
}

/// Result of [`confirm_delete`].
#[derive(Debug)]
pub enum Deletion {
    Kept,
    Deleted,
    /// The operator agreed but the deletion failed. Reported, never fatal.
    Failed(GpgFolderError),
}

/// Offer to delete `path`, deleting it (recursively for directories) only on
/// an explicit yes.
pub fn confirm_delete(path: &Path, operator: &mut dyn Operator) -> Deletion {
    if !operator.approve_deletion(path) {
        operator.notify(&format!("Kept original: {}", path.display()));
        return Deletion::Kept;
    }

    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match removed {
        Ok(()) => {
            info!(path = %path.display(), "deleted original");
            operator.notify(&format!("Deleted: {}", path.display()));
            Deletion::Deleted
        }
        Err(e) => {
            let err = GpgFolderError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::CleanupFailed,
                format!("could not delete {}", path.display()),
                e,
            );
            warn!(path = %path.display(), error = %err.chain(), "cleanup failed");
            operator.notify(&format!("Warning: {}", err.chain()));
            Deletion::Failed(err)
        }
    }
}

/// Whether a yes/no answer is an explicit yes.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Line-oriented console over any reader/writer pair.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::BufReader<io::Stdin>, io::Stdout> {
    /// Console on the process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Write a line to the console.
    pub fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")
            .and_then(|()| self.output.flush())
            .map_err(|e| console_error("failed to write to console", e))
    }

    /// Access to the raw output, e.g. for rendering menus.
    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Show `prompt` and read one line with its line ending removed.
    /// Returns `None` at end of input.
    pub fn prompt_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")
            .and_then(|()| self.output.flush())
            .map_err(|e| console_error("failed to write prompt", e))?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| console_error("failed to read from console", e))?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: BufRead, W: Write> Operator for Console<R, W> {
    fn notify(&mut self, message: &str) {
        // Losing a status line is not worth failing a finished operation over.
        if let Err(e) = self.say(message) {
            warn!(error = %e.chain(), "failed to write status line");
        }
    }

    fn approve_deletion(&mut self, path: &Path) -> bool {
        let prompt = format!(
            "Do you want to delete the original '{}'? [y/N]: ",
            path.display()
        );
        match self.prompt_line(&prompt) {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e.chain(), "failed to read deletion answer; keeping original");
                false
            }
        }
    }
}

/// Operator with a predetermined deletion answer that prints status lines to
/// `output`.
pub struct FixedAnswer<W> {
    delete: bool,
    output: W,
}

impl<W: Write> FixedAnswer<W> {
    pub fn new(delete: bool, output: W) -> Self {
        Self { delete, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<W: Write> Operator for FixedAnswer<W> {
    fn notify(&mut self, message: &str) {
        if let Err(e) = writeln!(self.output, "{message}") {
            warn!(error = %e, "failed to write status line");
        }
    }

    fn approve_deletion(&mut self, _path: &Path) -> bool {
        self.delete
    }
}

fn console_error(msg: &str, err: io::Error) -> GpgFolderError {
    GpgFolderError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}
