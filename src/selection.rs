//! Numbered menus for picking an action, a folder, or an encrypted file

use crate::error::{ErrorCategory, ErrorKind, GpgFolderError, Result};
use crate::naming::ENCRYPTED_EXTENSION;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Top-level menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Encrypt,
    Decrypt,
    Exit,
}

/// Answer to a numbered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Zero-based index into the listed items.
    Item(usize),
    Exit,
}

pub fn render_action_menu(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "\n=== GPG Folder Encrypt/Decrypt ===")
        .and_then(|()| writeln!(out, "1. Encrypt a folder"))
        .and_then(|()| writeln!(out, "2. Decrypt a folder"))
        .and_then(|()| writeln!(out, "3. Exit"))
        .map_err(render_error)
}

pub fn parse_action(input: &str) -> Result<Action> {
    match input.trim() {
        "1" => Ok(Action::Encrypt),
        "2" => Ok(Action::Decrypt),
        "3" => Ok(Action::Exit),
        other => Err(invalid(format!("invalid choice {other:?}"))),
    }
}

/// Render `items` as a numbered list followed by an `Exit` entry.
pub fn render_menu(out: &mut dyn Write, title: &str, items: &[String]) -> Result<()> {
    writeln!(out, "\n{title}").map_err(render_error)?;
    for (i, item) in items.iter().enumerate() {
        writeln!(out, "{}. {item}", i + 1).map_err(render_error)?;
    }
    writeln!(out, "{}. Exit", items.len() + 1).map_err(render_error)
}

/// Interpret a 1-based answer to a menu of `count` items plus `Exit`.
pub fn parse_menu_choice(input: &str, count: usize) -> Result<MenuChoice> {
    let input = input.trim();
    let number: usize = input
        .parse()
        .map_err(|_| invalid(format!("invalid input {input:?}: expected a number")))?;
    if number == count + 1 {
        Ok(MenuChoice::Exit)
    } else if (1..=count).contains(&number) {
        Ok(MenuChoice::Item(number - 1))
    } else {
        Err(invalid(format!(
            "invalid choice {number}: expected 1 to {}",
            count + 1
        )))
    }
}

/// Names of the subdirectories of `dir`, sorted.
pub fn list_folders(dir: &Path) -> Result<Vec<String>> {
    let folders = list(dir, |path| path.is_dir())?;
    if folders.is_empty() {
        return Err(GpgFolderError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!("no folders found in {}", dir.display()),
        ));
    }
    Ok(folders)
}

/// Names of the regular files in `dir` carrying the encrypted extension,
/// sorted.
pub fn list_encrypted_files(dir: &Path) -> Result<Vec<String>> {
    let suffix = format!(".{ENCRYPTED_EXTENSION}");
    let files = list(dir, |path| {
        path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&suffix))
    })?;
    if files.is_empty() {
        return Err(GpgFolderError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!("no {suffix} files found in {}", dir.display()),
        ));
    }
    Ok(files)
}

fn list(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| GpgFolderError::io(format!("failed to list {}", dir.display()), e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| GpgFolderError::io(format!("failed to list {}", dir.display()), e))?;
        let path = entry.path();
        if !keep(&path) {
            continue;
        }
        // Names that are not valid UTF-8 cannot be shown or typed reliably.
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn invalid(msg: String) -> GpgFolderError {
    GpgFolderError::with_kind(ErrorCategory::User, ErrorKind::InvalidSelection, msg)
}

fn render_error(err: std::io::Error) -> GpgFolderError {
    GpgFolderError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::Io,
        "failed to write menu",
        err,
    )
}
