//! Derivation of intermediate and final artifact paths
//!
//! `notes/` → `notes.zip` → `notes.zip.gpg` on the way in, and
//! `notes.zip.gpg` → `notes.zip` → `notes-decrypted/` on the way out.

use crate::error::{ErrorCategory, ErrorKind, GpgFolderError, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const ENCRYPTED_EXTENSION: &str = "gpg";
pub const EXTRACTED_SUFFIX: &str = "-decrypted";

/// Path of the plain archive built from `folder`.
///
/// Trailing separators are dropped, so `notes/` and `notes` both map to
/// `notes.zip`.
pub fn archive_path_for(folder: &Path) -> Result<PathBuf> {
    let mut trimmed: PathBuf = folder.components().collect();
    if trimmed.file_name().is_none() {
        trimmed = fs::canonicalize(folder)
            .map_err(|e| GpgFolderError::io(format!("failed to resolve {}", folder.display()), e))?;
    }
    if trimmed.file_name().is_none() {
        return Err(GpgFolderError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidSelection,
            format!("cannot derive an archive name from {}", folder.display()),
        ));
    }
    Ok(append_extension(&trimmed, ARCHIVE_EXTENSION))
}

/// Path of the encrypted artifact written for `archive`.
pub fn encrypted_path_for(archive: &Path) -> PathBuf {
    append_extension(archive, ENCRYPTED_EXTENSION)
}

/// Path the decrypted archive is written to, i.e. `encrypted` without its
/// `.gpg` suffix.
pub fn decrypted_archive_path_for(encrypted: &Path) -> Result<PathBuf> {
    let invalid = || {
        GpgFolderError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidSelection,
            format!(
                "{} does not follow the <name>.{} naming convention",
                encrypted.display(),
                ENCRYPTED_EXTENSION
            ),
        )
    };

    let name = encrypted.file_name().ok_or_else(invalid)?;
    let name = name.to_str().ok_or_else(invalid)?;
    let stem = name
        .strip_suffix(ENCRYPTED_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .filter(|s| !s.is_empty())
        .ok_or_else(invalid)?;
    Ok(encrypted.with_file_name(stem))
}

/// Directory the decrypted archive is extracted into: the archive path with
/// its last extension removed and `-decrypted` appended.
pub fn extraction_dir_for(decrypted_archive: &Path) -> PathBuf {
    let base = decrypted_archive.with_extension("");
    let mut name = base.into_os_string();
    name.push(EXTRACTED_SUFFIX);
    PathBuf::from(name)
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
