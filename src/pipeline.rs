//! Folder encryption and decryption pipelines
//!
//! Encrypt: folder → `<folder>.zip` → `<folder>.zip.gpg`, then the plain
//! archive is removed and the operator may delete the folder.
//!
//! Decrypt: `<name>.zip.gpg` → `<name>.zip` → `<name>-decrypted/`, then the
//! decrypted archive is removed and the operator may delete the encrypted
//! file.
//!
//! Outputs are always finalized before intermediates are removed. A crash in
//! between leaves extra files on disk, never missing ones.

use crate::archive;
use crate::error::{ErrorCategory, ErrorKind, GpgFolderError, Result};
use crate::gpg::SymmetricCipher;
use crate::naming;
use crate::operator::{Operator, confirm_delete};
use crate::passphrase;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Archive `folder`, encrypt the archive with `passphrase`, and return the
/// path of the encrypted artifact.
///
/// If the cipher tool fails, the plain archive is left in place for
/// diagnosis and no encrypted artifact is produced.
pub fn encrypt_folder(
    folder: &Path,
    passphrase: &[u8],
    cipher: &dyn SymmetricCipher,
    operator: &mut dyn Operator,
) -> Result<PathBuf> {
    if !folder.is_dir() {
        return Err(GpgFolderError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!("folder '{}' does not exist", folder.display()),
        ));
    }
    passphrase::validate(passphrase)?;

    let archive_path = naming::archive_path_for(folder)?;
    let encrypted_path = naming::encrypted_path_for(&archive_path);

    let file_count = archive::create_archive(folder, &archive_path)
        .map_err(|e| e.with_context(format!("failed to archive {}", folder.display())))?;
    info!(archive = %archive_path.display(), file_count, "folder archived");

    cipher
        .encrypt(&archive_path, &encrypted_path, passphrase)
        .map_err(|e| {
            e.with_context(format!(
                "encryption failed; plain archive left at {}",
                archive_path.display()
            ))
        })?;
    info!(encrypted = %encrypted_path.display(), "archive encrypted");
    operator.notify(&format!(
        "Encrypted folder saved as: {}",
        encrypted_path.display()
    ));

    remove_intermediate(&archive_path)?;
    operator.notify(&format!(
        "Deleted temporary archive: {}",
        archive_path.display()
    ));

    confirm_delete(folder, operator);
    Ok(encrypted_path)
}

/// Decrypt `encrypted`, extract the recovered archive into
/// `<name>-decrypted`, and return the path of that folder.
pub fn decrypt_file(
    encrypted: &Path,
    passphrase: &[u8],
    cipher: &dyn SymmetricCipher,
    operator: &mut dyn Operator,
) -> Result<PathBuf> {
    if !encrypted.is_file() {
        return Err(GpgFolderError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!("file '{}' does not exist", encrypted.display()),
        ));
    }
    let archive_path = naming::decrypted_archive_path_for(encrypted)?;
    passphrase::validate(passphrase)?;

    cipher
        .decrypt(encrypted, &archive_path, passphrase)
        .map_err(|e| e.with_context(format!("failed to decrypt {}", encrypted.display())))?;
    info!(archive = %archive_path.display(), "file decrypted");
    operator.notify(&format!(
        "Decrypted file saved as: {}",
        archive_path.display()
    ));

    let target = naming::extraction_dir_for(&archive_path);
    let entries = archive::extract_archive(&archive_path, &target).map_err(|e| {
        e.with_context(format!(
            "failed to extract {}; decrypted archive left in place",
            archive_path.display()
        ))
    })?;
    info!(target = %target.display(), entries, "archive extracted");
    operator.notify(&format!("Folder extracted to: {}", target.display()));

    remove_intermediate(&archive_path)?;
    operator.notify(&format!(
        "Deleted temporary decrypted archive: {}",
        archive_path.display()
    ));

    confirm_delete(encrypted, operator);
    Ok(target)
}

fn remove_intermediate(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| {
        GpgFolderError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to delete intermediate archive {}", path.display()),
            e,
        )
    })
}
