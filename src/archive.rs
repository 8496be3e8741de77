//! Zip container for folder trees
//!
//! A folder is packed with paths relative to its root, so extracting the
//! archive into any directory reproduces the folder's contents there.

use crate::error::{ErrorCategory, ErrorKind, GpgFolderError, Result};
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Pack the full contents of `folder` into a zip archive at `archive_path`.
///
/// The archive is assembled in a temporary file next to `archive_path` and
/// renamed into place once complete; a failure never leaves a partial
/// archive behind. Symbolic links and special files are skipped with a
/// warning. Returns the number of regular files stored.
pub fn create_archive(folder: &Path, archive_path: &Path) -> Result<u64> {
    let meta = fs::metadata(folder)
        .map_err(|e| GpgFolderError::io(format!("failed to stat {}", folder.display()), e))?;
    if !meta.is_dir() {
        return Err(GpgFolderError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!("{} is not a directory", folder.display()),
        ));
    }

    let temp_file = tempfile::Builder::new()
        .prefix(".gpgfolder-")
        .suffix(".zip.part")
        .tempfile_in(containing_dir(archive_path))
        .map_err(|e| {
            GpgFolderError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to create temporary archive",
                e,
            )
        })?;

    let mut writer = ZipWriter::new(temp_file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut file_count = 0u64;
    walk(&mut writer, folder, folder, options, &mut file_count)?;

    let mut temp_file = writer
        .finish()
        .map_err(archive_error("failed to finalize archive"))?;
    temp_file.flush().map_err(|e| {
        GpgFolderError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush archive",
            e,
        )
    })?;
    temp_file.persist(archive_path).map_err(|e| {
        GpgFolderError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename archive to {}", archive_path.display()),
            e.error,
        )
    })?;

    debug!(
        folder = %folder.display(),
        archive = %archive_path.display(),
        file_count,
        "archive written"
    );
    Ok(file_count)
}

fn walk<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    base: &Path,
    dir: &Path,
    options: SimpleFileOptions,
    file_count: &mut u64,
) -> Result<()> {
    let mut children = fs::read_dir(dir)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<Vec<PathBuf>>>()
        })
        .map_err(|e| GpgFolderError::io(format!("failed to list {}", dir.display()), e))?;
    // Stable entry order makes archives of identical trees identical.
    children.sort();

    for path in children {
        let meta = fs::symlink_metadata(&path)
            .map_err(|e| GpgFolderError::io(format!("failed to stat {}", path.display()), e))?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            warn!(path = %path.display(), "skipping symbolic link");
            continue;
        }

        let name = entry_name(base, &path)?;
        if file_type.is_dir() {
            debug!(entry = %name, "adding directory");
            writer
                .add_directory(name, options)
                .map_err(archive_error("failed to add directory entry"))?;
            walk(writer, base, &path, options, file_count)?;
        } else if file_type.is_file() {
            debug!(entry = %name, size = meta.len(), "adding file");
            writer
                .start_file(name, options.large_file(meta.len() >= u64::from(u32::MAX)))
                .map_err(archive_error("failed to add file entry"))?;
            let mut input = File::open(&path)
                .map_err(|e| GpgFolderError::io(format!("failed to open {}", path.display()), e))?;
            io::copy(&mut input, writer).map_err(|e| {
                GpgFolderError::io(format!("failed to archive {}", path.display()), e)
            })?;
            *file_count += 1;
        } else {
            warn!(path = %path.display(), "skipping special file");
        }
    }
    Ok(())
}

/// The `/`-separated archive name of `path` relative to `base`.
fn entry_name(base: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(base).map_err(|_| {
        GpgFolderError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Archive,
            format!("{} is outside {}", path.display(), base.display()),
        )
    })?;
    let parts = rel
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                GpgFolderError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::Archive,
                    format!("file name is not valid UTF-8: {}", path.display()),
                )
            })
        })
        .collect::<Result<Vec<&str>>>()?;
    Ok(parts.join("/"))
}

/// Restore every entry of the archive at `archive_path` below `target_dir`.
///
/// `target_dir` is created if absent; files already present under the same
/// names are overwritten. Entries that would land outside `target_dir`, or
/// be written through a symlink already present below it, are refused.
/// Returns the number of entries processed.
pub fn extract_archive(archive_path: &Path, target_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .map_err(|e| GpgFolderError::io(format!("failed to open {}", archive_path.display()), e))?;
    let mut archive = ZipArchive::new(io::BufReader::new(file))
        .map_err(archive_error("failed to read archive"))?;

    fs::create_dir_all(target_dir)
        .map_err(|e| GpgFolderError::io(format!("failed to create {}", target_dir.display()), e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(archive_error("failed to read archive entry"))?;
        let rel = entry.enclosed_name().ok_or_else(|| {
            GpgFolderError::with_kind(
                ErrorCategory::User,
                ErrorKind::Archive,
                format!(
                    "refusing to extract {:?}: path escapes the target directory",
                    entry.name()
                ),
            )
        })?;
        reject_symlinks(target_dir, &rel)?;
        let dest = target_dir.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| GpgFolderError::io(format!("failed to create {}", dest.display()), e))?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GpgFolderError::io(format!("failed to create {}", parent.display()), e)
            })?;
        }
        let mut out = File::create(&dest)
            .map_err(|e| GpgFolderError::io(format!("failed to create {}", dest.display()), e))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| GpgFolderError::io(format!("failed to extract {}", dest.display()), e))?;
        debug!(entry = %dest.display(), "extracted");
    }

    Ok(archive.len())
}

/// Fail if any existing component of `target_dir/rel` below `target_dir` is a
/// symlink; writing through it could touch files outside the target.
fn reject_symlinks(target_dir: &Path, rel: &Path) -> Result<()> {
    let mut path = target_dir.to_path_buf();
    for component in rel.components() {
        path.push(component);
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(GpgFolderError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::Archive,
                    format!("refusing to extract through symlink {}", path.display()),
                ));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(GpgFolderError::io(
                    format!("failed to inspect {}", path.display()),
                    e,
                ));
            }
        }
    }
    Ok(())
}

/// Directory a new file next to `path` is created in.
pub(crate) fn containing_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn archive_error(msg: &'static str) -> impl FnOnce(ZipError) -> GpgFolderError {
    move |e| {
        let category = match e {
            ZipError::Io(_) => ErrorCategory::Internal,
            _ => ErrorCategory::User,
        };
        GpgFolderError::with_kind_and_source(category, ErrorKind::Archive, msg, e)
    }
}

/// Snapshot of a directory tree: relative `/`-separated path to file
/// contents, with `None` for directories.
#[cfg(test)]
pub(crate) fn snapshot_tree(
    root: &Path,
) -> std::collections::BTreeMap<String, Option<Vec<u8>>> {
    fn visit(
        root: &Path,
        dir: &Path,
        out: &mut std::collections::BTreeMap<String, Option<Vec<u8>>>,
    ) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let name = entry_name(root, &path).unwrap();
            if path.is_dir() {
                out.insert(name, None);
                visit(root, &path, out);
            } else {
                out.insert(name, Some(fs::read(&path).unwrap()));
            }
        }
    }

    let mut out = std::collections::BTreeMap::new();
    visit(root, root, &mut out);
    out
}
