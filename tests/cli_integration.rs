//! CLI integration tests
//!
//! Drives the gpgfolder binary end-to-end. Most tests use a stand-in `gpg`
//! shell script so they do not depend on GnuPG being installed; the real
//! round trip runs only when `gpg` is available.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Stand-in for gpg: "encrypts" by prepending the passphrase line and
/// "decrypts" by checking and stripping it. Fails when FAKE_GPG_FAIL=1.
const FAKE_GPG: &str = r#"#!/bin/sh
mode=""
out=""
input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --symmetric) mode=enc; shift ;;
    --decrypt) mode=dec; shift ;;
    -o) out="$2"; shift 2 ;;
    *) input="$1"; shift ;;
  esac
done
IFS= read -r pass
if [ "$FAKE_GPG_FAIL" = "1" ]; then
  echo "fake gpg: failing on request" >&2
  exit 2
fi
if [ "$mode" = enc ]; then
  { printf '%s\n' "$pass"; cat "$input"; } > "$out"
else
  IFS= read -r stored < "$input"
  if [ "$stored" != "$pass" ]; then
    echo "fake gpg: decryption failed: Bad session key" >&2
    exit 2
  fi
  tail -n +2 "$input" > "$out"
fi
"#;

/// Get path to the gpgfolder binary
fn gpgfolder_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gpgfolder"))
}

/// Writes the fake gpg into its own directory, outside the work directory
/// the tests list.
fn fake_gpg() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("gpg");
    fs::write(&script, FAKE_GPG).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (dir, script)
}

/// Run gpgfolder with `stdin` fed to it.
fn run_gpgfolder(gpg: &Path, args: &[&str], stdin: &str, envs: &[(&str, &str)]) -> Output {
    let mut child = Command::new(gpgfolder_bin())
        .arg("--gpg")
        .arg(gpg)
        .args(args)
        .envs(envs.iter().copied())
        .env_remove("GPGFOLDER_GPG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let child_stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., folder not found)
        let _ = child_stdin.write_all(stdin.as_bytes());
    }

    child.wait_with_output().unwrap()
}

fn notes_folder(parent: &Path) -> PathBuf {
    let folder = parent.join("notes");
    fs::create_dir_all(folder.join("b")).unwrap();
    fs::write(folder.join("a.txt"), "hi").unwrap();
    fs::write(folder.join("b").join("c.txt"), "bye").unwrap();
    folder
}

fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn tree(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    fn visit(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Option<Vec<u8>>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let rel = path.strip_prefix(root).unwrap().to_path_buf();
            if path.is_dir() {
                out.insert(rel, None);
                visit(root, &path, out);
            } else {
                out.insert(rel, Some(fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = BTreeMap::new();
    visit(root, root, &mut out);
    out
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    let folder = notes_folder(temp_dir.path());
    let encrypted = temp_dir.path().join("notes.zip.gpg");

    let result = run_gpgfolder(
        &gpg,
        &[
            "encrypt",
            folder.to_str().unwrap(),
            "--passphrase-stdin",
            "--keep-original",
        ],
        "secret",
        &[],
    );
    assert_success(&result, "encrypt");
    assert_eq!(names_in(temp_dir.path()), vec!["notes", "notes.zip.gpg"]);

    let result = run_gpgfolder(
        &gpg,
        &[
            "decrypt",
            encrypted.to_str().unwrap(),
            "--passphrase-stdin",
            "--keep-original",
        ],
        "secret",
        &[],
    );
    assert_success(&result, "decrypt");
    assert_eq!(
        names_in(temp_dir.path()),
        vec!["notes", "notes-decrypted", "notes.zip.gpg"]
    );

    let extracted = temp_dir.path().join("notes-decrypted");
    assert_eq!(tree(&folder), tree(&extracted));
    assert_eq!(fs::read_to_string(extracted.join("a.txt")).unwrap(), "hi");
    assert_eq!(
        fs::read_to_string(extracted.join("b").join("c.txt")).unwrap(),
        "bye"
    );
}

#[test]
fn test_encrypt_nonexistent_folder_fails() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing");

    let result = run_gpgfolder(
        &gpg,
        &["encrypt", missing.to_str().unwrap(), "--passphrase-stdin"],
        "secret",
        &[],
    );

    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("does not exist"));
    assert!(names_in(temp_dir.path()).is_empty());
}

#[test]
fn test_encryption_failure_keeps_plain_archive() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    let folder = notes_folder(temp_dir.path());

    let result = run_gpgfolder(
        &gpg,
        &["encrypt", folder.to_str().unwrap(), "--passphrase-stdin"],
        "secret",
        &[("FAKE_GPG_FAIL", "1")],
    );

    assert_eq!(result.status.code(), Some(1));
    assert_eq!(names_in(temp_dir.path()), vec!["notes", "notes.zip"]);
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("encryption failed"), "{stderr}");
}

#[test]
fn test_decrypt_wrong_passphrase_fails() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    let folder = notes_folder(temp_dir.path());
    let encrypted = temp_dir.path().join("notes.zip.gpg");

    let result = run_gpgfolder(
        &gpg,
        &[
            "encrypt",
            folder.to_str().unwrap(),
            "--passphrase-stdin",
            "--delete-original",
        ],
        "correct",
        &[],
    );
    assert_success(&result, "encrypt");
    assert_eq!(names_in(temp_dir.path()), vec!["notes.zip.gpg"]);

    let result = run_gpgfolder(
        &gpg,
        &[
            "decrypt",
            encrypted.to_str().unwrap(),
            "--passphrase-stdin",
            "--delete-original",
        ],
        "wrong",
        &[],
    );
    assert!(!result.status.success());
    assert_eq!(names_in(temp_dir.path()), vec!["notes.zip.gpg"]);
}

#[test]
fn test_decrypt_nonexistent_file_fails() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.gpg");

    let result = run_gpgfolder(
        &gpg,
        &["decrypt", missing.to_str().unwrap(), "--passphrase-stdin"],
        "x",
        &[],
    );

    assert!(!result.status.success());
    assert!(names_in(temp_dir.path()).is_empty());
}

#[test]
fn test_interactive_encrypt_and_delete_folder() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    notes_folder(temp_dir.path());

    let result = run_gpgfolder(
        &gpg,
        &["--dir", temp_dir.path().to_str().unwrap()],
        "1\n1\nsecret\ny\n",
        &[],
    );
    assert_success(&result, "interactive encrypt");

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("1. Encrypt a folder"), "{stdout}");
    assert!(stdout.contains("1. notes"), "{stdout}");
    assert!(stdout.contains("Deleted: "), "{stdout}");
    assert_eq!(names_in(temp_dir.path()), vec!["notes.zip.gpg"]);

    let result = run_gpgfolder(
        &gpg,
        &["--dir", temp_dir.path().to_str().unwrap()],
        "2\n1\nsecret\n\n",
        &[],
    );
    assert_success(&result, "interactive decrypt");
    assert_eq!(
        names_in(temp_dir.path()),
        vec!["notes-decrypted", "notes.zip.gpg"]
    );
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Kept original"), "{stdout}");
}

#[test]
fn test_interactive_exit() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    notes_folder(temp_dir.path());

    let result = run_gpgfolder(
        &gpg,
        &["--dir", temp_dir.path().to_str().unwrap()],
        "3\n",
        &[],
    );
    assert_success(&result, "exit");
    assert!(String::from_utf8_lossy(&result.stdout).contains("Exiting"));
    assert_eq!(names_in(temp_dir.path()), vec!["notes"]);
}

#[test]
fn test_stdin_passphrase_decrypts_interactively() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    let folder = notes_folder(temp_dir.path());

    let result = run_gpgfolder(
        &gpg,
        &[
            "encrypt",
            folder.to_str().unwrap(),
            "--passphrase-stdin",
            "--keep-original",
        ],
        "secret \n",
        &[],
    );
    assert_success(&result, "encrypt");

    let result = run_gpgfolder(
        &gpg,
        &["--dir", temp_dir.path().to_str().unwrap()],
        "2\n1\nsecret \n\n",
        &[],
    );
    assert_success(&result, "interactive decrypt");
    assert_eq!(tree(&folder), tree(&temp_dir.path().join("notes-decrypted")));
}

#[test]
fn test_interactive_invalid_choice_fails() {
    let (_gpg_dir, gpg) = fake_gpg();
    let temp_dir = TempDir::new().unwrap();
    notes_folder(temp_dir.path());

    for stdin in ["7\n", "1\nabc\n", "1\n5\n"] {
        let result = run_gpgfolder(
            &gpg,
            &["--dir", temp_dir.path().to_str().unwrap()],
            stdin,
            &[],
        );
        assert_eq!(result.status.code(), Some(1), "{stdin:?}");
        let stderr = String::from_utf8_lossy(&result.stderr);
        assert!(stderr.contains("invalid"), "{stderr}");
    }
    assert_eq!(names_in(temp_dir.path()), vec!["notes"]);
}

fn real_gpg_available() -> bool {
    Command::new("gpg")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Round trip through the real GnuPG with a throwaway home directory.
#[test]
fn test_real_gpg_roundtrip() {
    if !real_gpg_available() {
        eprintln!("gpg not installed; skipping");
        return;
    }
    let gnupg_home = TempDir::new().unwrap();
    fs::set_permissions(gnupg_home.path(), fs::Permissions::from_mode(0o700)).unwrap();
    let home = gnupg_home.path().to_str().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let folder = notes_folder(temp_dir.path());
    let encrypted = temp_dir.path().join("notes.zip.gpg");

    let result = run_gpgfolder(
        Path::new("gpg"),
        &[
            "encrypt",
            folder.to_str().unwrap(),
            "--passphrase-stdin",
            "--keep-original",
        ],
        "correct horse",
        &[("GNUPGHOME", home)],
    );
    assert_success(&result, "encrypt");
    assert_eq!(names_in(temp_dir.path()), vec!["notes", "notes.zip.gpg"]);

    let result = run_gpgfolder(
        Path::new("gpg"),
        &[
            "decrypt",
            encrypted.to_str().unwrap(),
            "--passphrase-stdin",
            "--keep-original",
        ],
        "battery staple",
        &[("GNUPGHOME", home)],
    );
    assert!(!result.status.success(), "wrong passphrase must fail");
    assert_eq!(names_in(temp_dir.path()), vec!["notes", "notes.zip.gpg"]);

    let result = run_gpgfolder(
        Path::new("gpg"),
        &[
            "decrypt",
            encrypted.to_str().unwrap(),
            "--passphrase-stdin",
            "--keep-original",
        ],
        "correct horse",
        &[("GNUPGHOME", home)],
    );
    assert_success(&result, "decrypt");
    assert_eq!(tree(&folder), tree(&temp_dir.path().join("notes-decrypted")));

    let _ = Command::new("gpgconf")
        .args(["--kill", "gpg-agent"])
        .env("GNUPGHOME", home)
        .status();
}
