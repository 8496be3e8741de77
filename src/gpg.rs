//! Invocation of the external symmetric-cipher tool
//!
//! The tool runs to completion in the foreground; there is no timeout. Its
//! output goes to a temporary file next to the requested output path and is
//! renamed into place only when the tool reports success, so a failed run
//! neither produces nor clobbers the output.

use crate::archive::containing_dir;
use crate::config::{GpgConfig, PassphraseMode};
use crate::error::{ErrorCategory, ErrorKind, GpgFolderError, Result};
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Passphrase-based encryption of one file into another.
pub trait SymmetricCipher {
    /// Encrypt `input` into `output`.
    fn encrypt(&self, input: &Path, output: &Path, passphrase: &[u8]) -> Result<()>;

    /// Decrypt `input` into `output`.
    fn decrypt(&self, input: &Path, output: &Path, passphrase: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Encrypt,
    Decrypt,
}

impl Operation {
    fn failure_kind(self) -> ErrorKind {
        match self {
            Operation::Encrypt => ErrorKind::EncryptionFailed,
            Operation::Decrypt => ErrorKind::DecryptionFailed,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Encrypt => f.write_str("encryption"),
            Operation::Decrypt => f.write_str("decryption"),
        }
    }
}

/// [`SymmetricCipher`] backed by GnuPG in batch mode.
#[derive(Debug, Clone, Default)]
pub struct GpgCipher {
    config: GpgConfig,
}

impl GpgCipher {
    pub fn new(config: GpgConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GpgConfig {
        &self.config
    }

    fn run(&self, op: Operation, input: &Path, output: &Path, passphrase: &[u8]) -> Result<()> {
        let temp_path = tempfile::Builder::new()
            .prefix(".gpgfolder-")
            .suffix(".part")
            .tempfile_in(containing_dir(output))
            .map_err(|e| {
                GpgFolderError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to create temporary file next to {}", output.display()),
                    e,
                )
            })?
            .into_temp_path();

        let mut cmd = Command::new(&self.config.program);
        cmd.args([
            "--batch",
            "--yes",
            "--pinentry-mode",
            "loopback",
            "--no-symkey-cache",
        ]);
        match op {
            Operation::Encrypt => {
                cmd.args(["--symmetric", "--cipher-algo", self.config.cipher_algo.gpg_name()]);
            }
            Operation::Decrypt => {
                cmd.arg("--decrypt");
            }
        }
        match self.config.passphrase_mode {
            PassphraseMode::Pipe => {
                if passphrase.contains(&b'\n') {
                    return Err(GpgFolderError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::PassphraseUnavailable,
                        "passphrase must not contain a line break",
                    ));
                }
                cmd.args(["--passphrase-fd", "0"]).stdin(Stdio::piped());
            }
            PassphraseMode::Argument => {
                let passphrase = std::str::from_utf8(passphrase).map_err(|e| {
                    GpgFolderError::with_kind_and_source(
                        ErrorCategory::User,
                        ErrorKind::PassphraseUnavailable,
                        "passphrase passed as an argument must be valid UTF-8",
                        e,
                    )
                })?;
                warn!("passing the passphrase as a command-line argument; it is visible in process listings");
                cmd.arg("--passphrase").arg(passphrase).stdin(Stdio::null());
            }
        }
        cmd.arg("-o").arg(&*temp_path).arg(input);

        debug!(
            program = %self.config.program.display(),
            %op,
            input = %input.display(),
            output = %output.display(),
            "invoking cipher tool"
        );
        let mut child = cmd.spawn().map_err(|e| {
            GpgFolderError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::ToolUnavailable,
                format!("failed to run {}", self.config.program.display()),
                e,
            )
        })?;

        let mut feed_result = Ok(());
        if let Some(mut stdin) = child.stdin.take() {
            let mut line = Zeroizing::new(passphrase.to_vec());
            line.push(b'\n');
            feed_result = stdin.write_all(&line);
            // Dropping stdin closes the pipe so the tool sees EOF.
        }

        let status = child.wait().map_err(|e| {
            GpgFolderError::with_kind_and_source(
                ErrorCategory::Internal,
                op.failure_kind(),
                format!("failed to wait for {}", self.config.program.display()),
                e,
            )
        })?;
        if !status.success() {
            return Err(GpgFolderError::with_kind(
                ErrorCategory::User,
                op.failure_kind(),
                format!("{} {op} failed ({status})", self.config.program.display()),
            ));
        }
        // The tool may exit before reading stdin; only a successful run with a
        // broken feed is suspicious.
        if let Err(e) = feed_result {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(GpgFolderError::with_kind_and_source(
                    ErrorCategory::Internal,
                    op.failure_kind(),
                    "failed to pass the passphrase to the cipher tool",
                    e,
                ));
            }
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).map_err(
                |e| GpgFolderError::io(format!("failed to set permissions on {}", output.display()), e),
            )?;
        }
        temp_path.persist(output).map_err(|e| {
            GpgFolderError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to rename to target file {}", output.display()),
                e.error,
            )
        })?;
        Ok(())
    }
}

impl SymmetricCipher for GpgCipher {
    fn encrypt(&self, input: &Path, output: &Path, passphrase: &[u8]) -> Result<()> {
        self.run(Operation::Encrypt, input, output, passphrase)
    }

    fn decrypt(&self, input: &Path, output: &Path, passphrase: &[u8]) -> Result<()> {
        self.run(Operation::Decrypt, input, output, passphrase)
    }
}

/// In-process stand-in for the cipher tool. The "ciphertext" is the plaintext
/// behind a header naming the passphrase, enough to catch wrong passphrases
/// and to tell encrypted artifacts apart from archives.
#[cfg(test)]
pub(crate) struct FakeCipher {
    pub fail: bool,
}

#[cfg(test)]
impl FakeCipher {
    const MAGIC: &'static [u8] = b"FAKEGPG\0";

    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }

    fn header(passphrase: &[u8]) -> Vec<u8> {
        let mut header = Self::MAGIC.to_vec();
        header.extend_from_slice(passphrase);
        header.push(0);
        header
    }
}

#[cfg(test)]
impl SymmetricCipher for FakeCipher {
    fn encrypt(&self, input: &Path, output: &Path, passphrase: &[u8]) -> Result<()> {
        if self.fail {
            return Err(GpgFolderError::with_kind(
                ErrorCategory::User,
                ErrorKind::EncryptionFailed,
                "fake encryption failed",
            ));
        }
        let mut data = Self::header(passphrase);
        data.extend(std::fs::read(input).map_err(|e| GpgFolderError::io("read", e))?);
        std::fs::write(output, data).map_err(|e| GpgFolderError::io("write", e))
    }

    fn decrypt(&self, input: &Path, output: &Path, passphrase: &[u8]) -> Result<()> {
        let data = std::fs::read(input).map_err(|e| GpgFolderError::io("read", e))?;
        let header = Self::header(passphrase);
        if self.fail || !data.starts_with(&header) {
            return Err(GpgFolderError::with_kind(
                ErrorCategory::User,
                ErrorKind::DecryptionFailed,
                "fake decryption failed",
            ));
        }
        std::fs::write(output, &data[header.len()..]).map_err(|e| GpgFolderError::io("write", e))
    }
}
