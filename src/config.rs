//! Runtime configuration for the cipher tool

use clap::ValueEnum;
use std::path::PathBuf;

/// Program looked up on `PATH` when no other is configured.
pub const DEFAULT_PROGRAM: &str = "gpg";

/// Symmetric ciphers offered to the tool. All of them are 256-bit block
/// ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CipherAlgo {
    #[default]
    Aes256,
    Twofish,
    Camellia256,
}

impl CipherAlgo {
    /// Name understood by `gpg --cipher-algo`.
    pub fn gpg_name(self) -> &'static str {
        match self {
            CipherAlgo::Aes256 => "AES256",
            CipherAlgo::Twofish => "TWOFISH",
            CipherAlgo::Camellia256 => "CAMELLIA256",
        }
    }
}

/// How the passphrase reaches the cipher tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassphraseMode {
    /// Written to the tool's stdin (`--passphrase-fd 0`).
    #[default]
    Pipe,
    /// Passed as a command-line argument (`--passphrase <P>`). The secret is
    /// visible to anyone who can list processes on the machine.
    Argument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgConfig {
    pub program: PathBuf,
    pub cipher_algo: CipherAlgo,
    pub passphrase_mode: PassphraseMode,
}

impl Default for GpgConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            cipher_algo: CipherAlgo::default(),
            passphrase_mode: PassphraseMode::default(),
        }
    }
}
