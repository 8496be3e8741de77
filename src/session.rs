//! Interactive menu flow: pick an action, pick its input, run one pipeline.

use crate::error::{ErrorCategory, ErrorKind, GpgFolderError, Result};
use crate::gpg::SymmetricCipher;
use crate::operator::Console;
use crate::passphrase::{self, PassphraseReader};
use crate::pipeline;
use crate::selection::{self, Action, MenuChoice};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::debug;
use zeroize::Zeroizing;

/// How an interactive run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Encrypted(PathBuf),
    Decrypted(PathBuf),
    /// The operator picked `Exit` from one of the menus.
    Exited,
}

pub struct Session<'a, R, W> {
    console: Console<R, W>,
    workdir: PathBuf,
    cipher: &'a dyn SymmetricCipher,
    passphrase_reader: Option<Box<dyn PassphraseReader>>,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    /// A session listing `workdir`. Without a passphrase reader the
    /// passphrase is read as a plain (echoed) console line.
    pub fn new(
        console: Console<R, W>,
        workdir: impl Into<PathBuf>,
        cipher: &'a dyn SymmetricCipher,
    ) -> Self {
        Self {
            console,
            workdir: workdir.into(),
            cipher,
            passphrase_reader: None,
        }
    }

    pub fn with_passphrase_reader(mut self, reader: Box<dyn PassphraseReader>) -> Self {
        self.passphrase_reader = Some(reader);
        self
    }

    pub fn into_console(self) -> Console<R, W> {
        self.console
    }

    pub fn run(&mut self) -> Result<Outcome> {
        selection::render_action_menu(self.console.output())?;
        let answer = self.require_line("Choose an option (1, 2, 3): ")?;
        let action = selection::parse_action(&answer)?;
        debug!(?action, workdir = %self.workdir.display(), "action selected");

        match action {
            Action::Encrypt => {
                let folders = selection::list_folders(&self.workdir)?;
                let Some(folder) = self.choose("Available folders:", "Choose a folder: ", &folders)?
                else {
                    return Ok(Outcome::Exited);
                };
                let passphrase = self.read_passphrase()?;
                pipeline::encrypt_folder(&folder, &passphrase, self.cipher, &mut self.console)
                    .map(Outcome::Encrypted)
            }
            Action::Decrypt => {
                let files = selection::list_encrypted_files(&self.workdir)?;
                let Some(file) =
                    self.choose("Available encrypted files:", "Choose a file: ", &files)?
                else {
                    return Ok(Outcome::Exited);
                };
                let passphrase = self.read_passphrase()?;
                pipeline::decrypt_file(&file, &passphrase, self.cipher, &mut self.console)
                    .map(Outcome::Decrypted)
            }
            Action::Exit => Ok(Outcome::Exited),
        }
    }

    fn choose(&mut self, title: &str, prompt: &str, items: &[String]) -> Result<Option<PathBuf>> {
        selection::render_menu(self.console.output(), title, items)?;
        let answer = self.require_line(prompt)?;
        Ok(match selection::parse_menu_choice(&answer, items.len())? {
            MenuChoice::Item(index) => Some(self.workdir.join(&items[index])),
            MenuChoice::Exit => None,
        })
    }

    fn require_line(&mut self, prompt: &str) -> Result<String> {
        self.console.prompt_line(prompt)?.ok_or_else(|| {
            GpgFolderError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidSelection,
                "no input: expected a menu choice",
            )
        })
    }

    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(reader) = self.passphrase_reader.as_mut() {
            return reader.read_passphrase();
        }
        let line = self
            .console
            .prompt_line("Enter passphrase: ")?
            .map(Zeroizing::new)
            .ok_or_else(|| {
                GpgFolderError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::PassphraseUnavailable,
                    "no passphrase given",
                )
            })?;
        Ok(passphrase::normalize(line.as_bytes()))
    }
}
