//! gpgfolder CLI - archive and gpg-encrypt folders
//!
//! Without a subcommand an interactive menu lists the folders and `.gpg`
//! files of the working directory. `encrypt` and `decrypt` run a single
//! pipeline on an explicit path.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use gpgfolder::config::{CipherAlgo, DEFAULT_PROGRAM, GpgConfig, PassphraseMode};
use gpgfolder::error::{GpgFolderError, Result};
use gpgfolder::gpg::GpgCipher;
use gpgfolder::operator::{Console, FixedAnswer, Operator};
use gpgfolder::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use gpgfolder::pipeline;
use gpgfolder::session::{Outcome, Session};

#[derive(Parser)]
#[command(name = "gpgfolder")]
#[command(version)]
#[command(about = "Archive a folder and encrypt it with gpg, or decrypt and extract it.", long_about = None)]
struct Cli {
    /// gpg executable to run
    #[arg(long, global = true, env = "GPGFOLDER_GPG", value_name = "PATH", default_value = DEFAULT_PROGRAM)]
    gpg: PathBuf,

    /// Symmetric cipher used for encryption
    #[arg(long, global = true, value_enum, default_value_t = CipherAlgo::Aes256)]
    cipher_algo: CipherAlgo,

    /// Hand the passphrase to gpg as a command-line argument instead of a
    /// pipe. The passphrase is then visible in process listings.
    #[arg(long, global = true)]
    passphrase_arg: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Directory listed by the interactive menu [default: current directory]
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive and encrypt a folder
    #[command(alias = "e")]
    Encrypt {
        /// Folder to archive and encrypt
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Decrypt a .gpg file and extract it into <name>-decrypted
    #[command(alias = "d")]
    Decrypt {
        /// Encrypted archive to decrypt
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long)]
    passphrase_stdin: bool,

    /// Delete the original input without asking once the operation succeeded
    #[arg(long, conflicts_with = "keep_original")]
    delete_original: bool,

    /// Keep the original input without asking
    #[arg(long)]
    keep_original: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(Outcome::Exited) => {
            println!("Exiting...");
            ExitCode::SUCCESS
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.chain());
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();
}

fn run(cli: Cli) -> Result<Outcome> {
    let cipher = GpgCipher::new(GpgConfig {
        program: cli.gpg,
        cipher_algo: cli.cipher_algo,
        passphrase_mode: if cli.passphrase_arg {
            PassphraseMode::Argument
        } else {
            PassphraseMode::Pipe
        },
    });

    match cli.command {
        None => {
            let workdir = match cli.dir {
                Some(dir) => dir,
                None => std::env::current_dir()
                    .map_err(|e| GpgFolderError::io("failed to determine current directory", e))?,
            };
            let mut session = Session::new(Console::stdio(), workdir, &cipher);
            if TerminalPassphraseReader::is_available() {
                session = session.with_passphrase_reader(Box::new(TerminalPassphraseReader::new()));
            }
            session.run()
        }
        Some(Commands::Encrypt { folder, run }) => {
            let passphrase = passphrase_reader(run.passphrase_stdin).read_passphrase()?;
            let mut operator = operator(&run);
            pipeline::encrypt_folder(&folder, &passphrase, &cipher, &mut *operator)
                .map(Outcome::Encrypted)
        }
        Some(Commands::Decrypt { file, run }) => {
            let passphrase = passphrase_reader(run.passphrase_stdin).read_passphrase()?;
            let mut operator = operator(&run);
            pipeline::decrypt_file(&file, &passphrase, &cipher, &mut *operator)
                .map(Outcome::Decrypted)
        }
    }
}

fn passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

fn operator(run: &RunArgs) -> Box<dyn Operator> {
    if run.delete_original {
        Box::new(FixedAnswer::new(true, io::stdout()))
    } else if run.keep_original {
        Box::new(FixedAnswer::new(false, io::stdout()))
    } else {
        Box::new(Console::stdio())
    }
}
