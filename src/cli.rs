//! CLI commands and argument parsing.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bytesize::ByteSize;
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use crate::config::FILE_EXTENSION;
use crate::ui::progress::TermProgress;
use crate::ui::prompt;
use crate::volume::{self, DecryptOutcome, DecryptRequest, EncryptRequest, SplitSize};

/// PicoVault - paranoid file encryption with error correction.
#[derive(Parser)]
#[command(name = "picovault")]
#[command(version)]
#[command(about = "Encrypt files into self-describing .pcv volumes using XChaCha20, Argon2id and Reed-Solomon error correction.")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt a file into a .pcv volume.
    Encrypt {
        /// Input file path.
        input: PathBuf,

        /// Output volume path (defaults to `<input>.pcv`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,

        /// Two-cipher stack, HMAC-SHA3-512 and heavier key derivation.
        #[arg(long)]
        paranoid: bool,

        /// Add Reed-Solomon parity to the payload (+6.25% size).
        #[arg(long = "reed-solomon")]
        reed_solomon: bool,

        /// Plaintext comments stored in the volume header.
        #[arg(short, long, default_value = "")]
        comments: String,

        /// Keyfile path; may be given multiple times.
        #[arg(short, long = "keyfile")]
        keyfiles: Vec<PathBuf>,

        /// Make keyfile order significant.
        #[arg(long, requires = "keyfiles")]
        ordered: bool,

        /// Wrap the volume so it is indistinguishable from random bytes.
        #[arg(long)]
        deniability: bool,

        /// Split the finished volume into chunks of this size (e.g. 32MiB).
        #[arg(long, conflicts_with = "parts")]
        split: Option<String>,

        /// Split the finished volume into N equal chunks.
        #[arg(long)]
        parts: Option<u64>,
    },

    /// Decrypt a .pcv volume.
    Decrypt {
        /// Input volume path.
        input: PathBuf,

        /// Output file path (defaults to the input minus `.pcv`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,

        /// Keyfile path; may be given multiple times.
        #[arg(short, long = "keyfile")]
        keyfiles: Vec<PathBuf>,

        /// Keep best-effort output on corruption or MAC failure.
        #[arg(long)]
        force: bool,

        /// Join `<input>.0`, `<input>.1`, ... before decrypting.
        #[arg(long)]
        recombine: bool,

        /// Treat the input as deniability-wrapped.
        #[arg(long)]
        deniability: bool,
    },
}

impl Cli {
    /// Sets up logging and parses the command line.
    pub fn init() -> Self {
        let subscriber = tracing_subscriber::fmt().with_target(false).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
        Self::parse()
    }

    /// Runs the selected command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Encrypt {
                input,
                output,
                password,
                paranoid,
                reed_solomon,
                comments,
                keyfiles,
                ordered,
                deniability,
                split,
                parts,
            } => {
                let output = output.unwrap_or_else(|| encrypt_output_path(&input));
                let password = match password {
                    Some(p) => SecretString::from(p),
                    None => prompt::encryption_password()?,
                };
                let request = EncryptRequest {
                    input,
                    output,
                    password,
                    keyfiles,
                    ordered_keyfiles: ordered,
                    comments,
                    paranoid,
                    payload_rs: reed_solomon,
                    deniability,
                    split: parse_split(split, parts)?,
                };

                let progress = TermProgress::new("Encrypting")?;
                volume::encrypt(&request, &progress)
                    .with_context(|| format!("encryption failed for {}", request.input.display()))?;
                progress.finish();

                println!("✓ Encrypted: {} -> {}", request.input.display(), request.output.display());
                Ok(())
            }

            Commands::Decrypt { input, output, password, keyfiles, force, recombine, deniability } => {
                let output = output.unwrap_or_else(|| decrypt_output_path(&input));
                let password = match password {
                    Some(p) => SecretString::from(p),
                    None => prompt::decryption_password()?,
                };
                let request = DecryptRequest { input, output, password, keyfiles, force, recombine, deniability };

                let progress = TermProgress::new("Decrypting")?;
                let outcome = volume::decrypt(&request, &progress)
                    .with_context(|| format!("decryption failed for {}", request.input.display()))?;
                progress.finish();

                match outcome {
                    DecryptOutcome::Verified => {
                        println!("✓ Decrypted: {} -> {}", request.input.display(), request.output.display());
                    }
                    DecryptOutcome::MacMismatch => {
                        println!("⚠ Decrypted WITHOUT verification: {}", request.output.display());
                        println!("⚠ The authentication tag did not match; the output may be corrupt or tampered with.");
                    }
                }
                Ok(())
            }
        }
    }
}

/// `<input>.pcv`
fn encrypt_output_path(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_owned();
    path.push(FILE_EXTENSION);
    PathBuf::from(path)
}

/// Strips `.pcv`, or appends `.out` when the input is not named like a
/// volume.
fn decrypt_output_path(input: &Path) -> PathBuf {
    let as_str = input.to_string_lossy();
    if let Some(stripped) = as_str.strip_suffix(FILE_EXTENSION) {
        PathBuf::from(stripped)
    } else {
        let mut path = input.as_os_str().to_owned();
        path.push(".out");
        PathBuf::from(path)
    }
}

/// Turns the `--split`/`--parts` options into a [`SplitSize`].
fn parse_split(split: Option<String>, parts: Option<u64>) -> Result<Option<SplitSize>> {
    match (split, parts) {
        (Some(size), _) => {
            let bytes: ByteSize = size.parse().map_err(|e: String| anyhow!("invalid split size {size:?}: {e}"))?;
            Ok(Some(SplitSize::Bytes(bytes.as_u64())))
        }
        (None, Some(count)) => Ok(Some(SplitSize::Parts(count))),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_defaults() {
        assert_eq!(encrypt_output_path(Path::new("notes.txt")), PathBuf::from("notes.txt.pcv"));
        assert_eq!(decrypt_output_path(Path::new("notes.txt.pcv")), PathBuf::from("notes.txt"));
        assert_eq!(decrypt_output_path(Path::new("mystery.bin")), PathBuf::from("mystery.bin.out"));
    }

    #[test]
    fn split_parsing() {
        assert_eq!(parse_split(None, None).unwrap(), None);
        assert_eq!(parse_split(None, Some(4)).unwrap(), Some(SplitSize::Parts(4)));
        assert_eq!(parse_split(Some("1KiB".into()), None).unwrap(), Some(SplitSize::Bytes(1024)));
        assert!(parse_split(Some("one chunk".into()), None).is_err());
    }
}
